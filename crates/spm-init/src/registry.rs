//! Static partition/service registration table (spec.md §2 item 8, §4.8).
//!
//! Grounded on the donor's `zos-services::manifests` (one `pub static
//! ..._MANIFEST` per built-in service, registered by id) and
//! `zos-init::bootstrap` (a fixed boot order for the core services) —
//! generalized here to a single built-in partition (Internal Trusted
//! Storage) plus whatever partitions the boot binary supplies of its own.

use spm_ipc::sid;
use spm_its::{ItsOp, ItsRoute};
use spm_kernel::{PartitionDescriptor, RotService};
use spm_kernel_core::types::VersionPolicy;

/// Partition id reserved for the built-in Internal Trusted Storage service.
pub const ITS_PARTITION_ID: i32 = 1;

const ITS_SET_BIT: u32 = 0;
const ITS_GET_BIT: u32 = 1;
const ITS_INFO_BIT: u32 = 2;
const ITS_REMOVE_BIT: u32 = 3;

/// The four ITS RoT services, one signal bit each (spec.md §4.6).
pub static ITS_SERVICES: &[RotService] = &[
    RotService {
        sid: sid::ITS_SET,
        signal_bit: ITS_SET_BIT,
        min_version: 1,
        version_policy: VersionPolicy::Strict,
        allow_nspe: true,
    },
    RotService {
        sid: sid::ITS_GET,
        signal_bit: ITS_GET_BIT,
        min_version: 1,
        version_policy: VersionPolicy::Strict,
        allow_nspe: true,
    },
    RotService {
        sid: sid::ITS_INFO,
        signal_bit: ITS_INFO_BIT,
        min_version: 1,
        version_policy: VersionPolicy::Strict,
        allow_nspe: true,
    },
    RotService {
        sid: sid::ITS_REMOVE,
        signal_bit: ITS_REMOVE_BIT,
        min_version: 1,
        version_policy: VersionPolicy::Strict,
        allow_nspe: true,
    },
];

/// Routes the ITS dispatch loop (`spm_its::run`) switches on — the signal
/// bit a message arrived on tells the loop which operation to run.
pub static ITS_ROUTES: &[ItsRoute] = &[
    ItsRoute { bit: ITS_SET_BIT, op: ItsOp::Set },
    ItsRoute { bit: ITS_GET_BIT, op: ItsOp::Get },
    ItsRoute { bit: ITS_INFO_BIT, op: ItsOp::GetInfo },
    ItsRoute { bit: ITS_REMOVE_BIT, op: ItsOp::Remove },
];

/// The built-in ITS partition descriptor.
pub static ITS_DESCRIPTOR: PartitionDescriptor = PartitionDescriptor {
    id: ITS_PARTITION_ID,
    name: "its",
    services: ITS_SERVICES,
};

/// A boot image's full partition set: the built-in ITS partition plus
/// whatever partitions the binary links in.
///
/// `spm_kernel_core::config::MAX_CHANNELS`/`MAX_ACTIVE_MESSAGES` bound the
/// handle pool shared by every partition (spec.md §6 "Build/link-time
/// configuration"); there is no separate per-partition pool to size here,
/// matching the donor's single shared `CapabilitySpace` rather than a
/// pool-per-process model.
pub struct PartitionTable {
    descriptors: &'static [PartitionDescriptor],
}

impl PartitionTable {
    /// Builds a table from the built-in ITS partition plus `extra`.
    ///
    /// Panics if `extra` reuses `ITS_PARTITION_ID` — a boot-time wiring
    /// error in trusted boot code, not a recoverable runtime condition.
    pub fn new(extra: &'static [PartitionDescriptor]) -> Self {
        assert!(
            extra.iter().all(|d| d.id != ITS_PARTITION_ID),
            "partition id {ITS_PARTITION_ID} is reserved for the built-in ITS partition"
        );
        let mut descriptors = Vec::with_capacity(extra.len() + 1);
        descriptors.push(ITS_DESCRIPTOR);
        descriptors.extend_from_slice(extra);
        Self {
            descriptors: descriptors.leak(),
        }
    }

    /// The full `&'static [PartitionDescriptor]` table, ready for
    /// `Spm::new`.
    pub fn descriptors(&self) -> &'static [PartitionDescriptor] {
        self.descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn its_partition_is_always_first() {
        let table = PartitionTable::new(&[]);
        assert_eq!(table.descriptors()[0].id, ITS_PARTITION_ID);
        assert_eq!(table.descriptors().len(), 1);
    }

    #[test]
    fn extra_partitions_are_appended() {
        static EXTRA: &[PartitionDescriptor] = &[PartitionDescriptor {
            id: 2,
            name: "demo",
            services: &[],
        }];
        let table = PartitionTable::new(EXTRA);
        assert_eq!(table.descriptors().len(), 2);
        assert_eq!(table.descriptors()[1].id, 2);
    }

    #[test]
    #[should_panic(expected = "reserved for the built-in ITS partition")]
    fn reusing_the_its_partition_id_panics() {
        static EXTRA: &[PartitionDescriptor] = &[PartitionDescriptor {
            id: ITS_PARTITION_ID,
            name: "rogue",
            services: &[],
        }];
        let _ = PartitionTable::new(EXTRA);
    }
}
