//! Boot-time partition registry and thread spin-up for the SPM runtime
//! (spec.md §4.8, §2 item 8).
//!
//! There is no separate init *process* here the way the donor's `zos-init`
//! runs as PID 1 under its own kernel — partitions are threads of the same
//! host process that owns the [`spm_kernel::Spm`] runtime, so "boot" is a
//! library call rather than a syscall-driven bring-up sequence. What
//! carries over from the donor is the shape of the thing being built: a
//! static, compile-time partition/service table (`zos-services::manifests`)
//! brought up in a fixed order (`zos-init::bootstrap`).

mod boot;
mod registry;

pub use boot::{spawn_partition, Boot};
pub use registry::{PartitionTable, ITS_DESCRIPTOR, ITS_PARTITION_ID, ITS_ROUTES, ITS_SERVICES};
