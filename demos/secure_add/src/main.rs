//! Minimal worked example: two 4-byte in-vecs added into one 4-byte out-vec
//! (spec.md §8 E2E-1).
//!
//! Grounded on `original_source/components/psa/services/secure_add/*` (the
//! partition's RoT service registration: `PSA_SECURE_ADD`, relaxed minor
//! version policy, `allow_nspe = true`) and
//! `original_source/TESTS/psa/secure_add/main.cpp` (the client call shape:
//! two `int` in-vecs, one `int` out-vec, `DROP_CONNECTION` collapses to a
//! zero result).
//!
//! Kept only as a demonstration partition, not part of the core crates
//! (spec.md §8, OUT OF SCOPE).

use spm_hal::{Hal, InMemoryNvStore, TestHal, TestMemoryRegions};
use spm_init::{spawn_partition, Boot, PartitionTable};
use spm_ipc::{status, PSA_SECURE_ADD};
use spm_kernel::{PartitionDescriptor, RotService, Spm};
use spm_kernel_core::message::MessageType;
use spm_kernel_core::types::{IoVec, VersionPolicy, INVALID_SOURCE};
use spm_process::ServerContext;

const SECURE_ADD_PARTITION_ID: i32 = 2;
const SECURE_ADD_SIGNAL_BIT: u32 = 0;

static SECURE_ADD_SERVICES: &[RotService] = &[RotService {
    sid: PSA_SECURE_ADD,
    signal_bit: SECURE_ADD_SIGNAL_BIT,
    min_version: 1,
    version_policy: VersionPolicy::Relaxed,
    allow_nspe: true,
}];

static SECURE_ADD_DESCRIPTOR: PartitionDescriptor = PartitionDescriptor {
    id: SECURE_ADD_PARTITION_ID,
    name: "secure_add",
    services: SECURE_ADD_SERVICES,
};

/// The partition's service loop: read the two `i32` in-vecs, write their
/// sum to the single out-vec. Runs forever on its own thread.
fn run_secure_add<H: Hal>(spm: &Spm<H>) {
    let ctx = ServerContext::new(spm, SECURE_ADD_PARTITION_ID);
    loop {
        ctx.wait(1 << SECURE_ADD_SIGNAL_BIT, true);
        while let Some(msg) = ctx.get(SECURE_ADD_SIGNAL_BIT) {
            match ctx.msg_type(msg) {
                MessageType::Connect | MessageType::Disconnect => ctx.reply_success(msg),
                MessageType::Call => {
                    let mut a = [0u8; 4];
                    let mut b = [0u8; 4];
                    ctx.read(msg, 0, &mut a);
                    ctx.read(msg, 1, &mut b);
                    let sum = i32::from_le_bytes(a).wrapping_add(i32::from_le_bytes(b));
                    ctx.write(msg, 0, &sum.to_le_bytes());
                    ctx.reply_success(msg);
                }
            }
        }
    }
}

/// Mirrors the original's `int secure_add(int a, int b)`: a failed
/// `connect` or a `DROP_CONNECTION` reply both collapse to `0` rather than
/// surfacing an error to the caller.
fn secure_add<H: Hal>(spm: &Spm<H>, a: i32, b: i32) -> i32 {
    let Ok(channel) = spm.connect(INVALID_SOURCE, PSA_SECURE_ADD, 1) else {
        return 0;
    };

    let a_bytes = a.to_le_bytes();
    let b_bytes = b.to_le_bytes();
    let mut result = [0u8; 4];
    let in_vec = [
        IoVec { ptr: a_bytes.as_ptr() as usize, len: a_bytes.len() },
        IoVec { ptr: b_bytes.as_ptr() as usize, len: b_bytes.len() },
    ];
    let out_vec = [IoVec { ptr: result.as_mut_ptr() as usize, len: result.len() }];

    let status_code = spm
        .call(INVALID_SOURCE, channel, &in_vec, &out_vec)
        .unwrap_or(status::DROP_CONNECTION);
    let _ = spm.close(INVALID_SOURCE, channel);

    if status_code == status::DROP_CONNECTION {
        0
    } else {
        i32::from_le_bytes(result)
    }
}

fn main() {
    let spm = Spm::new(
        TestHal::new(),
        Box::new(TestMemoryRegions {
            secure_ram: 0..0,
            secure_flash: 0..0,
        }),
        PartitionTable::new(&[SECURE_ADD_DESCRIPTOR]).descriptors(),
    );
    let boot = Boot::new(spm, InMemoryNvStore::new());
    let _secure_add_thread = spawn_partition(boot.spm.clone(), run_secure_add);

    let result = secure_add(&boot.spm, 1, 1);
    println!("secure_add(1, 1) = {result}");
    assert_eq!(result, 2);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_spm() -> Spm<TestHal> {
        Spm::new(
            TestHal::new(),
            Box::new(TestMemoryRegions {
                secure_ram: 0..0,
                secure_flash: 0..0,
            }),
            PartitionTable::new(&[SECURE_ADD_DESCRIPTOR]).descriptors(),
        )
    }

    #[test]
    fn adds_two_positive_numbers() {
        let spm = demo_spm();
        let boot = Boot::new(spm, InMemoryNvStore::new());
        let _thread = spawn_partition(boot.spm.clone(), run_secure_add);
        assert_eq!(secure_add(&boot.spm, 1, 1), 2);
    }

    #[test]
    fn adds_negative_and_positive() {
        let spm = demo_spm();
        let boot = Boot::new(spm, InMemoryNvStore::new());
        let _thread = spawn_partition(boot.spm.clone(), run_secure_add);
        assert_eq!(secure_add(&boot.spm, -5, 3), -2);
    }

    #[test]
    fn repeated_calls_on_fresh_channels_all_succeed() {
        let spm = demo_spm();
        let boot = Boot::new(spm, InMemoryNvStore::new());
        let _thread = spawn_partition(boot.spm.clone(), run_secure_add);
        for (a, b, expected) in [(1, 1, 2), (10, 20, 30), (0, 0, 0)] {
            assert_eq!(secure_add(&boot.spm, a, b), expected);
        }
    }
}
