//! Cross-crate end-to-end scenarios (spec.md §8 E2E-2 through E2E-6):
//! a real `Spm` runtime, a real ITS partition thread, and Client API calls
//! made exactly the way a partition or NSPE caller would make them.
//!
//! This is deliberately not wired through `spm-init` — `spm-init` itself
//! depends on `spm-its`, so a from-scratch registry is built here instead,
//! the way any integration test exercising a lower layer's public API does.

use spm_hal::{InMemoryNvStore, TestHal, TestMemoryRegions};
use spm_ipc::{sid, status, ITS_WRITE_ONCE_FLAG};
use spm_its::{ItsOp, ItsRoute, ItsStore};
use spm_kernel::{PartitionDescriptor, RotService, Spm};
use spm_kernel_core::types::{IoVec, VersionPolicy};
use spm_process::ServerContext;

const ITS_PARTITION_ID: i32 = 1;
const SET_BIT: u32 = 0;
const GET_BIT: u32 = 1;
const INFO_BIT: u32 = 2;
const REMOVE_BIT: u32 = 3;

static ITS_SERVICES: &[RotService] = &[
    RotService { sid: sid::ITS_SET, signal_bit: SET_BIT, min_version: 1, version_policy: VersionPolicy::Strict, allow_nspe: true },
    RotService { sid: sid::ITS_GET, signal_bit: GET_BIT, min_version: 1, version_policy: VersionPolicy::Strict, allow_nspe: true },
    RotService { sid: sid::ITS_INFO, signal_bit: INFO_BIT, min_version: 1, version_policy: VersionPolicy::Strict, allow_nspe: true },
    RotService { sid: sid::ITS_REMOVE, signal_bit: REMOVE_BIT, min_version: 1, version_policy: VersionPolicy::Strict, allow_nspe: true },
];

static ITS_DESCRIPTOR: PartitionDescriptor = PartitionDescriptor {
    id: ITS_PARTITION_ID,
    name: "its",
    services: ITS_SERVICES,
};

fn start_its() -> std::sync::Arc<Spm<TestHal>> {
    let spm = std::sync::Arc::new(Spm::new(
        TestHal::new(),
        Box::new(TestMemoryRegions { secure_ram: 0..0, secure_flash: 0..0 }),
        std::slice::from_ref(&ITS_DESCRIPTOR),
    ));
    let worker = spm.clone();
    std::thread::spawn(move || {
        let ctx = ServerContext::new(&worker, ITS_PARTITION_ID);
        let store = InMemoryNvStore::new();
        let its = ItsStore::new(&store);
        let routes = [
            ItsRoute { bit: SET_BIT, op: ItsOp::Set },
            ItsRoute { bit: GET_BIT, op: ItsOp::Get },
            ItsRoute { bit: INFO_BIT, op: ItsOp::GetInfo },
            ItsRoute { bit: REMOVE_BIT, op: ItsOp::Remove },
        ];
        spm_its::run(&ctx, &its, &routes);
    });
    spm
}

fn call_its(spm: &Spm<TestHal>, caller: i32, service_sid: u32, in_vec: &[IoVec], out_vec: &[IoVec]) -> i32 {
    let channel = spm.connect(caller, service_sid, 1).expect("connect succeeds");
    let result = spm.call(caller, channel, in_vec, out_vec).expect("call succeeds");
    spm.close(caller, channel).expect("close succeeds");
    result
}

fn its_set(spm: &Spm<TestHal>, caller: i32, uid: u32, payload: &[u8], flags: u32) -> i32 {
    let mut header = [0u8; 8];
    header[0..4].copy_from_slice(&uid.to_le_bytes());
    header[4..8].copy_from_slice(&flags.to_le_bytes());
    let in_vec = [
        IoVec { ptr: header.as_ptr() as usize, len: header.len() },
        IoVec { ptr: payload.as_ptr() as usize, len: payload.len() },
    ];
    call_its(spm, caller, sid::ITS_SET, &in_vec, &[])
}

fn its_get(spm: &Spm<TestHal>, caller: i32, uid: u32, offset: u32, out: &mut [u8]) -> i32 {
    let mut header = [0u8; 8];
    header[0..4].copy_from_slice(&uid.to_le_bytes());
    header[4..8].copy_from_slice(&offset.to_le_bytes());
    let in_vec = [IoVec { ptr: header.as_ptr() as usize, len: header.len() }];
    let out_vec = [IoVec { ptr: out.as_mut_ptr() as usize, len: out.len() }];
    call_its(spm, caller, sid::ITS_GET, &in_vec, &out_vec)
}

/// Returns `Some((size, flags))` on success, `None` if `get_info` failed
/// (the E2E scenarios' `file_exists` check).
fn its_info(spm: &Spm<TestHal>, caller: i32, uid: u32) -> Option<(u32, u32)> {
    let header = uid.to_le_bytes();
    let in_vec = [IoVec { ptr: header.as_ptr() as usize, len: header.len() }];
    let mut out = [0u8; 8];
    let out_vec = [IoVec { ptr: out.as_mut_ptr() as usize, len: out.len() }];
    let result = call_its(spm, caller, sid::ITS_INFO, &in_vec, &out_vec);
    if result != status::SUCCESS {
        return None;
    }
    let size = u32::from_le_bytes(out[0..4].try_into().unwrap());
    let flags = u32::from_le_bytes(out[4..8].try_into().unwrap());
    Some((size, flags))
}

fn its_remove(spm: &Spm<TestHal>, caller: i32, uid: u32) -> i32 {
    let header = uid.to_le_bytes();
    let in_vec = [IoVec { ptr: header.as_ptr() as usize, len: header.len() }];
    call_its(spm, caller, sid::ITS_REMOVE, &in_vec, &[])
}

#[test]
fn e2e_2_basic_its_round_trip() {
    let spm = start_its();
    let caller = 10;
    let bytes: Vec<u8> = (0..16).collect();

    assert_eq!(its_info(&spm, caller, 5), None);
    assert_eq!(its_set(&spm, caller, 5, &bytes, 0), status::SUCCESS);
    assert_eq!(its_info(&spm, caller, 5), Some((16, 0)));

    let mut buf = vec![0u8; 16];
    assert_eq!(its_get(&spm, caller, 5, 0, &mut buf), status::SUCCESS);
    assert_eq!(buf, bytes);

    assert_eq!(its_remove(&spm, caller, 5), status::SUCCESS);
    assert_eq!(its_info(&spm, caller, 5), None);
}

#[test]
fn e2e_3_cross_partition_rejection() {
    let spm = start_its();
    let p1 = 11;
    let p2 = 12;

    assert_eq!(its_set(&spm, p1, 7, b"alpha", 0), status::SUCCESS);

    let mut buf = [0u8; 5];
    assert_eq!(its_get(&spm, p2, 7, 0, &mut buf), status::KEY_NOT_FOUND);

    let mut buf = [0u8; 5];
    assert_eq!(its_get(&spm, p1, 7, 0, &mut buf), status::SUCCESS);
    assert_eq!(&buf, b"alpha");
}

#[test]
fn e2e_4_write_once() {
    let spm = start_its();
    let caller = 13;

    assert_eq!(its_set(&spm, caller, 9, b"v1", ITS_WRITE_ONCE_FLAG), status::SUCCESS);
    assert_eq!(its_set(&spm, caller, 9, b"v2", 0), status::FLAGS_SET_AFTER_CREATE);

    let mut buf = [0u8; 2];
    assert_eq!(its_get(&spm, caller, 9, 0, &mut buf), status::SUCCESS);
    assert_eq!(&buf, b"v1");
}

#[test]
fn e2e_5_bad_offset() {
    let spm = start_its();
    let caller = 14;

    assert_eq!(its_set(&spm, caller, 11, b"abcd", 0), status::SUCCESS);
    let mut buf = [0u8; 1];
    assert_eq!(its_get(&spm, caller, 11, 5, &mut buf), status::OFFSET_INVALID);
}

#[test]
fn e2e_6_high_uid_rejected() {
    let spm = start_its();
    let caller = 15;

    assert_eq!(its_set(&spm, caller, 0x0001_0000, b"x", 0), status::INVALID_KEY);
}
