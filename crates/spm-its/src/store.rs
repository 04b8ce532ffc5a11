//! ITS operations (spec.md §4.6): `set`, `get`, `get_info`, `remove`.

use spm_hal::NvStore;
use spm_ipc::ITS_WRITE_ONCE_FLAG;
use spm_kernel_core::types::PartitionId;
#[cfg(feature = "emulator")]
use spm_kernel_core::types::INVALID_SOURCE;

use crate::errors::ItsError;
use crate::header::{Header, HEADER_SIZE};

/// `get_info` result (spec.md §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ItsInfo {
    pub size: usize,
    pub flags: u32,
}

/// The owner identity a record is stamped with, and the identity an owner
/// check compares against. In the `emulator` build both collapse to
/// `INVALID_SOURCE` (spec.md §4.7).
#[cfg(feature = "emulator")]
fn effective_identity(_caller: PartitionId) -> PartitionId {
    INVALID_SOURCE
}

#[cfg(not(feature = "emulator"))]
fn effective_identity(caller: PartitionId) -> PartitionId {
    caller
}

fn validate_uid(uid: u32) -> Result<u16, ItsError> {
    if uid & 0xFFFF_0000 != 0 {
        return Err(ItsError::InvalidKey);
    }
    Ok(uid as u16)
}

/// Internal Trusted Storage over an `NvStore`. Stateless beyond the
/// borrowed store reference — all per-record state lives in NV.
pub struct ItsStore<'a, N: NvStore> {
    nv: &'a N,
}

impl<'a, N: NvStore> ItsStore<'a, N> {
    pub fn new(nv: &'a N) -> Self {
        Self { nv }
    }

    /// `set(uid, data, create_flags)` (spec.md §4.6 steps 1-4).
    pub fn set(&self, caller: PartitionId, uid: u32, data: &[u8], create_flags: u32) -> Result<(), ItsError> {
        let key = validate_uid(uid)?;

        let header = Header {
            owner_identity: effective_identity(caller),
            create_flags,
        };
        let mut record = Vec::with_capacity(HEADER_SIZE + data.len());
        record.extend_from_slice(&header.encode());
        record.extend_from_slice(data);

        let result = if create_flags & ITS_WRITE_ONCE_FLAG != 0 {
            self.nv.set_once(key, &record)
        } else {
            self.nv.set(key, &record)
        };

        // Zero the scratch buffer before it is dropped (spec.md §4.6 "On
        // exit, zero the scratch buffer before releasing it").
        record.iter_mut().for_each(|b| *b = 0);

        result.map_err(ItsError::from_set_error)
    }

    /// `get(uid, offset, length, out)` (spec.md §4.6 steps 1-3). `length`
    /// is `out.len()`.
    pub fn get(&self, caller: PartitionId, uid: u32, offset: usize, out: &mut [u8]) -> Result<(), ItsError> {
        let key = validate_uid(uid)?;
        let length = out.len();

        let item_size = self.nv.get_size(key).map_err(ItsError::from_size_error)?;
        if HEADER_SIZE + offset > item_size {
            return Err(ItsError::OffsetInvalid);
        }
        if HEADER_SIZE + offset + length > item_size {
            return Err(ItsError::IncorrectSize);
        }

        let mut record = Vec::with_capacity(item_size);
        record.resize(item_size, 0);
        self.nv.get(key, &mut record).map_err(ItsError::from_read_error)?;

        let header = Header::decode(&record[..HEADER_SIZE]);
        let owner_matches = header.owner_identity == effective_identity(caller);
        if !owner_matches {
            // Owner mismatch is indistinguishable from absence (spec.md §8
            // property 2: never reveal existence across owners).
            record.iter_mut().for_each(|b| *b = 0);
            return Err(ItsError::KeyNotFound);
        }

        out.copy_from_slice(&record[HEADER_SIZE + offset..HEADER_SIZE + offset + length]);
        record.iter_mut().for_each(|b| *b = 0);
        Ok(())
    }

    /// `get_info(uid)` (spec.md §4.6): `{size, flags}`, same owner check as
    /// `get`. Reads only the header (SPEC_FULL §15 `get_key_header`
    /// pattern), not the full payload.
    pub fn get_info(&self, caller: PartitionId, uid: u32) -> Result<ItsInfo, ItsError> {
        let key = validate_uid(uid)?;
        let header = self.read_header(key, caller)?;
        let item_size = self.nv.get_size(key).map_err(ItsError::from_size_error)?;
        Ok(ItsInfo {
            size: item_size - HEADER_SIZE,
            flags: header.create_flags,
        })
    }

    /// `remove(uid)` (spec.md §4.6): owner check, then NV `remove`.
    /// Write-once records cannot be removed (spec.md §9 Open Question 1).
    pub fn remove(&self, caller: PartitionId, uid: u32) -> Result<(), ItsError> {
        let key = validate_uid(uid)?;
        let header = self.read_header(key, caller)?;
        if header.create_flags & ITS_WRITE_ONCE_FLAG != 0 {
            return Err(ItsError::WriteOnce);
        }
        self.nv.remove(key).map_err(|_| ItsError::StorageFailure)
    }

    /// Read and owner-check a record's header without touching its
    /// payload, used by `get_info` and `remove`.
    fn read_header(&self, key: u16, caller: PartitionId) -> Result<Header, ItsError> {
        let mut buf = [0u8; HEADER_SIZE];
        self.nv.get(key, &mut buf).map_err(ItsError::from_read_error)?;
        let header = Header::decode(&buf);
        if header.owner_identity != effective_identity(caller) {
            return Err(ItsError::KeyNotFound);
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spm_hal::InMemoryNvStore;

    const OWNER_A: PartitionId = 1;
    const OWNER_B: PartitionId = 2;

    #[test]
    fn round_trip_set_then_get() {
        let nv = InMemoryNvStore::new();
        let store = ItsStore::new(&nv);
        let payload = b"hello world";
        store.set(OWNER_A, 5, payload, 0).unwrap();

        let mut out = [0u8; 11];
        store.get(OWNER_A, 5, 0, &mut out).unwrap();
        assert_eq!(&out, payload);
    }

    #[test]
    fn get_info_reports_payload_size_and_flags() {
        let nv = InMemoryNvStore::new();
        let store = ItsStore::new(&nv);
        store.set(OWNER_A, 5, b"0123456789abcdef", ITS_WRITE_ONCE_FLAG).unwrap();
        let info = store.get_info(OWNER_A, 5).unwrap();
        assert_eq!(info.size, 16);
        assert_eq!(info.flags, ITS_WRITE_ONCE_FLAG);
    }

    #[test]
    fn owner_isolation_cross_partition_get_is_key_not_found() {
        let nv = InMemoryNvStore::new();
        let store = ItsStore::new(&nv);
        store.set(OWNER_A, 7, b"alpha", 0).unwrap();

        let mut out = [0u8; 5];
        assert_eq!(store.get(OWNER_B, 7, 0, &mut out).unwrap_err(), ItsError::KeyNotFound);

        store.get(OWNER_A, 7, 0, &mut out).unwrap();
        assert_eq!(&out, b"alpha");
    }

    #[test]
    fn write_once_forbids_second_write_once_and_preserves_original() {
        let nv = InMemoryNvStore::new();
        let store = ItsStore::new(&nv);
        store.set(OWNER_A, 9, b"v1", ITS_WRITE_ONCE_FLAG).unwrap();
        assert_eq!(
            store.set(OWNER_A, 9, b"v2", ITS_WRITE_ONCE_FLAG).unwrap_err(),
            ItsError::FlagsSetAfterCreate
        );

        let mut out = [0u8; 2];
        store.get(OWNER_A, 9, 0, &mut out).unwrap();
        assert_eq!(&out, b"v1");
    }

    #[test]
    fn write_once_record_cannot_be_removed() {
        let nv = InMemoryNvStore::new();
        let store = ItsStore::new(&nv);
        store.set(OWNER_A, 9, b"v1", ITS_WRITE_ONCE_FLAG).unwrap();
        assert_eq!(store.remove(OWNER_A, 9).unwrap_err(), ItsError::WriteOnce);
    }

    #[test]
    fn key_space_validation_rejects_high_bits() {
        let nv = InMemoryNvStore::new();
        let store = ItsStore::new(&nv);
        assert_eq!(store.set(OWNER_A, 0x0001_0000, b"x", 0).unwrap_err(), ItsError::InvalidKey);
        let mut out = [0u8; 1];
        assert_eq!(store.get(OWNER_A, 0x0001_0000, 0, &mut out).unwrap_err(), ItsError::InvalidKey);
    }

    #[test]
    fn bad_offset_is_rejected_before_incorrect_size() {
        let nv = InMemoryNvStore::new();
        let store = ItsStore::new(&nv);
        store.set(OWNER_A, 11, b"abcd", 0).unwrap();
        let mut out = [0u8; 1];
        assert_eq!(store.get(OWNER_A, 11, 5, &mut out).unwrap_err(), ItsError::OffsetInvalid);
    }

    #[test]
    fn offset_plus_length_beyond_payload_is_incorrect_size() {
        let nv = InMemoryNvStore::new();
        let store = ItsStore::new(&nv);
        store.set(OWNER_A, 11, b"abcd", 0).unwrap();
        let mut out = [0u8; 3];
        assert_eq!(store.get(OWNER_A, 11, 2, &mut out).unwrap_err(), ItsError::IncorrectSize);
    }

    #[test]
    fn get_on_missing_key_is_key_not_found() {
        let nv = InMemoryNvStore::new();
        let store = ItsStore::new(&nv);
        let mut out = [0u8; 1];
        assert_eq!(store.get(OWNER_A, 42, 0, &mut out).unwrap_err(), ItsError::KeyNotFound);
    }

    #[test]
    fn remove_then_get_is_key_not_found() {
        let nv = InMemoryNvStore::new();
        let store = ItsStore::new(&nv);
        store.set(OWNER_A, 5, b"x", 0).unwrap();
        store.remove(OWNER_A, 5).unwrap();
        let mut out = [0u8; 1];
        assert_eq!(store.get(OWNER_A, 5, 0, &mut out).unwrap_err(), ItsError::KeyNotFound);
    }
}
