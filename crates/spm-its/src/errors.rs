//! Recoverable ITS error kinds and their NV-store/wire mappings (spec.md
//! §4.5, §7; three-way split on `get_item_size` per SPEC_FULL §15).

use spm_hal::NvError;
use spm_ipc::status;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItsError {
    InvalidKey,
    KeyNotFound,
    IncorrectSize,
    OffsetInvalid,
    InsufficientSpace,
    FlagsSetAfterCreate,
    StorageFailure,
    BadPointer,
    /// `remove` attempted on a `WRITE_ONCE` record (spec.md §9 Open
    /// Question 1: forbidden here, surfaced on the wire as
    /// `STORAGE_FAILURE`).
    WriteOnce,
}

impl ItsError {
    pub fn to_status(self) -> i32 {
        match self {
            ItsError::InvalidKey => status::INVALID_KEY,
            ItsError::KeyNotFound => status::KEY_NOT_FOUND,
            ItsError::IncorrectSize => status::INCORRECT_SIZE,
            ItsError::OffsetInvalid => status::OFFSET_INVALID,
            ItsError::InsufficientSpace => status::INSUFFICIENT_SPACE,
            ItsError::FlagsSetAfterCreate => status::FLAGS_SET_AFTER_CREATE,
            ItsError::StorageFailure | ItsError::WriteOnce => status::STORAGE_FAILURE,
            ItsError::BadPointer => status::BAD_POINTER,
        }
    }

    /// Maps `NvStore::set`/`set_once` errors (spec.md §4.5 table).
    pub(crate) fn from_set_error(err: NvError) -> Self {
        match err {
            NvError::NotFound => ItsError::KeyNotFound,
            NvError::WriteError | NvError::DataCorrupt | NvError::ReadError => ItsError::StorageFailure,
            NvError::FlashAreaTooSmall => ItsError::InsufficientSpace,
            NvError::AlreadyExists => ItsError::FlagsSetAfterCreate,
            NvError::BadValue => ItsError::BadPointer,
        }
    }

    /// Maps `NvStore::get_size` errors. `BadValue` maps to `InvalidKey` here,
    /// distinct from `set`'s `BadValue -> BadPointer` (SPEC_FULL §15).
    pub(crate) fn from_size_error(err: NvError) -> Self {
        match err {
            NvError::NotFound => ItsError::KeyNotFound,
            NvError::BadValue => ItsError::InvalidKey,
            NvError::ReadError | NvError::DataCorrupt | NvError::WriteError | NvError::FlashAreaTooSmall | NvError::AlreadyExists => {
                ItsError::StorageFailure
            }
        }
    }

    /// Maps `NvStore::get`/`remove` errors when reading a record or its
    /// header (not the `get_item_size` path above).
    pub(crate) fn from_read_error(err: NvError) -> Self {
        match err {
            NvError::NotFound => ItsError::KeyNotFound,
            _ => ItsError::StorageFailure,
        }
    }
}
