//! Hardware abstraction for the SPM core.
//!
//! This crate defines the traits the SPM core code (`spm-kernel`, `spm-its`)
//! is generic over so it can run on different platforms without depending on
//! a particular non-volatile store driver, memory-protection HAL, or debug
//! console implementation. Those concrete implementations are out of scope
//! (spec.md §1 OUT OF SCOPE) — only the trait boundary lives here, plus a
//! test-only in-memory implementation for unit tests.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use core::ops::Range;

/// Debug/time abstraction for the SPM runtime.
///
/// Implementations provide platform-specific functionality for monotonic
/// time and debug output. Production code never prints secrets through this
/// trait; it is for trace/audit output only (see `spm-audit`).
pub trait Hal: Send + Sync + 'static {
    /// Monotonic time in nanoseconds since boot.
    fn now_nanos(&self) -> u64;

    /// Write a line to the platform debug console.
    fn debug_write(&self, msg: &str);
}

/// Non-volatile store adapter (spec.md §4.5).
///
/// Contract: `set` is atomic (either the new value is fully committed or the
/// old value remains unchanged); `set_once` succeeds only on the first write
/// of a key. Implementations are expected to be synchronous and may block on
/// flash I/O — callers treat every method here as a suspension point.
pub trait NvStore: Send + Sync {
    /// Size in bytes of the record stored under `key`, or `NotFound`.
    fn get_size(&self, key: u16) -> Result<usize, NvError>;

    /// Read the first `buf.len()` bytes of the record stored under `key`
    /// into `buf`.
    ///
    /// `buf.len()` may be less than the stored record's size — callers that
    /// only need a header prefix (e.g. to check ownership before committing
    /// to a full read) pass a short buffer and avoid touching the rest of
    /// the record. `buf.len()` greater than the stored size is
    /// `NvError::BadValue`.
    fn get(&self, key: u16, buf: &mut [u8]) -> Result<(), NvError>;

    /// Write (create or overwrite) the record stored under `key`.
    fn set(&self, key: u16, data: &[u8]) -> Result<(), NvError>;

    /// Write the record stored under `key` only if it does not already
    /// exist. Subsequent calls for the same key fail with `AlreadyExists`.
    fn set_once(&self, key: u16, data: &[u8]) -> Result<(), NvError>;

    /// Delete the record stored under `key`.
    fn remove(&self, key: u16) -> Result<(), NvError>;
}

/// Errors returned by an `NvStore` implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NvError {
    /// No record exists for the given key.
    NotFound,
    /// The underlying medium rejected the write.
    WriteError,
    /// Stored data failed an integrity check on read.
    DataCorrupt,
    /// The underlying medium failed to service a read.
    ReadError,
    /// Not enough free space to commit the write.
    FlashAreaTooSmall,
    /// `set_once` was called on a key that already has a value.
    AlreadyExists,
    /// Caller-supplied key or buffer was invalid (e.g. wrong length).
    BadValue,
}

/// Secure/non-secure memory ranges reported by the platform, used by
/// `spm_primitives::is_buffer_accessible` to validate caller-provided
/// pointers before the server dereferences them (spec.md §4.3).
pub trait MemoryRegions: Send + Sync {
    /// Address range owned by the secure world's RAM.
    fn secure_ram(&self) -> Range<usize>;
    /// Address range owned by the secure world's flash.
    fn secure_flash(&self) -> Range<usize>;
}

// ============================================================================
// Test support
// ============================================================================

/// A minimal test HAL providing stub implementations for unit tests that
/// don't need platform-accurate timing or console output.
#[derive(Default)]
pub struct TestHal {
    time: core::sync::atomic::AtomicU64,
}

impl TestHal {
    pub fn new() -> Self {
        Self {
            time: core::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Advance the simulated clock (tests only).
    pub fn advance(&self, nanos: u64) {
        self.time
            .fetch_add(nanos, core::sync::atomic::Ordering::SeqCst);
    }
}

impl Hal for TestHal {
    fn now_nanos(&self) -> u64 {
        self.time.load(core::sync::atomic::Ordering::SeqCst)
    }

    fn debug_write(&self, _msg: &str) {
        // No-op for tests.
    }
}

/// A test-only memory map with a single secure RAM window and no secure
/// flash, sufficient for buffer-validation unit tests.
pub struct TestMemoryRegions {
    pub secure_ram: Range<usize>,
    pub secure_flash: Range<usize>,
}

impl MemoryRegions for TestMemoryRegions {
    fn secure_ram(&self) -> Range<usize> {
        self.secure_ram.clone()
    }

    fn secure_flash(&self) -> Range<usize> {
        self.secure_flash.clone()
    }
}

/// An in-memory `NvStore` for unit tests and the emulator build
/// (spec.md §4.7). Not suitable for production — it has no persistence
/// across process restarts and no wear-levelling.
#[derive(Default)]
pub struct InMemoryNvStore {
    records: spin_lock::Mutex<alloc::collections::BTreeMap<u16, Vec<u8>>>,
}

impl InMemoryNvStore {
    pub fn new() -> Self {
        Self {
            records: spin_lock::Mutex::new(alloc::collections::BTreeMap::new()),
        }
    }
}

impl NvStore for InMemoryNvStore {
    fn get_size(&self, key: u16) -> Result<usize, NvError> {
        let records = self.records.lock();
        records.get(&key).map(|v| v.len()).ok_or(NvError::NotFound)
    }

    fn get(&self, key: u16, buf: &mut [u8]) -> Result<(), NvError> {
        let records = self.records.lock();
        let data = records.get(&key).ok_or(NvError::NotFound)?;
        if buf.len() > data.len() {
            return Err(NvError::BadValue);
        }
        buf.copy_from_slice(&data[..buf.len()]);
        Ok(())
    }

    fn set(&self, key: u16, data: &[u8]) -> Result<(), NvError> {
        let mut records = self.records.lock();
        records.insert(key, data.to_vec());
        Ok(())
    }

    fn set_once(&self, key: u16, data: &[u8]) -> Result<(), NvError> {
        let mut records = self.records.lock();
        if records.contains_key(&key) {
            return Err(NvError::AlreadyExists);
        }
        records.insert(key, data.to_vec());
        Ok(())
    }

    fn remove(&self, key: u16) -> Result<(), NvError> {
        let mut records = self.records.lock();
        records.remove(&key).map(|_| ()).ok_or(NvError::NotFound)
    }
}

/// A tiny spinlock so `InMemoryNvStore` works in `no_std` test builds without
/// pulling in `std::sync::Mutex`. Not a general-purpose primitive — kept
/// private to this module's test support.
mod spin_lock {
    use core::cell::UnsafeCell;
    use core::sync::atomic::{AtomicBool, Ordering};

    pub struct Mutex<T> {
        locked: AtomicBool,
        data: UnsafeCell<T>,
    }

    unsafe impl<T: Send> Send for Mutex<T> {}
    unsafe impl<T: Send> Sync for Mutex<T> {}

    impl<T> Mutex<T> {
        pub const fn new(data: T) -> Self {
            Self {
                locked: AtomicBool::new(false),
                data: UnsafeCell::new(data),
            }
        }

        pub fn lock(&self) -> MutexGuard<'_, T> {
            while self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                core::hint::spin_loop();
            }
            MutexGuard { mutex: self }
        }
    }

    pub struct MutexGuard<'a, T> {
        mutex: &'a Mutex<T>,
    }

    impl<'a, T> core::ops::Deref for MutexGuard<'a, T> {
        type Target = T;
        fn deref(&self) -> &T {
            unsafe { &*self.mutex.data.get() }
        }
    }

    impl<'a, T> core::ops::DerefMut for MutexGuard<'a, T> {
        fn deref_mut(&mut self) -> &mut T {
            unsafe { &mut *self.mutex.data.get() }
        }
    }

    impl<'a, T> Drop for MutexGuard<'a, T> {
        fn drop(&mut self) {
            self.mutex.locked.store(false, Ordering::Release);
        }
    }
}
