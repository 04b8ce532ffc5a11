//! `Send`/`Sync` wrappers for the raw invec/outvec pointers the handle pool
//! carries across the client thread (that issued the call) and the server
//! partition thread (that services it). Neither pointer type is `Send` by
//! default; these wrappers assert, in one audited place, that the handle
//! manager's lifetime discipline makes that safe.

use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

/// Wraps a `T` that is not `Send`/`Sync` so it can be stored in a handle
/// pool slot shared between the client and server threads of a channel.
///
/// # Safety invariant
///
/// The caller must ensure `T` is never concurrently accessed from two
/// threads at once. The SPM handle manager upholds this by construction:
/// a channel's active message is owned by exactly one side (client or
/// server) at any point in its state machine (spec.md §4.2), so the inner
/// value is only ever touched by whichever thread currently holds the
/// handle.
#[repr(transparent)]
pub struct SendSyncSlot<T>(T);

impl<T> SendSyncSlot<T> {
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for SendSyncSlot<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for SendSyncSlot<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

// SAFETY: see the invariant documented on `SendSyncSlot`.
unsafe impl<T> Send for SendSyncSlot<T> {}
// SAFETY: see the invariant documented on `SendSyncSlot`.
unsafe impl<T> Sync for SendSyncSlot<T> {}

impl<T: Clone> Clone for SendSyncSlot<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Default> Default for SendSyncSlot<T> {
    fn default() -> Self {
        Self(T::default())
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for SendSyncSlot<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// A raw, non-null pointer wrapped as `Send`/`Sync` for crossing the
/// client/server thread boundary, used for the invec/outvec base addresses
/// stored in an `ActiveMessage`.
///
/// # Safety invariant
///
/// Constructing a `SendSyncPtr` asserts that the pointed-to memory outlives
/// every use of the pointer and that aliasing rules are upheld by the
/// channel state machine (only one side dereferences a given vector at a
/// time; the server's `read`/`write`/`skip` operations are the only code
/// that dereferences these pointers, and only while the owning channel is
/// in the `Active` state).
pub struct SendSyncPtr<T> {
    ptr: NonNull<T>,
}

impl<T> SendSyncPtr<T> {
    /// # Safety
    /// `ptr` must be non-dangling for as long as this wrapper is alive and
    /// must not be concurrently aliased in a way that violates Rust's
    /// aliasing rules.
    pub unsafe fn new(ptr: NonNull<T>) -> Self {
        Self { ptr }
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// # Safety
    /// The caller must uphold the invariant documented on this type.
    pub unsafe fn as_ref(&self) -> &T {
        self.ptr.as_ref()
    }

    /// # Safety
    /// The caller must uphold the invariant documented on this type.
    pub unsafe fn as_mut(&mut self) -> &mut T {
        self.ptr.as_mut()
    }
}

// SAFETY: see the invariant documented on `SendSyncPtr`.
unsafe impl<T> Send for SendSyncPtr<T> {}
// SAFETY: see the invariant documented on `SendSyncPtr`.
unsafe impl<T> Sync for SendSyncPtr<T> {}

impl<T> Clone for SendSyncPtr<T> {
    fn clone(&self) -> Self {
        Self { ptr: self.ptr }
    }
}

impl<T> Copy for SendSyncPtr<T> {}

impl<T> core::fmt::Debug for SendSyncPtr<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SendSyncPtr").field("ptr", &self.ptr).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_roundtrips_value() {
        let slot = SendSyncSlot::new(42u32);
        assert_eq!(*slot, 42);
        assert_eq!(slot.into_inner(), 42);
    }

    #[test]
    fn slot_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SendSyncSlot<core::cell::Cell<u32>>>();
    }

    #[test]
    fn ptr_roundtrips_through_as_ref() {
        let mut value = 7i32;
        let ptr = unsafe { SendSyncPtr::new(NonNull::new(&mut value as *mut i32).unwrap()) };
        assert_eq!(unsafe { *ptr.as_ref() }, 7);
    }

    #[test]
    fn ptr_is_copy() {
        let mut value = 1u8;
        let ptr = unsafe { SendSyncPtr::new(NonNull::new(&mut value as *mut u8).unwrap()) };
        let copy = ptr;
        assert_eq!(ptr.as_ptr(), copy.as_ptr());
    }
}

#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn concurrent_slot_access_is_race_free_under_external_exclusion() {
        loom::model(|| {
            let slot = Arc::new(SendSyncSlot::new(loom::sync::atomic::AtomicUsize::new(0)));
            let a = slot.clone();
            let b = slot.clone();
            let t1 = thread::spawn(move || {
                a.store(1, core::sync::atomic::Ordering::SeqCst);
            });
            let t2 = thread::spawn(move || {
                b.load(core::sync::atomic::Ordering::SeqCst);
            });
            t1.join().unwrap();
            t2.join().unwrap();
        });
    }
}
