//! Fatal-tier error handling (spec.md §7).
//!
//! Recoverable errors flow back to the caller as a `Result`/status code.
//! Fatal errors — an invariant violation, a CAS mismatch that should be
//! impossible, a Server API `panic` call — never are. They go through
//! [`halt`], which logs a terminal event and stops the system. `halt` never
//! returns, by construction.

use crate::gateway::Gateway;
use core::sync::atomic::{AtomicBool, Ordering};

/// Set just before [`halt`] aborts the process. `std::process::abort()`
/// tears down every thread atomically, so no partition thread ever
/// observes a window where this is `true` and the process is still
/// running; the flag exists for `is_halted` to give test code and any
/// future non-aborting target (spec.md §9 DESIGN NOTES) a way to observe
/// that a halt occurred without catching the abort itself.
static HALTED: AtomicBool = AtomicBool::new(false);

/// `true` once any thread has called [`halt`].
pub fn is_halted() -> bool {
    HALTED.load(Ordering::SeqCst)
}

/// Log a final `SysEvent`, mark the system halted, and abort the process.
///
/// `reason` is an opaque fault code (spec.md §7's fatal tier doesn't define
/// a fixed vocabulary; callers pick one meaningful to the invariant or
/// panic they're reporting). This function does not return.
pub fn halt(gateway: &mut Gateway, partition_id: u32, reason: u32, timestamp: u64) -> ! {
    gateway.log_fatal(partition_id, reason, timestamp);
    HALTED.store(true, Ordering::SeqCst);
    std::process::abort()
}
