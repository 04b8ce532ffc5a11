//! Aggregate pure state: the handle manager plus nothing else. This is the
//! verification target that `invariants::check_all` inspects and that
//! `#[cfg(kani)]` proof harnesses exercise — no HAL, no threads, no I/O.

use crate::handle::HandleManager;

pub struct SpmState {
    pub handles: HandleManager,
}

impl SpmState {
    pub fn new(handle_capacity: usize) -> Self {
        Self {
            handles: HandleManager::new(handle_capacity),
        }
    }
}
