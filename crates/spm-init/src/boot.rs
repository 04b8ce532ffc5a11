//! Thread spin-up (spec.md §4.4, §4.8, §9 DESIGN NOTES "map to a task/fiber
//! per partition").
//!
//! Grounded on the donor's `zos-init::bootstrap` boot sequence, generalized
//! from a fixed list of `syscall::debug` spawn announcements to real OS
//! threads over the channel/message substrate this repo builds instead of
//! the donor's syscall-trap IPC.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use spm_hal::{Hal, NvStore};
use spm_its::ItsStore;
use spm_kernel::Spm;
use spm_process::ServerContext;

use crate::registry::{ITS_PARTITION_ID, ITS_ROUTES};

/// Spawns `body` as a partition's dedicated OS thread. `spm` is cloned into
/// the thread so the closure is `'static` without requiring callers to leak
/// the runtime themselves.
pub fn spawn_partition<H, F>(spm: Arc<Spm<H>>, body: F) -> JoinHandle<()>
where
    H: Hal + 'static,
    F: FnOnce(&Spm<H>) + Send + 'static,
{
    thread::spawn(move || body(&spm))
}

/// A running boot image: the shared `Spm` runtime handle plus the join
/// handle of the built-in ITS partition's thread.
///
/// Dropping a `Boot` does not stop any partition thread — partitions loop
/// forever over their own `wait`/`get`/`reply` cycle (spec.md §4.4) and are
/// only ever torn down by halting the whole secure world.
pub struct Boot<H: Hal> {
    pub spm: Arc<Spm<H>>,
    pub its_thread: JoinHandle<()>,
}

impl<H: Hal + 'static> Boot<H> {
    /// Brings up `spm` and spawns the built-in ITS partition's thread
    /// against `its_store`. Callers spawn their own partitions with
    /// [`spawn_partition`] using `boot.spm.clone()`.
    pub fn new<N: NvStore + Send + Sync + 'static>(spm: Spm<H>, its_store: N) -> Self {
        let spm = Arc::new(spm);
        let its_thread = spawn_partition(spm.clone(), move |spm| {
            let ctx = ServerContext::new(spm, ITS_PARTITION_ID);
            let store = ItsStore::new(&its_store);
            spm_its::run(&ctx, &store, ITS_ROUTES);
        });
        Self { spm, its_thread }
    }
}
