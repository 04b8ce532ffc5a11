//! Static partition/service descriptors (spec.md §3 `Partition`, `RotService`).
//!
//! `spm-init` builds a `&'static [PartitionDescriptor]` at boot; `spm-kernel`
//! turns each into a [`PartitionRuntime`] — the live signal word, condvar,
//! and per-service message queues a partition's cooperative thread waits on.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Condvar, Mutex};

use spm_kernel_core::{Handle, PartitionId, Sid, VersionPolicy};

/// A service a partition exposes, addressed by `sid` (spec.md §3).
#[derive(Clone, Copy, Debug)]
pub struct RotService {
    pub sid: Sid,
    pub signal_bit: u32,
    pub min_version: u32,
    pub version_policy: VersionPolicy,
    pub allow_nspe: bool,
}

/// Static, boot-time description of one partition (spec.md §2 item 8,
/// §9 DESIGN NOTES "autogenerated manifest glue" — this is the typed
/// registry a build-time generator would emit; `spm-init` just lists it by
/// hand).
#[derive(Clone, Copy, Debug)]
pub struct PartitionDescriptor {
    pub id: PartitionId,
    pub name: &'static str,
    pub services: &'static [RotService],
}

impl PartitionDescriptor {
    pub fn service_mask(&self) -> u32 {
        self.services.iter().fold(0, |mask, svc| mask | (1 << svc.signal_bit))
    }

    pub fn find_service(&self, sid: Sid) -> Option<&RotService> {
        self.services.iter().find(|svc| svc.sid == sid)
    }
}

/// Live runtime state for one partition: the signal bitmask its thread
/// blocks on, and the FIFO of pending message handles per signal bit
/// (spec.md §4.4, "within a single service messages are delivered in FIFO
/// order of client-side dispatch").
pub struct PartitionRuntime {
    pub descriptor: PartitionDescriptor,
    signal: Mutex<u32>,
    cv: Condvar,
    queues: Mutex<BTreeMap<u32, VecDeque<Handle>>>,
}

impl PartitionRuntime {
    pub fn new(descriptor: PartitionDescriptor) -> Self {
        Self {
            descriptor,
            signal: Mutex::new(0),
            cv: Condvar::new(),
            queues: Mutex::new(BTreeMap::new()),
        }
    }

    /// Enqueue `message` on `signal_bit` and wake the partition thread.
    pub fn post(&self, signal_bit: u32, message: Handle) {
        self.queues.lock().unwrap().entry(signal_bit).or_default().push_back(message);
        let mut signal = self.signal.lock().unwrap();
        *signal |= 1 << signal_bit;
        self.cv.notify_all();
    }

    /// `wait(mask, blocking)`: blocks until any bit in `mask` is set, or
    /// returns immediately if `blocking` is `false` (spec.md §4.4 `PSA_POLL`).
    pub fn wait(&self, mask: u32, blocking: bool) -> u32 {
        let mut signal = self.signal.lock().unwrap();
        if blocking {
            while *signal & mask == 0 {
                signal = self.cv.wait(signal).unwrap();
            }
        }
        *signal & mask
    }

    /// `get(bit, &msg)`: dequeue the oldest pending message for `bit`.
    /// Clears the bit once its queue runs empty.
    pub fn get(&self, bit: u32) -> Option<Handle> {
        let mut queues = self.queues.lock().unwrap();
        let queue = queues.get_mut(&bit)?;
        let message = queue.pop_front();
        if queue.is_empty() {
            let mut signal = self.signal.lock().unwrap();
            *signal &= !(1 << bit);
        }
        message
    }
}
