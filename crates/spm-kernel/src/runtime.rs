//! The `Spm` runtime: wires `spm-kernel-core`'s pure state machine to a
//! `Hal`, a set of partition threads, and `spm-audit` logging.
//!
//! Unlike the donor's single-threaded, message-queue-simulated `Kernel<H>`,
//! partitions here are real OS threads blocked on a per-partition condvar
//! (spec.md §9 DESIGN NOTES: "map to a task/fiber per partition... signal-wait
//! is a condition variable over a bitmask"). A client call enqueues a
//! message and blocks on its own completion handle until the serving
//! partition thread calls `reply`.

use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex};

use spm_audit::Gateway;
use spm_hal::{Hal, MemoryRegions};
use spm_kernel_core::{config, Handle, SpmState};

use crate::partition::{PartitionDescriptor, PartitionRuntime};

/// One-shot rendezvous a client call blocks on until the serving partition
/// calls `reply`.
pub(crate) struct Completion {
    result: Mutex<Option<i32>>,
    cv: Condvar,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self {
            result: Mutex::new(None),
            cv: Condvar::new(),
        }
    }

    pub(crate) fn set(&self, status: i32) {
        let mut slot = self.result.lock().unwrap();
        *slot = Some(status);
        self.cv.notify_all();
    }

    pub(crate) fn wait(&self) -> i32 {
        let mut slot = self.result.lock().unwrap();
        while slot.is_none() {
            slot = self.cv.wait(slot).unwrap();
        }
        slot.unwrap()
    }
}

pub struct Spm<H: Hal> {
    pub(crate) hal: H,
    pub(crate) regions: Box<dyn MemoryRegions>,
    pub(crate) state: Mutex<SpmState>,
    pub(crate) gateway: Mutex<Gateway>,
    pub(crate) partitions: Vec<PartitionRuntime>,
    pub(crate) completions: Mutex<BTreeMap<Handle, Arc<Completion>>>,
    /// Maps a pending/in-flight active message's handle back to the
    /// channel handle a client is blocked on, so `reply` (which only sees
    /// the message handle) can resolve which completion to signal and
    /// which channel's FSM to drive.
    pub(crate) messages_to_channels: Mutex<BTreeMap<Handle, Handle>>,
}

impl<H: Hal> Spm<H> {
    pub fn new(hal: H, regions: Box<dyn MemoryRegions>, descriptors: &'static [PartitionDescriptor]) -> Self {
        let boot_timestamp = hal.now_nanos();
        Self {
            hal,
            regions,
            state: Mutex::new(SpmState::new(config::MAX_HANDLES)),
            gateway: Mutex::new(Gateway::new(boot_timestamp)),
            partitions: descriptors.iter().map(|d| PartitionRuntime::new(*d)).collect(),
            completions: Mutex::new(BTreeMap::new()),
            messages_to_channels: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// Halt the entire secure world (spec.md §5 "Failure isolation"). Used
    /// for both CAS-mismatch programming errors and the Server API's
    /// `panic` operation.
    pub(crate) fn halt(&self, partition_id: spm_kernel_core::PartitionId, reason: u32) -> ! {
        let mut gateway = self.gateway.lock().unwrap();
        let timestamp = self.hal.now_nanos();
        gateway.append_internal_commit(
            spm_audit::CommitType::PartitionFaulted { partition: partition_id as u32, reason },
            timestamp,
        );
        spm_audit::panic::halt(&mut gateway, partition_id as u32, reason, timestamp)
    }

    pub(crate) fn partition_runtime(&self, id: spm_kernel_core::PartitionId) -> &PartitionRuntime {
        self.partitions
            .iter()
            .find(|p| p.descriptor.id == id)
            .unwrap_or_else(|| self.halt(id, FAULT_UNKNOWN_PARTITION))
    }

    pub(crate) fn find_service(&self, sid: spm_kernel_core::Sid) -> Option<(&PartitionRuntime, crate::partition::RotService)> {
        self.partitions
            .iter()
            .find_map(|p| p.descriptor.find_service(sid).map(|svc| (p, *svc)))
    }

    /// Log a Client/Server API request to the audit trail (spec.md §6, the
    /// donor's `SysLog`-everything pattern). Held just long enough to append
    /// one event — never across a blocking `wait`.
    pub(crate) fn audit_request(&self, partition_id: spm_kernel_core::PartitionId, syscall: u32, args: [u32; 4]) -> spm_audit::EventId {
        let timestamp = self.hal.now_nanos();
        self.gateway.lock().unwrap().syslog_mut().log_request(partition_id as u32, syscall, args, timestamp)
    }

    pub(crate) fn audit_response(&self, partition_id: spm_kernel_core::PartitionId, request_id: spm_audit::EventId, result: i64) {
        let timestamp = self.hal.now_nanos();
        self.gateway
            .lock()
            .unwrap()
            .syslog_mut()
            .log_response(partition_id as u32, request_id, result, timestamp);
    }

    /// Append a commit recording a state mutation, for use by service
    /// partitions (via `spm-process::ServerContext::audit_commit`) as well
    /// as internal bookkeeping in this crate (e.g. a channel transition
    /// driven by a server `reply` running on a different thread than the
    /// client that logged the request).
    pub fn audit_commit(&self, commit_type: spm_audit::CommitType) -> spm_audit::CommitId {
        let timestamp = self.hal.now_nanos();
        self.gateway.lock().unwrap().append_internal_commit(commit_type, timestamp)
    }
}

/// Fault reason codes passed to `spm_audit::panic::halt`. Not part of the
/// public wire protocol — purely for the audit trail's `Fatal` event.
pub(crate) const FAULT_CHANNEL_CAS: u32 = 1;
pub(crate) const FAULT_UNEXPECTED_MESSAGE_TYPE: u32 = 2;
pub(crate) const FAULT_BUFFER_ACCESS: u32 = 3;
pub(crate) const FAULT_UNKNOWN_PARTITION: u32 = 4;
pub(crate) const FAULT_EXPLICIT_PANIC: u32 = 5;
