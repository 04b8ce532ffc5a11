//! Audit gateway: the single entry point every Client/Server API call flows
//! through.
//!
//! For each call the gateway:
//! 1. Logs the request to `SysLog`.
//! 2. Runs the caller-supplied kernel operation.
//! 3. Appends any resulting commits to `CommitLog`.
//! 4. Logs the response to `SysLog`.
//!
//! This is how the repo gets "every mutation is audited and replayable"
//! without threading logging calls through every `spm-kernel-core` function.

use crate::commitlog::{CommitLog, CommitType};
use crate::syslog::SysLog;
use crate::types::{CommitId, EventId, PartitionId};

pub struct Gateway {
    syslog: SysLog,
    commitlog: CommitLog,
}

impl Gateway {
    pub fn new(boot_timestamp: u64) -> Self {
        Self {
            syslog: SysLog::new(),
            commitlog: CommitLog::new(boot_timestamp),
        }
    }

    /// Run one Client/Server API call through the gateway.
    ///
    /// `op` executes the actual state transition and returns its wire
    /// result alongside the commits it produced; the gateway takes care of
    /// audit logging and commit-chain bookkeeping around it.
    pub fn call<F>(
        &mut self,
        partition_id: PartitionId,
        syscall: u32,
        args: [u32; 4],
        timestamp: u64,
        mut op: F,
    ) -> (i64, Vec<CommitId>)
    where
        F: FnMut(u32, [u32; 4]) -> (i64, Vec<CommitType>),
    {
        let request_id = self.syslog.log_request(partition_id, syscall, args, timestamp);
        let (result, commit_types) = op(syscall, args);
        let commit_ids = commit_types
            .into_iter()
            .map(|ct| self.commitlog.append(ct, Some(request_id), timestamp))
            .collect();
        self.syslog.log_response(partition_id, request_id, result, timestamp);
        (result, commit_ids)
    }

    pub fn syslog(&self) -> &SysLog {
        &self.syslog
    }

    pub fn syslog_mut(&mut self) -> &mut SysLog {
        &mut self.syslog
    }

    pub fn commitlog(&self) -> &CommitLog {
        &self.commitlog
    }

    /// Append a commit that didn't originate from a syscall (e.g. boot-time
    /// partition registration).
    pub fn append_internal_commit(&mut self, commit_type: CommitType, timestamp: u64) -> CommitId {
        self.commitlog.append(commit_type, None, timestamp)
    }

    pub fn verify_integrity(&self) -> bool {
        self.commitlog.verify_integrity()
    }

    pub fn state_summary(&self) -> GatewayState {
        GatewayState {
            syslog_len: self.syslog.len(),
            syslog_next_id: self.syslog.next_id(),
            commitlog_len: self.commitlog.len(),
            commitlog_seq: self.commitlog.current_seq(),
            commitlog_head: self.commitlog.head(),
        }
    }

    /// Record the terminal `SysEvent` for a fatal panic and return the
    /// event ID, without itself halting the system — the caller (always
    /// `spm_audit::panic`) does that.
    pub fn log_fatal(&mut self, partition_id: PartitionId, reason: u32, timestamp: u64) -> EventId {
        self.syslog.log_fatal(partition_id, reason, timestamp)
    }
}

#[derive(Clone, Debug)]
pub struct GatewayState {
    pub syslog_len: usize,
    pub syslog_next_id: EventId,
    pub commitlog_len: usize,
    pub commitlog_seq: u64,
    pub commitlog_head: CommitId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_starts_with_genesis_and_empty_syslog() {
        let gateway = Gateway::new(0);
        assert_eq!(gateway.syslog().len(), 0);
        assert_eq!(gateway.commitlog().len(), 1);
    }

    #[test]
    fn call_with_no_commits_still_logs_request_and_response() {
        let mut gateway = Gateway::new(0);
        let (result, commits) = gateway.call(1, 0x01, [0; 4], 1000, |_, _| (42, Vec::new()));
        assert_eq!(result, 42);
        assert!(commits.is_empty());
        assert_eq!(gateway.syslog().len(), 2);
        assert_eq!(gateway.commitlog().len(), 1);
    }

    #[test]
    fn call_with_commits_appends_them_caused_by_the_request() {
        let mut gateway = Gateway::new(0);
        let (result, commits) = gateway.call(1, 0x11, [0; 4], 1000, |_, _| {
            (
                0,
                vec![CommitType::ChannelCreated { channel: 1, client: 1, server: 2 }],
            )
        });
        assert_eq!(result, 0);
        assert_eq!(commits.len(), 1);
        assert_eq!(gateway.commitlog().len(), 2);
        assert_eq!(gateway.commitlog().commits()[1].caused_by, Some(0));
    }

    #[test]
    fn internal_commit_bypasses_syslog() {
        let mut gateway = Gateway::new(0);
        gateway.append_internal_commit(CommitType::ChannelClosed { channel: 1 }, 1000);
        assert_eq!(gateway.syslog().len(), 0);
        assert_eq!(gateway.commitlog().len(), 2);
    }

    #[test]
    fn repeated_calls_keep_the_commit_chain_verifiable() {
        let mut gateway = Gateway::new(0);
        for i in 0..5 {
            gateway.call(1, 0x11, [i, 0, 0, 0], i as u64, |_, _| {
                (0, vec![CommitType::ChannelClosed { channel: i }])
            });
        }
        assert_eq!(gateway.commitlog().len(), 6);
        assert!(gateway.verify_integrity());
    }
}
