//! System event log (`SysLog`).
//!
//! Records every Server API / Client API call (request and response) for
//! audit purposes. This is the crate's substitute for a general-purpose
//! logging facade: append-only, bounded, and structured rather than
//! free-text.

use crate::types::{EventId, PartitionId};
use serde::{Deserialize, Serialize};

/// A single audit event: either the request or response half of one call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SysEvent {
    /// Unique, monotonically increasing event ID.
    pub id: EventId,
    /// Partition that issued (or received the result of) the call.
    pub partition_id: PartitionId,
    /// Nanoseconds since boot.
    pub timestamp: u64,
    pub kind: SysEventKind,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SysEventKind {
    /// A Client or Server API call, about to execute.
    Request {
        syscall: u32,
        args: [u32; 4],
    },
    /// The outcome of a previously logged request.
    Response {
        request_id: EventId,
        result: i64,
    },
    /// The last event appended before a fatal panic halts the system
    /// (spec.md §7 fatal tier).
    Fatal {
        reason: u32,
    },
}

/// Maximum events retained; the log evicts the oldest entries once full
/// rather than growing without bound.
const MAX_SYSLOG_EVENTS: usize = 10_000;

/// Append-only audit trail of Client/Server API traffic.
pub struct SysLog {
    events: Vec<SysEvent>,
    next_id: EventId,
}

impl SysLog {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_id: 0,
        }
    }

    pub fn log_request(
        &mut self,
        partition_id: PartitionId,
        syscall: u32,
        args: [u32; 4],
        timestamp: u64,
    ) -> EventId {
        let id = self.next_id;
        self.next_id += 1;
        self.events.push(SysEvent {
            id,
            partition_id,
            timestamp,
            kind: SysEventKind::Request { syscall, args },
        });
        self.trim_if_needed();
        id
    }

    pub fn log_response(
        &mut self,
        partition_id: PartitionId,
        request_id: EventId,
        result: i64,
        timestamp: u64,
    ) -> EventId {
        let id = self.next_id;
        self.next_id += 1;
        self.events.push(SysEvent {
            id,
            partition_id,
            timestamp,
            kind: SysEventKind::Response { request_id, result },
        });
        self.trim_if_needed();
        id
    }

    /// Log the terminal event before a fatal panic. Called once, right
    /// before the system halts.
    pub fn log_fatal(&mut self, partition_id: PartitionId, reason: u32, timestamp: u64) -> EventId {
        let id = self.next_id;
        self.next_id += 1;
        self.events.push(SysEvent {
            id,
            partition_id,
            timestamp,
            kind: SysEventKind::Fatal { reason },
        });
        id
    }

    pub fn events(&self) -> &[SysEvent] {
        &self.events
    }

    pub fn get_recent(&self, count: usize) -> Vec<&SysEvent> {
        self.events.iter().rev().take(count).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn next_id(&self) -> EventId {
        self.next_id
    }

    fn trim_if_needed(&mut self) {
        if self.events.len() > MAX_SYSLOG_EVENTS {
            let drain_count = self.events.len() - MAX_SYSLOG_EVENTS;
            self.events.drain(0..drain_count);
        }
    }
}

impl Default for SysLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_then_response_are_correlated() {
        let mut log = SysLog::new();
        let req_id = log.log_request(1, 0x01, [10, 20, 30, 40], 1000);
        assert_eq!(req_id, 0);
        log.log_response(1, req_id, 42, 1100);
        assert_eq!(log.len(), 2);

        match &log.events()[1].kind {
            SysEventKind::Response { request_id, result } => {
                assert_eq!(*request_id, req_id);
                assert_eq!(*result, 42);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn log_evicts_oldest_once_over_capacity() {
        let mut log = SysLog::new();
        for i in 0..(MAX_SYSLOG_EVENTS + 10) {
            log.log_request(1, 0x01, [i as u32, 0, 0, 0], i as u64);
        }
        assert_eq!(log.len(), MAX_SYSLOG_EVENTS);
        // The oldest surviving event is the 11th ever logged (index 10).
        match &log.events()[0].kind {
            SysEventKind::Request { args, .. } => assert_eq!(args[0], 10),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn fatal_event_is_recorded_without_a_response() {
        let mut log = SysLog::new();
        log.log_request(2, 0x01, [0, 0, 0, 0], 0);
        log.log_fatal(2, 7, 1);
        assert_eq!(log.len(), 2);
        assert!(matches!(log.events()[1].kind, SysEventKind::Fatal { reason: 7 }));
    }
}
