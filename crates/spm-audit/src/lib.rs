//! Audit trail and deterministic-replay ledger for the SPM core.
//!
//! This crate is the logging substrate: instead of a general-purpose
//! logging facade, every Client/Server API call is recorded as a structured
//! [`SysEvent`] in a bounded [`SysLog`], and every state mutation is
//! recorded as a typed [`CommitType`] in a [`CommitLog`] with a hash chain
//! for tamper evidence. [`Gateway`] ties the two together; [`panic::halt`]
//! is the fatal-error exit used by the Server API's `panic` operation and
//! by `spm-kernel-core` invariant violations.

mod commitlog;
mod gateway;
pub mod panic;
mod syslog;
mod types;

pub use commitlog::{Commit, CommitLog, CommitType};
pub use gateway::{Gateway, GatewayState};
pub use syslog::{SysEvent, SysEventKind, SysLog};
pub use types::{CommitId, EventId, PartitionId};
