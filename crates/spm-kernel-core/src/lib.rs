//! Pure, `no_std` SPM state machine.
//!
//! Everything here is deterministic, allocator-backed (`alloc` only), and
//! free of threads, HAL calls, or I/O — the same split the donor draws
//! between its `zos-kernel-core` (pure, verification-friendly) and
//! `zos-kernel` (HAL-backed runtime). `spm-kernel` wraps this crate with
//! real partition threads, a `Hal`, and `spm-audit` logging; this crate
//! only ever returns `Result`s and leaves escalation to `panic` up to the
//! caller.

#![no_std]

extern crate alloc;

pub mod channel;
pub mod config;
pub mod handle;
pub mod invariants;
pub mod message;
pub mod state;
pub mod types;

pub use channel::{Channel, ChannelError, ChannelState};
pub use handle::{Entity, HandleError, HandleManager};
pub use message::{ActiveMessage, MessageError, MessageType};
pub use state::SpmState;
pub use types::{Handle, IoVec, PartitionId, Sid, VersionPolicy, INVALID_HANDLE, INVALID_SOURCE};
