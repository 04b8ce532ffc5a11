//! SPM runtime: wires `spm-kernel-core`'s pure channel/message/handle state
//! machine to real partition threads, a `Hal`, and `spm-audit` logging.
//!
//! This crate is the HAL-backed counterpart to `spm-kernel-core` — the same
//! split the donor draws between `zos-kernel-core` (pure) and `zos-kernel`
//! (runtime). [`Spm`] is the entry point: construct one per boot image with
//! [`Spm::new`], then drive it through the [`client`] module from NSPE/
//! cross-partition callers and the [`server`] module from partition threads.

pub mod client;
pub mod errors;
pub mod partition;
pub mod runtime;
pub mod server;

pub use errors::{CallError, CloseError, ConnectError};
pub use partition::{PartitionDescriptor, PartitionRuntime, RotService};
pub use runtime::Spm;
