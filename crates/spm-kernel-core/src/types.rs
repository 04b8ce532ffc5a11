//! Identifiers shared across the channel/message state machines.

use serde::{Deserialize, Serialize};

/// Partition identifier. `INVALID_SOURCE` (0) is reserved (spec.md §3, §4.7).
pub type PartitionId = i32;

/// Identity stamped on records written outside any partition context
/// (emulator / NSPE direct mode, spec.md §4.7).
pub const INVALID_SOURCE: PartitionId = 0;

/// Opaque handle naming either a live channel or a live active message
/// (spec.md §4.1). Zero is never a valid handle.
pub type Handle = u32;

/// The reserved "no handle" value.
pub const INVALID_HANDLE: Handle = 0;

/// Service Identifier — the name a client uses to address a partition's
/// service (spec.md GLOSSARY).
pub type Sid = u32;

/// A {pointer, length} pair describing caller memory that crosses the trust
/// boundary (spec.md GLOSSARY "In-vector / Out-vector"). The pointer is an
/// address, not a `spm-kernel-core` reference — this crate never
/// dereferences it; only `spm-kernel`, using `spm-primitives`, does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoVec {
    pub ptr: usize,
    pub len: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionPolicy {
    /// The client's requested minor version must exactly match.
    Strict,
    /// The client's requested minor version must be `<=` the service's.
    Relaxed,
}
