//! Common identifiers shared by the audit trail and the commit ledger.

/// Partition identifier (matches `spm_kernel_core`'s `PartitionId`).
pub type PartitionId = u32;

/// Event identifier, monotonic and unique within a `SysLog`.
pub type EventId = u64;

/// Commit identifier: a 32-byte hash chaining each commit to its predecessor.
pub type CommitId = [u8; 32];
