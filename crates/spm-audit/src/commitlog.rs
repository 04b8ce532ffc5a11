//! Commit log for deterministic replay.
//!
//! Every `spm-kernel-core` state mutation returns `Vec<CommitType>`
//! alongside its `Result`; `spm-kernel` appends each one here. Replaying a
//! `CommitLog` from genesis reconstructs the exact sequence of state changes
//! that produced it — the property this repo substitutes for a database
//! transaction log.

use crate::types::{CommitId, EventId, PartitionId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Commit {
    /// Hash of this commit's contents, chained to `prev_commit`.
    pub id: CommitId,
    pub prev_commit: CommitId,
    pub seq: u64,
    pub timestamp: u64,
    pub commit_type: CommitType,
    /// The `SysLog` request event that caused this commit, if any —
    /// `None` for commits the kernel makes on its own (e.g. timer cleanup).
    pub caused_by: Option<EventId>,
}

/// A discrete state mutation, replayable against `spm_kernel_core::SpmState`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CommitType {
    Genesis,

    ChannelCreated {
        channel: u32,
        client: PartitionId,
        server: PartitionId,
    },
    ChannelStateChanged {
        channel: u32,
        from: u8,
        to: u8,
    },
    ChannelClosed {
        channel: u32,
    },

    MessageDelivered {
        channel: u32,
        tag: u32,
        size: usize,
    },

    ItsRecordWritten {
        uid: u32,
        owner: i32,
        size: usize,
    },
    ItsRecordRemoved {
        uid: u32,
        owner: i32,
    },

    PartitionFaulted {
        partition: PartitionId,
        reason: u32,
    },
}

const MAX_COMMITLOG_ENTRIES: usize = 100_000;

pub struct CommitLog {
    commits: Vec<Commit>,
    next_seq: u64,
    last_hash: CommitId,
}

impl CommitLog {
    pub fn new(timestamp: u64) -> Self {
        let genesis = Commit {
            id: [0u8; 32],
            prev_commit: [0u8; 32],
            seq: 0,
            timestamp,
            commit_type: CommitType::Genesis,
            caused_by: None,
        };
        let id = Self::compute_hash(&genesis);
        let genesis = Commit { id, ..genesis };

        Self {
            commits: vec![genesis],
            next_seq: 1,
            last_hash: id,
        }
    }

    pub fn append(
        &mut self,
        commit_type: CommitType,
        caused_by: Option<EventId>,
        timestamp: u64,
    ) -> CommitId {
        let commit = Commit {
            id: [0u8; 32],
            prev_commit: self.last_hash,
            seq: self.next_seq,
            timestamp,
            commit_type,
            caused_by,
        };
        let id = Self::compute_hash(&commit);
        let commit = Commit { id, ..commit };

        self.last_hash = id;
        self.next_seq += 1;
        self.commits.push(commit);
        self.trim_if_needed();
        id
    }

    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn current_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn head(&self) -> CommitId {
        self.last_hash
    }

    /// Recompute every commit's hash and check it against the stored chain.
    /// A mismatch means the in-memory log was corrupted or tampered with.
    pub fn verify_integrity(&self) -> bool {
        let mut prev = [0u8; 32];
        for (i, commit) in self.commits.iter().enumerate() {
            if i > 0 && commit.prev_commit != prev {
                return false;
            }
            let recomputed = Self::compute_hash(&Commit {
                id: [0u8; 32],
                ..commit.clone()
            });
            if recomputed != commit.id {
                return false;
            }
            prev = commit.id;
        }
        true
    }

    /// FNV-1a over the commit's fields. Not cryptographically strong; this
    /// is a tamper-evidence chain for deterministic-replay debugging, not a
    /// security boundary.
    fn compute_hash(commit: &Commit) -> CommitId {
        const FNV_OFFSET: u64 = 0xcbf29ce484222325;
        const FNV_PRIME: u64 = 0x100000001b3;
        let mut hash = FNV_OFFSET;

        let mut mix = |bytes: &[u8]| {
            for &byte in bytes {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        };

        mix(&commit.prev_commit);
        mix(&commit.seq.to_le_bytes());
        mix(&commit.timestamp.to_le_bytes());

        match &commit.commit_type {
            CommitType::Genesis => mix(&[0]),
            CommitType::ChannelCreated { channel, client, server } => {
                mix(&[1]);
                mix(&channel.to_le_bytes());
                mix(&client.to_le_bytes());
                mix(&server.to_le_bytes());
            }
            CommitType::ChannelStateChanged { channel, from, to } => {
                mix(&[2]);
                mix(&channel.to_le_bytes());
                mix(&[*from, *to]);
            }
            CommitType::ChannelClosed { channel } => {
                mix(&[3]);
                mix(&channel.to_le_bytes());
            }
            CommitType::MessageDelivered { channel, tag, size } => {
                mix(&[4]);
                mix(&channel.to_le_bytes());
                mix(&tag.to_le_bytes());
                mix(&(*size as u64).to_le_bytes());
            }
            CommitType::ItsRecordWritten { uid, owner, size } => {
                mix(&[5]);
                mix(&uid.to_le_bytes());
                mix(&owner.to_le_bytes());
                mix(&(*size as u64).to_le_bytes());
            }
            CommitType::ItsRecordRemoved { uid, owner } => {
                mix(&[6]);
                mix(&uid.to_le_bytes());
                mix(&owner.to_le_bytes());
            }
            CommitType::PartitionFaulted { partition, reason } => {
                mix(&[7]);
                mix(&partition.to_le_bytes());
                mix(&reason.to_le_bytes());
            }
        }

        let mut out = [0u8; 32];
        out[..8].copy_from_slice(&hash.to_le_bytes());
        out
    }

    fn trim_if_needed(&mut self) {
        if self.commits.len() > MAX_COMMITLOG_ENTRIES {
            let drain_count = self.commits.len() - MAX_COMMITLOG_ENTRIES;
            self.commits.drain(0..drain_count);
        }
    }
}
