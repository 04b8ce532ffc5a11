//! Client API (spec.md §6): `connect`, `call`, `close`, `version`.
//!
//! Each entry point assembles an [`ActiveMessage`], allocates (or reuses) a
//! [`Channel`] handle, posts the message to the target partition's queue,
//! signals it, and blocks the calling thread on a [`Completion`] until the
//! serving partition calls `reply`. This mirrors the donor's
//! request/response syscall dispatch (`zos-kernel/src/syscall.rs`)
//! generalized onto the channel/message FSM instead of a flat syscall enum.

use std::sync::Arc;

use spm_audit::CommitType;
use spm_ipc::{op, status};
use spm_kernel_core::channel::{Channel, ChannelState};
use spm_kernel_core::handle::Entity;
use spm_kernel_core::message::{ActiveMessage, MessageType};
use spm_kernel_core::types::{Handle, IoVec, PartitionId, Sid, VersionPolicy};

use crate::errors::{CallError, CloseError, ConnectError};
use crate::runtime::{Completion, Spm, FAULT_CHANNEL_CAS, FAULT_UNKNOWN_PARTITION};
use spm_hal::Hal;

impl<H: Hal> Spm<H> {
    /// `connect(sid, version)` (spec.md §6). `caller` is the identity
    /// stamped on the channel (`INVALID_SOURCE` for an NSPE caller).
    pub fn connect(&self, caller: PartitionId, sid: Sid, version: u32) -> Result<Handle, ConnectError> {
        let request_id = self.audit_request(caller, op::CONNECT, [sid, version, 0, 0]);
        let outcome = self.connect_inner(caller, sid, version);
        let logged = match &outcome {
            Ok(handle) => *handle as i64,
            Err(_) => status::CONNECTION_REFUSED as i64,
        };
        self.audit_response(caller, request_id, logged);
        outcome
    }

    fn connect_inner(&self, caller: PartitionId, sid: Sid, version: u32) -> Result<Handle, ConnectError> {
        let Some((partition, service)) = self.find_service(sid) else {
            return Err(ConnectError::ConnectionRefused);
        };
        if !service.allow_nspe && caller == spm_kernel_core::INVALID_SOURCE {
            return Err(ConnectError::ConnectionRefused);
        }
        let version_ok = match service.version_policy {
            VersionPolicy::Strict => version == service.min_version,
            VersionPolicy::Relaxed => version <= service.min_version,
        };
        if !version_ok {
            return Err(ConnectError::Version);
        }

        let handle = {
            let mut state = self.state.lock().unwrap();
            state
                .handles
                .create(caller, Entity::Channel(Channel::new(caller, sid)))
                .map_err(|_| ConnectError::InvalidHandle)?
        };
        self.audit_commit(CommitType::ChannelCreated {
            channel: handle,
            client: caller as u32,
            server: partition.descriptor.id as u32,
        });

        let completion = self.register_completion(handle);
        let message = ActiveMessage::new(
            handle,
            MessageType::Connect,
            caller,
            caller != spm_kernel_core::INVALID_SOURCE,
            &[],
            &[],
        )
        .expect("empty vector list never exceeds MAX_VECS");
        self.enqueue(partition.descriptor.id, service.signal_bit, handle, message);

        let result = completion.wait();
        self.completions.lock().unwrap().remove(&handle);

        // `reply()` already drove CONNECTING -> CONNECTED/DROPPED before
        // signaling this completion (happens-before via the same mutex), so
        // the channel's state is already settled by the time we wake here.
        if result != status::DROP_CONNECTION {
            Ok(handle)
        } else {
            let mut state = self.state.lock().unwrap();
            let _ = state.handles.destroy(handle, caller);
            drop(state);
            self.audit_commit(CommitType::ChannelClosed { channel: handle });
            Err(ConnectError::ConnectionRefused)
        }
    }

    /// `call(ch, invec, ivn, outvec, ovn)` (spec.md §6). Vectors are
    /// validated eagerly here — a null/invalid vector never reaches the
    /// server, and the client sees `DROP_CONNECTION` immediately
    /// (spec.md §6 "results in DROP_CONNECTION being returned to the
    /// client"), rather than a fatal halt. A validation failure discovered
    /// later, inside `read`/`write`, means dispatch-time validation itself
    /// was wrong and is therefore treated as fatal (spec.md §7).
    pub fn call(&self, caller: PartitionId, channel: Handle, in_vec: &[IoVec], out_vec: &[IoVec]) -> Result<i32, CallError> {
        let request_id = self.audit_request(caller, op::CALL, [channel, in_vec.len() as u32, out_vec.len() as u32, 0]);
        let outcome = self.call_inner(caller, channel, in_vec, out_vec);
        let logged = match &outcome {
            Ok(status_code) => *status_code as i64,
            Err(_) => status::INVALID_HANDLE as i64,
        };
        self.audit_response(caller, request_id, logged);
        outcome
    }

    fn call_inner(&self, caller: PartitionId, channel: Handle, in_vec: &[IoVec], out_vec: &[IoVec]) -> Result<i32, CallError> {
        let caller_is_secure = caller != spm_kernel_core::INVALID_SOURCE;
        let (partition_id, signal_bit) = {
            let mut state = self.state.lock().unwrap();
            let entity = state
                .handles
                .get_mut(channel, caller)
                .map_err(|_| CallError::InvalidHandle)?;
            let ch = entity.as_channel_mut().ok_or(CallError::InvalidHandle)?;
            // Spec-mandated split: an unresolvable handle is recoverable
            // (above), but `call` on a channel that *does* resolve and is
            // not CONNECTED is a CAS failure, which is always fatal
            // (spec.md §8 property 7: "call on a non-CONNECTED channel
            // panics").
            if ch.try_transition(ChannelState::Connected, ChannelState::Calling).is_err() {
                drop(state);
                self.halt(caller, FAULT_CHANNEL_CAS);
            }
            let peer_sid = ch.peer_sid;
            drop(state);
            let Some((partition, service)) = self.find_service(peer_sid) else {
                self.halt(caller, FAULT_UNKNOWN_PARTITION);
            };
            (partition.descriptor.id, service.signal_bit)
        };

        let all_accessible = in_vec
            .iter()
            .chain(out_vec.iter())
            .all(|v| v.len == 0 || spm_primitives::is_buffer_accessible(v.ptr, v.len, self.regions.as_ref(), !caller_is_secure));

        if !all_accessible {
            self.transition_channel(channel, ChannelState::Calling, ChannelState::Closing);
            return Ok(status::DROP_CONNECTION);
        }

        let message = match ActiveMessage::new(channel, MessageType::Call, caller, caller_is_secure, in_vec, out_vec) {
            Ok(m) => m,
            Err(_) => {
                self.transition_channel(channel, ChannelState::Calling, ChannelState::Closing);
                return Ok(status::DROP_CONNECTION);
            }
        };

        let completion = self.register_completion(channel);
        self.enqueue(partition_id, signal_bit, channel, message);

        let result = completion.wait();
        self.completions.lock().unwrap().remove(&channel);

        // `reply()` already drove CALLING -> CONNECTED/CLOSING before
        // signaling this completion; nothing left to transition here.
        Ok(result)
    }

    /// `close(ch)` (spec.md §6). Requires `CONNECTED` or `DROPPED`.
    pub fn close(&self, caller: PartitionId, channel: Handle) -> Result<(), CloseError> {
        let request_id = self.audit_request(caller, op::CLOSE, [channel, 0, 0, 0]);
        let outcome = self.close_inner(caller, channel);
        let logged = if outcome.is_ok() { status::SUCCESS as i64 } else { status::INVALID_HANDLE as i64 };
        self.audit_response(caller, request_id, logged);
        outcome
    }

    fn close_inner(&self, caller: PartitionId, channel: Handle) -> Result<(), CloseError> {
        let (from, peer_sid) = {
            let mut state = self.state.lock().unwrap();
            let entity = state
                .handles
                .get_mut(channel, caller)
                .map_err(|_| CloseError::InvalidHandle)?;
            let ch = entity.as_channel_mut().ok_or(CloseError::InvalidHandle)?;
            let from = ch.state;
            if from != ChannelState::Connected && from != ChannelState::Dropped {
                return Err(CloseError::InvalidHandle);
            }
            let peer_sid = ch.peer_sid;
            ch.try_transition(from, ChannelState::Closing)
                .unwrap_or_else(|_| self.halt(caller, FAULT_CHANNEL_CAS));
            (from, peer_sid)
        };

        if from == ChannelState::Connected {
            if let Some((partition, service)) = self.find_service(peer_sid) {
                let completion = self.register_completion(channel);
                let message = ActiveMessage::new(
                    channel,
                    MessageType::Disconnect,
                    caller,
                    caller != spm_kernel_core::INVALID_SOURCE,
                    &[],
                    &[],
                )
                .expect("empty vector list never exceeds MAX_VECS");
                self.enqueue(partition.descriptor.id, service.signal_bit, channel, message);
                completion.wait();
                self.completions.lock().unwrap().remove(&channel);
            }
        }

        let mut state = self.state.lock().unwrap();
        let _ = state.handles.destroy(channel, caller);
        drop(state);
        self.audit_commit(CommitType::ChannelClosed { channel });
        Ok(())
    }

    /// `version(sid)` (spec.md §6): the service's minimum version, or
    /// `VERSION_NONE` if no partition exposes `sid`.
    pub fn version(&self, sid: Sid) -> i32 {
        self.version_caller(spm_kernel_core::INVALID_SOURCE, sid)
    }

    /// As [`version`](Self::version), but attributes the lookup to a caller
    /// identity in the audit trail.
    pub fn version_caller(&self, caller: PartitionId, sid: Sid) -> i32 {
        let request_id = self.audit_request(caller, op::VERSION, [sid, 0, 0, 0]);
        let result = self
            .find_service(sid)
            .map(|(_, service)| service.min_version as i32)
            .unwrap_or(status::VERSION_NONE);
        self.audit_response(caller, request_id, result as i64);
        result
    }

    fn register_completion(&self, handle: Handle) -> Arc<Completion> {
        let completion = Arc::new(Completion::new());
        self.completions.lock().unwrap().insert(handle, completion.clone());
        completion
    }

    fn enqueue(&self, partition_id: PartitionId, signal_bit: u32, channel: Handle, message: ActiveMessage) {
        let message_handle = {
            let mut state = self.state.lock().unwrap();
            state
                .handles
                .create_friend(partition_id, Entity::ActiveMessage(message))
                .unwrap_or_else(|_| self.halt(partition_id, crate::runtime::FAULT_CHANNEL_CAS))
        };
        self.messages_to_channels.lock().unwrap().insert(message_handle, channel);
        self.partition_runtime(partition_id).post(signal_bit, message_handle);
    }

    /// Drive a channel's state machine by its own handle, without an owner
    /// check — used only for the SPM's internal bookkeeping, never exposed
    /// to a partition or client. A CAS mismatch here is always fatal
    /// (spec.md §3 "a failed CAS is a programming error and panics").
    pub(crate) fn transition_channel(&self, channel: Handle, from: ChannelState, to: ChannelState) {
        let mut state = self.state.lock().unwrap();
        let Ok(entity) = state.handles.get_mut_privileged(channel) else {
            drop(state);
            self.halt(spm_kernel_core::INVALID_SOURCE, FAULT_CHANNEL_CAS);
        };
        let Some(ch) = entity.as_channel_mut() else {
            drop(state);
            self.halt(spm_kernel_core::INVALID_SOURCE, FAULT_CHANNEL_CAS);
        };
        if ch.try_transition(from, to).is_err() {
            drop(state);
            self.halt(spm_kernel_core::INVALID_SOURCE, FAULT_CHANNEL_CAS);
        }
        drop(state);
        self.audit_commit(CommitType::ChannelStateChanged { channel, from: from as u8, to: to as u8 });
    }
}
