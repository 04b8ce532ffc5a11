//! Server API (spec.md §6): `wait`, `get`, `read`, `write`, `skip`, `reply`,
//! `identity`, `panic`. Consumed by partition threads, never by clients.

use spm_ipc::status;
use spm_kernel_core::channel::ChannelState;
use spm_kernel_core::handle::Entity;
use spm_kernel_core::message::MessageType;
use spm_kernel_core::types::{Handle, PartitionId};

use crate::runtime::{Spm, FAULT_BUFFER_ACCESS, FAULT_EXPLICIT_PANIC, FAULT_UNEXPECTED_MESSAGE_TYPE};
use spm_hal::Hal;

impl<H: Hal> Spm<H> {
    /// `wait(mask, blocking)` (spec.md §4.4). `blocking` corresponds to
    /// `PSA_BLOCK`; `false` corresponds to `PSA_POLL`.
    pub fn wait(&self, partition: PartitionId, mask: u32, blocking: bool) -> u32 {
        self.partition_runtime(partition).wait(mask, blocking)
    }

    /// `get(bit, &msg)` (spec.md §4.4): dequeue the oldest pending message
    /// handle for `bit`.
    pub fn get(&self, partition: PartitionId, bit: u32) -> Option<Handle> {
        self.partition_runtime(partition).get(bit)
    }

    /// `identity(msg) -> i32` (spec.md §6): the caller identity stamped on
    /// the active message, for owner checks (e.g. `spm-its`).
    pub fn identity(&self, partition: PartitionId, msg: Handle) -> i32 {
        let state = self.state.lock().unwrap();
        match state.handles.get(msg, partition) {
            Ok(Entity::ActiveMessage(am)) => am.caller_identity,
            _ => self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE),
        }
    }

    /// The delivered message's type (spec.md §4.3: `CONNECT`, `DISCONNECT`,
    /// `CALL`) — lets a service loop dispatch without tracking its own
    /// per-handle bookkeeping.
    pub fn msg_type(&self, partition: PartitionId, msg: Handle) -> MessageType {
        let mut state = self.state.lock().unwrap();
        let entity = state
            .handles
            .get_mut(msg, partition)
            .unwrap_or_else(|_| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
        let am = entity
            .as_active_message_mut()
            .unwrap_or_else(|| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
        am.msg_type
    }

    /// Total length of in-vector `idx` (PSA's `msg.in_size[idx]`
    /// equivalent) — lets a service loop size a scratch buffer before
    /// calling `read` instead of over- or under-allocating.
    pub fn in_vec_len(&self, partition: PartitionId, msg: Handle, idx: usize) -> usize {
        let mut state = self.state.lock().unwrap();
        let entity = state
            .handles
            .get_mut(msg, partition)
            .unwrap_or_else(|_| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
        let am = entity
            .as_active_message_mut()
            .unwrap_or_else(|| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
        am.in_vec(idx).map(|v| v.len).unwrap_or_else(|_| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE))
    }

    /// Length of out-vector `idx` (PSA's `msg.out_size[idx]` equivalent).
    pub fn out_vec_len(&self, partition: PartitionId, msg: Handle, idx: usize) -> usize {
        let mut state = self.state.lock().unwrap();
        let entity = state
            .handles
            .get_mut(msg, partition)
            .unwrap_or_else(|_| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
        let am = entity
            .as_active_message_mut()
            .unwrap_or_else(|| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
        am.out_vec(idx).map(|v| v.len).unwrap_or_else(|_| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE))
    }

    /// `read(msg, idx, dst, len) -> bytes_copied` (spec.md §4.3). Copies
    /// from the caller's in-vector into `dst`. The buffer-accessibility
    /// check here is defensive: `call()` already validated every vector
    /// before the message was ever enqueued, so a failure here means that
    /// earlier validation was wrong, which is fatal (spec.md §7 "failed
    /// buffer access check on a trusted in-partition pointer").
    pub fn read(&self, partition: PartitionId, msg: Handle, idx: usize, dst: &mut [u8]) -> usize {
        let (src_ptr, count, caller_is_secure) = {
            let mut state = self.state.lock().unwrap();
            let entity = state
                .handles
                .get_mut(msg, partition)
                .unwrap_or_else(|_| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
            let am = entity
                .as_active_message_mut()
                .unwrap_or_else(|| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
            let (src_ptr, count) = am
                .advance_read(idx, dst.len())
                .unwrap_or_else(|_| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
            (src_ptr, count, am.caller_is_secure)
        };

        if count == 0 {
            return 0;
        }
        if !spm_primitives::is_buffer_accessible(src_ptr, count, self.regions.as_ref(), caller_is_secure) {
            self.halt(partition, FAULT_BUFFER_ACCESS);
        }
        // SAFETY: `src_ptr` was validated above against the caller's
        // declared memory regions and the vector's own bounds, mirroring
        // the checked copy `call()` performed before this message was
        // enqueued.
        unsafe {
            core::ptr::copy_nonoverlapping(src_ptr as *const u8, dst.as_mut_ptr(), count);
        }
        count
    }

    /// `write(msg, idx, src, len)` (spec.md §4.3). Mirror of `read` for
    /// out-vectors.
    pub fn write(&self, partition: PartitionId, msg: Handle, idx: usize, src: &[u8]) -> usize {
        let (dst_ptr, count, caller_is_secure) = {
            let mut state = self.state.lock().unwrap();
            let entity = state
                .handles
                .get_mut(msg, partition)
                .unwrap_or_else(|_| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
            let am = entity
                .as_active_message_mut()
                .unwrap_or_else(|| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
            let (dst_ptr, count) = am
                .advance_write(idx, src.len())
                .unwrap_or_else(|_| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
            (dst_ptr, count, am.caller_is_secure)
        };

        if count == 0 {
            return 0;
        }
        if !spm_primitives::is_buffer_accessible(dst_ptr, count, self.regions.as_ref(), caller_is_secure) {
            self.halt(partition, FAULT_BUFFER_ACCESS);
        }
        // SAFETY: see `read` above.
        unsafe {
            core::ptr::copy_nonoverlapping(src.as_ptr(), dst_ptr as *mut u8, count);
        }
        count
    }

    /// `skip(msg, idx, len)` (spec.md §4.3): advances the in-vector cursor
    /// without copying.
    pub fn skip(&self, partition: PartitionId, msg: Handle, idx: usize, len: usize) -> usize {
        let mut state = self.state.lock().unwrap();
        let entity = state
            .handles
            .get_mut(msg, partition)
            .unwrap_or_else(|_| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
        let am = entity
            .as_active_message_mut()
            .unwrap_or_else(|| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
        am.skip(idx, len).unwrap_or_else(|_| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE))
    }

    /// `reply(msg, status)` (spec.md §4.2, §6). Status `SUCCESS` or
    /// positive moves the channel back to `CONNECTED`; `DROP_CONNECTION`
    /// moves it to `CLOSING`. Replying from any state other than `CALLING`
    /// (or `CONNECTING`/`CLOSING` for the connect/disconnect message types)
    /// is a CAS failure and therefore fatal (spec.md §8 property 7).
    pub fn reply(&self, partition: PartitionId, msg: Handle, status_code: i32) {
        let channel = {
            let mut messages_to_channels = self.messages_to_channels.lock().unwrap();
            messages_to_channels
                .remove(&msg)
                .unwrap_or_else(|| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE))
        };

        let msg_type = {
            let mut state = self.state.lock().unwrap();
            let entity = state
                .handles
                .get_mut(msg, partition)
                .unwrap_or_else(|_| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
            let am = entity
                .as_active_message_mut()
                .unwrap_or_else(|| self.halt(partition, FAULT_UNEXPECTED_MESSAGE_TYPE));
            am.msg_type
        };

        use spm_kernel_core::message::MessageType;
        match msg_type {
            MessageType::Connect => {
                let to = if status_code == status::DROP_CONNECTION {
                    ChannelState::Dropped
                } else {
                    ChannelState::Connected
                };
                self.transition_channel(channel, ChannelState::Connecting, to);
            }
            MessageType::Call => {
                let to = if status_code == status::DROP_CONNECTION {
                    ChannelState::Closing
                } else {
                    ChannelState::Connected
                };
                self.transition_channel(channel, ChannelState::Calling, to);
            }
            MessageType::Disconnect => {
                // `close()` drives CONNECTED -> CLOSING itself before
                // enqueuing the DISCONNECT message; the server's reply here
                // just releases the waiting client thread.
            }
        }

        {
            let mut state = self.state.lock().unwrap();
            let _ = state.handles.destroy(msg, partition);
        }

        if let Some(completion) = self.completions.lock().unwrap().get(&channel) {
            completion.set(status_code);
        }
    }

    /// `panic(fmt, ...)` (spec.md §6): the Server API's explicit request to
    /// halt the secure world. Never returns.
    pub fn panic(&self, partition: PartitionId) -> ! {
        self.halt(partition, FAULT_EXPLICIT_PANIC)
    }
}
