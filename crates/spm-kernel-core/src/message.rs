//! Active message state (spec.md §4.3).
//!
//! An `ActiveMessage` tracks the in/out vectors for one in-flight call and
//! the read/write cursor into each. This module is pure cursor arithmetic —
//! it never dereferences `IoVec::ptr`. The actual trust-boundary memory
//! copy lives in `spm-kernel`, which calls `advance_read`/`advance_write`
//! here to learn the byte range to copy and validates/copies it using
//! `spm-primitives` and a concrete pointer.

use crate::config::MAX_VECS;
use crate::types::{Handle, IoVec, PartitionId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    Connect,
    Call,
    Disconnect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageError {
    /// `idx` is `>=` the vector count the message was created with.
    VectorOutOfRange,
    /// `in_vec_count + out_vec_count > MAX_VECS` (spec.md §3).
    TooManyVectors,
}

#[derive(Clone, Debug)]
pub struct ActiveMessage {
    pub channel_handle: Handle,
    pub msg_type: MessageType,
    pub caller_identity: PartitionId,
    /// `false` for a caller outside the secure world (spec.md §4.3); governs
    /// whether `spm-kernel`'s buffer validation allows pointers into secure
    /// RAM/flash.
    pub caller_is_secure: bool,
    pub rhandle: Option<Handle>,

    in_vec: [IoVec; MAX_VECS],
    in_vec_count: usize,
    in_cursor: [usize; MAX_VECS],

    out_vec: [IoVec; MAX_VECS],
    out_vec_count: usize,
    out_cursor: [usize; MAX_VECS],
}

impl ActiveMessage {
    pub fn new(
        channel_handle: Handle,
        msg_type: MessageType,
        caller_identity: PartitionId,
        caller_is_secure: bool,
        in_vec: &[IoVec],
        out_vec: &[IoVec],
    ) -> Result<Self, MessageError> {
        if in_vec.len() + out_vec.len() > MAX_VECS {
            return Err(MessageError::TooManyVectors);
        }
        let mut iv = [IoVec::default(); MAX_VECS];
        iv[..in_vec.len()].copy_from_slice(in_vec);
        let mut ov = [IoVec::default(); MAX_VECS];
        ov[..out_vec.len()].copy_from_slice(out_vec);

        Ok(Self {
            channel_handle,
            msg_type,
            caller_identity,
            caller_is_secure,
            rhandle: None,
            in_vec: iv,
            in_vec_count: in_vec.len(),
            in_cursor: [0; MAX_VECS],
            out_vec: ov,
            out_vec_count: out_vec.len(),
            out_cursor: [0; MAX_VECS],
        })
    }

    pub fn in_vec_count(&self) -> usize {
        self.in_vec_count
    }

    pub fn out_vec_count(&self) -> usize {
        self.out_vec_count
    }

    pub fn in_vec(&self, idx: usize) -> Result<IoVec, MessageError> {
        if idx >= self.in_vec_count {
            return Err(MessageError::VectorOutOfRange);
        }
        Ok(self.in_vec[idx])
    }

    pub fn out_vec(&self, idx: usize) -> Result<IoVec, MessageError> {
        if idx >= self.out_vec_count {
            return Err(MessageError::VectorOutOfRange);
        }
        Ok(self.out_vec[idx])
    }

    /// `read(msg, idx, dst, len)`: returns the `(source_ptr, byte_count)`
    /// the caller should copy from, advancing the in-vector cursor by
    /// `byte_count`. `byte_count = min(len, remaining)`.
    pub fn advance_read(&mut self, idx: usize, len: usize) -> Result<(usize, usize), MessageError> {
        if idx >= self.in_vec_count {
            return Err(MessageError::VectorOutOfRange);
        }
        let vec = self.in_vec[idx];
        let cursor = self.in_cursor[idx];
        let remaining = vec.len.saturating_sub(cursor);
        let count = len.min(remaining);
        let src_ptr = vec.ptr + cursor;
        self.in_cursor[idx] += count;
        Ok((src_ptr, count))
    }

    /// `write(msg, idx, src, len)`: mirror of `advance_read` for out-vectors.
    pub fn advance_write(&mut self, idx: usize, len: usize) -> Result<(usize, usize), MessageError> {
        if idx >= self.out_vec_count {
            return Err(MessageError::VectorOutOfRange);
        }
        let vec = self.out_vec[idx];
        let cursor = self.out_cursor[idx];
        let remaining = vec.len.saturating_sub(cursor);
        let count = len.min(remaining);
        let dst_ptr = vec.ptr + cursor;
        self.out_cursor[idx] += count;
        Ok((dst_ptr, count))
    }

    /// `skip(msg, idx, len)`: advances the in-vector cursor without copying.
    pub fn skip(&mut self, idx: usize, len: usize) -> Result<usize, MessageError> {
        if idx >= self.in_vec_count {
            return Err(MessageError::VectorOutOfRange);
        }
        let vec = self.in_vec[idx];
        let cursor = self.in_cursor[idx];
        let remaining = vec.len.saturating_sub(cursor);
        let count = len.min(remaining);
        self.in_cursor[idx] += count;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_of(ptr: usize, len: usize) -> IoVec {
        IoVec { ptr, len }
    }

    #[test]
    fn too_many_vectors_is_rejected() {
        let in_vecs = [vec_of(1, 1); 3];
        let out_vecs = [vec_of(2, 1); 2];
        let err = ActiveMessage::new(1, MessageType::Call, 1, true, &in_vecs, &out_vecs).unwrap_err();
        assert_eq!(err, MessageError::TooManyVectors);
    }

    #[test]
    fn advance_read_stops_at_vector_end() {
        let mut msg = ActiveMessage::new(1, MessageType::Call, 1, true, &[vec_of(0x1000, 4)], &[]).unwrap();
        let (ptr, n) = msg.advance_read(0, 10).unwrap();
        assert_eq!(ptr, 0x1000);
        assert_eq!(n, 4);
        let (ptr2, n2) = msg.advance_read(0, 10).unwrap();
        assert_eq!(n2, 0);
        assert_eq!(ptr2, 0x1004);
    }

    #[test]
    fn advance_write_advances_out_cursor_independently_of_in_cursor() {
        let mut msg = ActiveMessage::new(
            1,
            MessageType::Call,
            1,
            true,
            &[vec_of(0x1000, 4)],
            &[vec_of(0x2000, 8)],
        )
        .unwrap();
        msg.advance_read(0, 4).unwrap();
        let (ptr, n) = msg.advance_write(0, 8).unwrap();
        assert_eq!(ptr, 0x2000);
        assert_eq!(n, 8);
    }

    #[test]
    fn skip_advances_cursor_without_returning_source() {
        let mut msg = ActiveMessage::new(1, MessageType::Call, 1, true, &[vec_of(0x1000, 10)], &[]).unwrap();
        let skipped = msg.skip(0, 3).unwrap();
        assert_eq!(skipped, 3);
        let (ptr, n) = msg.advance_read(0, 100).unwrap();
        assert_eq!(ptr, 0x1003);
        assert_eq!(n, 7);
    }

    #[test]
    fn out_of_range_vector_index_is_an_error() {
        let mut msg = ActiveMessage::new(1, MessageType::Call, 1, true, &[vec_of(0x1000, 4)], &[]).unwrap();
        assert_eq!(msg.advance_read(1, 1).unwrap_err(), MessageError::VectorOutOfRange);
        assert_eq!(msg.in_vec(1).unwrap_err(), MessageError::VectorOutOfRange);
    }
}
