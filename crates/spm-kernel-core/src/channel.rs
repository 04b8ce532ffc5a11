//! Channel state machine (spec.md §4.2).
//!
//! ```text
//!       connect()                    call()                reply(SUCCESS)
//! [--] ─────────▶ CONNECTING ──▶ CONNECTED ─────▶ CALLING ───────────────▶ CONNECTED
//!                     │               │                 reply(DROP)
//!                     │               │                      ▼
//!                     ▼            CLOSING ◀────────────────┤
//!                 DROPPED           │    close()
//!                                   ▼
//!                               destroyed
//! ```
//!
//! Every transition is expressed as a compare-and-set against the expected
//! current state. A mismatch is a programming error — spec.md §3 calls this
//! out explicitly ("a failed CAS is a programming error and panics") — so
//! `try_transition` returns a plain error and leaves it to the caller
//! (`spm-kernel`) to route that into `spm_audit::panic::halt`, exactly the
//! way the rest of this crate keeps `panic!`/`unreachable!` out of pure
//! state-machine code.

use crate::types::{Handle, PartitionId, Sid};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Connected,
    Calling,
    Closing,
    Dropped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// `try_transition`'s `from` did not match the channel's actual state.
    UnexpectedState { actual: ChannelState },
}

#[derive(Clone, Debug)]
pub struct Channel {
    pub owner_partition_id: PartitionId,
    pub peer_sid: Sid,
    pub state: ChannelState,
    /// The server's reverse handle for the in-flight message, if any.
    pub rhandle: Option<Handle>,
}

impl Channel {
    /// A freshly `connect`-ed channel starts in `CONNECTING` (spec.md §4.2).
    pub fn new(owner_partition_id: PartitionId, peer_sid: Sid) -> Self {
        Self {
            owner_partition_id,
            peer_sid,
            state: ChannelState::Connecting,
            rhandle: None,
        }
    }

    /// Compare-and-set the channel's state. `Err` means `from` was stale —
    /// the caller must treat this as fatal, never retry or ignore it.
    pub fn try_transition(&mut self, from: ChannelState, to: ChannelState) -> Result<(), ChannelError> {
        if self.state != from {
            return Err(ChannelError::UnexpectedState { actual: self.state });
        }
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_channel_starts_connecting() {
        let ch = Channel::new(1, 0x70);
        assert_eq!(ch.state, ChannelState::Connecting);
    }

    #[test]
    fn connect_reply_success_moves_to_connected() {
        let mut ch = Channel::new(1, 0x70);
        ch.try_transition(ChannelState::Connecting, ChannelState::Connected).unwrap();
        assert_eq!(ch.state, ChannelState::Connected);
    }

    #[test]
    fn connect_reply_drop_moves_to_dropped() {
        let mut ch = Channel::new(1, 0x70);
        ch.try_transition(ChannelState::Connecting, ChannelState::Dropped).unwrap();
        assert_eq!(ch.state, ChannelState::Dropped);
    }

    #[test]
    fn call_requires_connected() {
        let mut ch = Channel::new(1, 0x70);
        let err = ch.try_transition(ChannelState::Connected, ChannelState::Calling).unwrap_err();
        assert_eq!(err, ChannelError::UnexpectedState { actual: ChannelState::Connecting });
        // State is untouched by a failed CAS.
        assert_eq!(ch.state, ChannelState::Connecting);
    }

    #[test]
    fn full_round_trip_then_close() {
        let mut ch = Channel::new(1, 0x70);
        ch.try_transition(ChannelState::Connecting, ChannelState::Connected).unwrap();
        ch.try_transition(ChannelState::Connected, ChannelState::Calling).unwrap();
        ch.try_transition(ChannelState::Calling, ChannelState::Connected).unwrap();
        ch.try_transition(ChannelState::Connected, ChannelState::Closing).unwrap();
        assert_eq!(ch.state, ChannelState::Closing);
    }

    #[test]
    fn reply_drop_from_calling_moves_to_closing() {
        let mut ch = Channel::new(1, 0x70);
        ch.try_transition(ChannelState::Connecting, ChannelState::Connected).unwrap();
        ch.try_transition(ChannelState::Connected, ChannelState::Calling).unwrap();
        ch.try_transition(ChannelState::Calling, ChannelState::Closing).unwrap();
        assert_eq!(ch.state, ChannelState::Closing);
    }
}
