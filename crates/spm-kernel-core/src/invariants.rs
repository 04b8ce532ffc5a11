//! Global invariant checks (spec.md §3).
//!
//! These re-derive every invariant from a `SpmState` snapshot rather than
//! trusting it was upheld along the way — the same "verification target"
//! role the donor gives its own `invariants.rs`. `spm-kernel` calls
//! `check_all` at debug-build checkpoints and under `#[cfg(kani)]` harnesses
//! below; it is not run on every production call (that would defeat the
//! point of compile-time CAS transitions already enforcing most of this).

use alloc::string::String;
use alloc::vec::Vec;

use crate::handle::Entity;
use crate::state::SpmState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub invariant: &'static str,
    pub description: String,
}

/// Re-check every global invariant from spec.md §3 against `state`. An
/// empty result means the state is consistent; any entry is a bug, not a
/// recoverable condition.
pub fn check_all(state: &SpmState) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_in_vec_plus_out_vec_bound(state, &mut violations);
    check_at_most_one_message_per_channel(state, &mut violations);
    check_handle_uniqueness(state, &mut violations);
    violations
}

fn check_in_vec_plus_out_vec_bound(state: &SpmState, out: &mut Vec<Violation>) {
    for (handle, entity) in state.handles.iter_live() {
        if let Entity::ActiveMessage(msg) = entity {
            let total = msg.in_vec_count() + msg.out_vec_count();
            if total > crate::config::MAX_VECS {
                out.push(Violation {
                    invariant: "in_vec_count + out_vec_count <= MAX_VECS",
                    description: alloc::format!(
                        "message handle {handle} has {total} vectors"
                    ),
                });
            }
        }
    }
}

fn check_at_most_one_message_per_channel(state: &SpmState, out: &mut Vec<Violation>) {
    let mut seen_channels: Vec<crate::types::Handle> = Vec::new();
    for (handle, entity) in state.handles.iter_live() {
        if let Entity::ActiveMessage(msg) = entity {
            if seen_channels.contains(&msg.channel_handle) {
                out.push(Violation {
                    invariant: "at most one active message per channel",
                    description: alloc::format!(
                        "channel handle {} has more than one active message (message handle {handle})",
                        msg.channel_handle
                    ),
                });
            } else {
                seen_channels.push(msg.channel_handle);
            }
        }
    }
}

fn check_handle_uniqueness(state: &SpmState, out: &mut Vec<Violation>) {
    let mut seen: Vec<crate::types::Handle> = Vec::new();
    for (handle, _) in state.handles.iter_live() {
        if seen.contains(&handle) {
            out.push(Violation {
                invariant: "every live handle refers to exactly one entity",
                description: alloc::format!("handle {handle} appears more than once"),
            });
        } else {
            seen.push(handle);
        }
    }
}


#[cfg(kani)]
mod proofs {
    use super::*;
    use crate::channel::Channel;

    /// A freshly created handle manager (any capacity up to a small bound)
    /// never reports a global invariant violation.
    #[kani::proof]
    fn fresh_state_is_always_consistent() {
        let capacity: usize = kani::any_where(|c: &usize| *c > 0 && *c <= 8);
        let state = SpmState::new(capacity);
        assert!(check_all(&state).is_empty());
    }

    /// Creating then destroying a single channel handle never leaves two
    /// live handles aliasing the same slot.
    #[kani::proof]
    fn create_destroy_cycle_preserves_handle_uniqueness() {
        let mut state = SpmState::new(4);
        let owner: crate::types::PartitionId = kani::any();
        let handle = state
            .handles
            .create(owner, Entity::Channel(Channel::new(owner, 1)))
            .unwrap();
        state.handles.destroy(handle, owner).unwrap();
        assert!(check_all(&state).is_empty());
    }
}
