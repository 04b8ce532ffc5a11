//! Handle manager (spec.md §4.1).
//!
//! A fixed-capacity pool mapping opaque, nonzero integer handles to one of
//! two entity types — a [`Channel`](crate::channel::Channel) or an
//! [`ActiveMessage`](crate::message::ActiveMessage). Handles pack a slot
//! index and a generation counter into one `u32`; reusing a slot always
//! bumps its generation, so a handle captured before the slot was freed and
//! reused is detected rather than silently resolving to the new occupant.
//! This generalizes the donor's `CapabilitySpace` (slot-keyed table with a
//! generation field per entry) onto a fixed backing array with a single
//! handle namespace shared by both entity kinds, per spec.md §4.1's
//! `handle_id / kind / payload_index / generation` layout.

use alloc::vec::Vec;

use crate::channel::Channel;
use crate::message::ActiveMessage;
use crate::types::{Handle, PartitionId, INVALID_HANDLE};

/// Errors from handle manager operations (spec.md §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleError {
    /// All slots are occupied.
    PoolExhausted,
    /// The handle was never created, has been destroyed, its generation no
    /// longer matches the live occupant, or the owner check failed.
    InvalidHandle,
}

#[derive(Clone, Debug)]
pub enum Entity {
    Channel(Channel),
    ActiveMessage(ActiveMessage),
}

impl Entity {
    pub fn as_channel(&self) -> Option<&Channel> {
        match self {
            Entity::Channel(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_channel_mut(&mut self) -> Option<&mut Channel> {
        match self {
            Entity::Channel(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_active_message(&self) -> Option<&ActiveMessage> {
        match self {
            Entity::ActiveMessage(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_active_message_mut(&mut self) -> Option<&mut ActiveMessage> {
        match self {
            Entity::ActiveMessage(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Clone)]
struct Slot {
    generation: u32,
    /// `None` when free. The owner is checked by `get`/`destroy`; a `friend`
    /// slot additionally allows any caller (spec.md §4.1 "the slot must be
    /// marked friend").
    occupant: Option<(PartitionId, bool, Entity)>,
}

/// Fixed-capacity handle pool.
pub struct HandleManager {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl HandleManager {
    /// `capacity` must be `<= u16::MAX as usize` — the index half of a
    /// handle is 16 bits (spec.md §6 `MAX_CHANNELS`/`MAX_ACTIVE_MESSAGES`
    /// are both well under this in practice).
    pub fn new(capacity: usize) -> Self {
        assert!(capacity <= u16::MAX as usize, "handle manager capacity overflows a 16-bit index");
        Self {
            slots: alloc::vec![
                Slot {
                    generation: 0,
                    occupant: None
                };
                capacity
            ],
            free: (0..capacity).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Allocate a slot for `payload`, owned by `owner`. Fails with
    /// `PoolExhausted` if every slot is occupied (spec.md §4.1).
    pub fn create(&mut self, owner: PartitionId, payload: Entity) -> Result<Handle, HandleError> {
        self.create_inner(owner, false, payload)
    }

    /// As [`create`](Self::create), but the slot is accessible by any
    /// caller regardless of owner (used for the built-in ITS partition's
    /// reverse handles, spec.md §4.1 "friend").
    pub fn create_friend(&mut self, owner: PartitionId, payload: Entity) -> Result<Handle, HandleError> {
        self.create_inner(owner, true, payload)
    }

    fn create_inner(&mut self, owner: PartitionId, friend: bool, payload: Entity) -> Result<Handle, HandleError> {
        let index = self.free.pop().ok_or(HandleError::PoolExhausted)?;
        let slot = &mut self.slots[index];
        slot.occupant = Some((owner, friend, payload));
        Ok(Self::encode(index, slot.generation))
    }

    /// Resolve `handle` to its entity, checking that the caller either owns
    /// the slot or the slot is a friend slot.
    pub fn get(&self, handle: Handle, expected_owner: PartitionId) -> Result<&Entity, HandleError> {
        let (index, generation) = Self::decode(handle)?;
        let slot = self.slots.get(index).ok_or(HandleError::InvalidHandle)?;
        if slot.generation != generation {
            return Err(HandleError::InvalidHandle);
        }
        match &slot.occupant {
            Some((owner, friend, entity)) if *owner == expected_owner || *friend => Ok(entity),
            _ => Err(HandleError::InvalidHandle),
        }
    }

    pub fn get_mut(&mut self, handle: Handle, expected_owner: PartitionId) -> Result<&mut Entity, HandleError> {
        let (index, generation) = Self::decode(handle)?;
        let slot = self.slots.get_mut(index).ok_or(HandleError::InvalidHandle)?;
        if slot.generation != generation {
            return Err(HandleError::InvalidHandle);
        }
        match &mut slot.occupant {
            Some((owner, friend, entity)) if *owner == expected_owner || *friend => Ok(entity),
            _ => Err(HandleError::InvalidHandle),
        }
    }

    /// Resolve `handle` without an owner check. Reserved for the SPM
    /// runtime's own housekeeping (e.g. driving a channel's state machine
    /// after the client that opened it has already been validated) — never
    /// exposed through the Client or Server API, where every lookup must
    /// carry a caller identity.
    pub fn get_mut_privileged(&mut self, handle: Handle) -> Result<&mut Entity, HandleError> {
        let (index, generation) = Self::decode(handle)?;
        let slot = self.slots.get_mut(index).ok_or(HandleError::InvalidHandle)?;
        if slot.generation != generation {
            return Err(HandleError::InvalidHandle);
        }
        slot.occupant.as_mut().map(|(_, _, entity)| entity).ok_or(HandleError::InvalidHandle)
    }

    /// Release the slot, advancing its generation so a retained copy of
    /// `handle` is rejected by future `get`/`destroy` calls.
    pub fn destroy(&mut self, handle: Handle, expected_owner: PartitionId) -> Result<Entity, HandleError> {
        let (index, generation) = Self::decode(handle)?;
        let slot = self.slots.get_mut(index).ok_or(HandleError::InvalidHandle)?;
        if slot.generation != generation {
            return Err(HandleError::InvalidHandle);
        }
        match &slot.occupant {
            Some((owner, friend, _)) if *owner == expected_owner || *friend => {}
            _ => return Err(HandleError::InvalidHandle),
        }
        let (_, _, entity) = slot.occupant.take().unwrap();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        Ok(entity)
    }

    /// Every live handle, paired with its resolved entity. Used by
    /// `invariants::check_all`.
    pub fn iter_live(&self) -> impl Iterator<Item = (Handle, &Entity)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.occupant
                .as_ref()
                .map(|(_, _, entity)| (Self::encode(index, slot.generation), entity))
        })
    }

    fn encode(index: usize, generation: u32) -> Handle {
        // index+1 keeps the result nonzero even at index 0, generation 0.
        ((generation & 0xFFFF) << 16) | ((index as u32 + 1) & 0xFFFF)
    }

    fn decode(handle: Handle) -> Result<(usize, u32), HandleError> {
        if handle == INVALID_HANDLE {
            return Err(HandleError::InvalidHandle);
        }
        let index = (handle & 0xFFFF) as usize;
        if index == 0 {
            return Err(HandleError::InvalidHandle);
        }
        let generation = (handle >> 16) & 0xFFFF;
        Ok((index - 1, generation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, ChannelState};

    fn test_channel(owner: PartitionId) -> Entity {
        Entity::Channel(Channel::new(owner, 1))
    }

    #[test]
    fn create_then_get_roundtrips() {
        let mut mgr = HandleManager::new(4);
        let handle = mgr.create(1, test_channel(1)).unwrap();
        assert_ne!(handle, INVALID_HANDLE);
        let entity = mgr.get(handle, 1).unwrap();
        assert_eq!(entity.as_channel().unwrap().state, ChannelState::Connecting);
    }

    #[test]
    fn get_with_wrong_owner_is_invalid() {
        let mut mgr = HandleManager::new(4);
        let handle = mgr.create(1, test_channel(1)).unwrap();
        assert_eq!(mgr.get(handle, 2).unwrap_err(), HandleError::InvalidHandle);
    }

    #[test]
    fn friend_slot_is_accessible_by_any_owner() {
        let mut mgr = HandleManager::new(4);
        let handle = mgr.create_friend(1, test_channel(1)).unwrap();
        assert!(mgr.get(handle, 2).is_ok());
    }

    #[test]
    fn destroy_then_get_is_invalid() {
        let mut mgr = HandleManager::new(4);
        let handle = mgr.create(1, test_channel(1)).unwrap();
        mgr.destroy(handle, 1).unwrap();
        assert_eq!(mgr.get(handle, 1).unwrap_err(), HandleError::InvalidHandle);
    }

    #[test]
    fn stale_handle_after_slot_reuse_is_rejected() {
        let mut mgr = HandleManager::new(1);
        let first = mgr.create(1, test_channel(1)).unwrap();
        mgr.destroy(first, 1).unwrap();
        let second = mgr.create(1, test_channel(1)).unwrap();
        assert_ne!(first, second);
        assert_eq!(mgr.get(first, 1).unwrap_err(), HandleError::InvalidHandle);
        assert!(mgr.get(second, 1).is_ok());
    }

    #[test]
    fn pool_exhaustion_is_reported() {
        let mut mgr = HandleManager::new(1);
        mgr.create(1, test_channel(1)).unwrap();
        assert_eq!(mgr.create(1, test_channel(1)).unwrap_err(), HandleError::PoolExhausted);
    }

    #[test]
    fn live_count_tracks_create_and_destroy() {
        let mut mgr = HandleManager::new(4);
        assert_eq!(mgr.live_count(), 0);
        let handle = mgr.create(1, test_channel(1)).unwrap();
        assert_eq!(mgr.live_count(), 1);
        mgr.destroy(handle, 1).unwrap();
        assert_eq!(mgr.live_count(), 0);
    }

    #[test]
    fn no_two_live_handles_share_a_slot_after_interleaved_churn() {
        let mut mgr = HandleManager::new(3);
        let mut live = alloc::vec::Vec::new();
        for i in 0..20 {
            if i % 3 == 0 && !live.is_empty() {
                let h: Handle = live.remove(0);
                mgr.destroy(h, 1).unwrap();
            } else if let Ok(h) = mgr.create(1, test_channel(1)) {
                live.push(h);
            }
        }
        let mut seen = alloc::vec::Vec::new();
        for (handle, _) in mgr.iter_live() {
            assert!(!seen.contains(&handle));
            seen.push(handle);
        }
    }
}
