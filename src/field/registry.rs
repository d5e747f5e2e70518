use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use super::authority::FieldAuthority;
use super::error::FieldError;
use crate::object::OwnershipState;

/// Stable numeric key of a synchronized field, derived at registration time
/// from member identity and owning sub-object id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldSlot(u32);

impl FieldSlot {
    pub const fn from_u32(value: u32) -> Self {
        Self(value)
    }

    pub fn to_u32(&self) -> u32 {
        self.0
    }
}

/// Delivery classification for a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldClass {
    /// Rides the per-tick delta snapshot; may be dropped or superseded.
    Unreliable,
    /// Delivered guaranteed-once on the reliable side channel, independent
    /// of snapshot cadence.
    Reliable,
}

/// Registration-time configuration of one field.
pub struct FieldConfig<C> {
    pub authority: FieldAuthority<C>,
    pub class: FieldClass,
    /// True for types whose mutation cannot be observed through a dirty
    /// callback (mutable collections, custom serializers). Polled fields
    /// are re-queried and re-hashed every tick.
    pub polled: bool,
}

impl<C> Default for FieldConfig<C> {
    fn default() -> Self {
        Self {
            authority: FieldAuthority::Controller,
            class: FieldClass::Unreliable,
            polled: false,
        }
    }
}

impl<C> FieldConfig<C> {
    pub fn reliable() -> Self {
        Self {
            class: FieldClass::Reliable,
            ..Self::default()
        }
    }

    pub fn polled() -> Self {
        Self {
            polled: true,
            ..Self::default()
        }
    }
}

/// Outcome of applying one inbound field value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboundFieldResult {
    /// Value accepted; the caller should push it into the world.
    Applied,
    /// The sender's value already matches ours; nothing to do.
    Unchanged,
    /// The slot is not registered yet (schema ahead of us, e.g. a component
    /// still pending a refresh). Skipped silently, not an error.
    UnknownSlot,
}

struct FieldEntry<C> {
    slot: FieldSlot,
    authority: FieldAuthority<C>,
    class: FieldClass,
    polled: bool,
    dirty: bool,
    last_hash: u64,
    cached: Vec<u8>,
    has_value: bool,
}

/// Truncated blake3 of the serialized value, used as the change-detection
/// signature everywhere a field value is compared without decoding.
pub fn content_hash(bytes: &[u8]) -> u64 {
    let digest = blake3::hash(bytes);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

/// Per-object table of synchronized fields. Entries keep insertion order,
/// which is also the order inbound values are applied in.
pub struct FieldRegistry<C> {
    entries: Vec<FieldEntry<C>>,
    slot_index: HashMap<FieldSlot, usize>,
    reliable_changed: Vec<FieldSlot>,
}

impl<C: Copy + Eq + Hash> FieldRegistry<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            slot_index: HashMap::new(),
            reliable_changed: Vec::new(),
        }
    }

    /// Registers a field. Idempotent: returns `false` and leaves the
    /// existing entry untouched if the slot is already registered.
    pub fn register(&mut self, slot: FieldSlot, config: FieldConfig<C>) -> bool {
        if self.slot_index.contains_key(&slot) {
            return false;
        }
        self.slot_index.insert(slot, self.entries.len());
        self.entries.push(FieldEntry {
            slot,
            authority: config.authority,
            class: config.class,
            polled: config.polled,
            dirty: false,
            last_hash: 0,
            cached: Vec::new(),
            has_value: false,
        });
        true
    }

    /// Replaces the configuration of an already-registered slot, keeping
    /// its cached value. Used after a proxy spawn, where the field table
    /// arrives before the application declares the schema.
    pub fn configure(&mut self, slot: FieldSlot, config: FieldConfig<C>) -> Result<(), FieldError> {
        let entry = self.entry_mut(slot)?;
        entry.authority = config.authority;
        entry.class = config.class;
        entry.polled = config.polled;
        Ok(())
    }

    pub fn contains(&self, slot: FieldSlot) -> bool {
        self.slot_index.contains_key(&slot)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered slots, in insertion order.
    pub fn slots(&self) -> Vec<FieldSlot> {
        self.entries.iter().map(|entry| entry.slot).collect()
    }

    pub fn polled_slots(&self) -> Vec<FieldSlot> {
        self.entries
            .iter()
            .filter(|entry| entry.polled)
            .map(|entry| entry.slot)
            .collect()
    }

    pub fn dirty_slots(&self) -> Vec<FieldSlot> {
        self.entries
            .iter()
            .filter(|entry| entry.dirty)
            .map(|entry| entry.slot)
            .collect()
    }

    /// Unreliable slots that currently hold a value and are therefore
    /// candidates for snapshot inclusion, in insertion order.
    pub fn snapshot_slots(&self) -> Vec<FieldSlot> {
        self.entries
            .iter()
            .filter(|entry| entry.has_value && entry.class == FieldClass::Unreliable)
            .map(|entry| entry.slot)
            .collect()
    }

    pub fn is_polled(&self, slot: FieldSlot) -> bool {
        self.entry_ref(slot).map(|entry| entry.polled).unwrap_or(false)
    }

    pub fn class_of(&self, slot: FieldSlot) -> Option<FieldClass> {
        self.entry_ref(slot).map(|entry| entry.class)
    }

    /// Whether a writer passes the slot's authority predicate under the
    /// given ownership record. Unregistered slots deny.
    pub fn authority_allows(
        &self,
        slot: FieldSlot,
        writer: Option<&C>,
        ownership: &OwnershipState<C>,
    ) -> bool {
        self.entry_ref(slot)
            .map(|entry| entry.authority.allows(writer, ownership))
            .unwrap_or(false)
    }

    pub fn cached_bytes(&self, slot: FieldSlot) -> Option<&[u8]> {
        self.entry_ref(slot)
            .filter(|entry| entry.has_value)
            .map(|entry| entry.cached.as_slice())
    }

    pub fn hash_of(&self, slot: FieldSlot) -> Option<u64> {
        self.entry_ref(slot)
            .filter(|entry| entry.has_value)
            .map(|entry| entry.last_hash)
    }

    /// Marks a slot dirty without supplying bytes; the next tick re-queries
    /// the value from the world and decides whether it actually changed.
    pub fn mark_dirty(&mut self, slot: FieldSlot) -> Result<(), FieldError> {
        let entry = self.entry_mut(slot)?;
        entry.dirty = true;
        Ok(())
    }

    /// Submits a locally authored value (already serialized by the external
    /// byte-codec). Returns `true` when the value differs from the cached
    /// one: the entry is re-marked dirty, its cache replaced, and reliable
    /// entries are queued for the guaranteed-delivery channel.
    pub fn submit_local(&mut self, slot: FieldSlot, bytes: Vec<u8>) -> Result<bool, FieldError> {
        let hash = content_hash(&bytes);
        let entry = self.entry_mut(slot)?;

        if entry.has_value && entry.last_hash == hash {
            return Ok(false);
        }

        entry.cached = bytes;
        entry.last_hash = hash;
        entry.has_value = true;
        entry.dirty = true;
        let reliable = entry.class == FieldClass::Reliable;
        let slot = entry.slot;
        if reliable && !self.reliable_changed.contains(&slot) {
            self.reliable_changed.push(slot);
        }
        Ok(true)
    }

    /// Applies a value received from the network. Rejects the write when
    /// the sender fails the slot's authority predicate. On success the
    /// entry is explicitly *not* marked dirty: a value that just arrived
    /// must not be re-broadcast as if locally changed, or the authoritative
    /// and receiving ends oscillate.
    pub fn apply_inbound(
        &mut self,
        slot: FieldSlot,
        bytes: &[u8],
        sender: Option<&C>,
        ownership: &OwnershipState<C>,
    ) -> Result<InboundFieldResult, FieldError> {
        let Some(index) = self.slot_index.get(&slot).copied() else {
            return Ok(InboundFieldResult::UnknownSlot);
        };
        let entry = &mut self.entries[index];

        if !entry.authority.allows(sender, ownership) {
            return Err(FieldError::Unauthorized { slot });
        }

        let hash = content_hash(bytes);
        if entry.has_value && entry.last_hash == hash {
            return Ok(InboundFieldResult::Unchanged);
        }

        entry.cached = bytes.to_vec();
        entry.last_hash = hash;
        entry.has_value = true;
        entry.dirty = false;
        Ok(InboundFieldResult::Applied)
    }

    /// Stores a value that is trusted without an authority check: spawn-time
    /// field tables, and host-relayed state on a client, which the host has
    /// already validated. Like [`Self::apply_inbound`], never marks dirty.
    pub fn apply_trusted(
        &mut self,
        slot: FieldSlot,
        bytes: &[u8],
    ) -> Result<InboundFieldResult, FieldError> {
        let Some(index) = self.slot_index.get(&slot).copied() else {
            return Ok(InboundFieldResult::UnknownSlot);
        };
        let entry = &mut self.entries[index];

        let hash = content_hash(bytes);
        if entry.has_value && entry.last_hash == hash {
            return Ok(InboundFieldResult::Unchanged);
        }

        entry.cached = bytes.to_vec();
        entry.last_hash = hash;
        entry.has_value = true;
        entry.dirty = false;
        Ok(InboundFieldResult::Applied)
    }

    pub fn clear_dirty(&mut self) {
        for entry in &mut self.entries {
            entry.dirty = false;
        }
    }

    /// Drains the reliable-changed accumulation list.
    pub fn take_reliable_changed(&mut self) -> Vec<FieldSlot> {
        std::mem::take(&mut self.reliable_changed)
    }

    /// Queues every reliable field holding a value for retransmission.
    /// Called on any authority/version bump so reliable state always
    /// flushes across an ownership handoff.
    pub fn flush_reliable(&mut self) {
        let slots: Vec<FieldSlot> = self
            .entries
            .iter()
            .filter(|entry| entry.class == FieldClass::Reliable && entry.has_value)
            .map(|entry| entry.slot)
            .collect();
        for slot in slots {
            if !self.reliable_changed.contains(&slot) {
                self.reliable_changed.push(slot);
            }
        }
    }

    fn entry_ref(&self, slot: FieldSlot) -> Option<&FieldEntry<C>> {
        self.slot_index.get(&slot).map(|index| &self.entries[*index])
    }

    fn entry_mut(&mut self, slot: FieldSlot) -> Result<&mut FieldEntry<C>, FieldError> {
        let index = self
            .slot_index
            .get(&slot)
            .copied()
            .ok_or(FieldError::UnknownSlot { slot })?;
        Ok(&mut self.entries[index])
    }
}

impl<C: Copy + Eq + Hash> Default for FieldRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
