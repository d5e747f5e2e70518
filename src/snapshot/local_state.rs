use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::field::FieldSlot;
use crate::types::{SnapshotId, SnapshotVersion};

/// Outbound reconciliation record for one object.
///
/// `full_state` tracks, per slot, the connections that have confirmed
/// receipt of the current value. It is the sole input deciding whether a
/// peer needs a resend: the set for a slot is cleared whenever that slot's
/// value changes, and a connection's membership everywhere is cleared when
/// it joins, re-appears from culling, or the object's version bumps.
pub struct LocalSnapshotState<C> {
    version: SnapshotVersion,
    snapshot_id: SnapshotId,
    full_state: HashMap<FieldSlot, HashSet<C>>,
}

impl<C: Copy + Eq + Hash> LocalSnapshotState<C> {
    pub fn new() -> Self {
        Self {
            version: 0,
            snapshot_id: 0,
            full_state: HashMap::new(),
        }
    }

    pub fn version(&self) -> SnapshotVersion {
        self.version
    }

    pub fn set_version(&mut self, version: SnapshotVersion) {
        self.version = version;
        self.full_state.clear();
    }

    /// Full reset of the object's replication state: wrapping version bump
    /// plus loss of all per-connection confirmations.
    pub fn bump_version(&mut self) -> SnapshotVersion {
        self.version = self.version.wrapping_add(1);
        self.full_state.clear();
        self.version
    }

    pub fn next_snapshot_id(&mut self) -> SnapshotId {
        self.snapshot_id = self.snapshot_id.wrapping_add(1);
        self.snapshot_id
    }

    pub fn last_snapshot_id(&self) -> SnapshotId {
        self.snapshot_id
    }

    /// The slot's value changed: nobody is confirmed anymore.
    pub fn slot_changed(&mut self, slot: FieldSlot) {
        self.full_state.remove(&slot);
    }

    /// Forget everything confirmed for one connection (join, reveal after
    /// culling, disconnect).
    pub fn clear_connection(&mut self, connection: &C) {
        for confirmed in self.full_state.values_mut() {
            confirmed.remove(connection);
        }
    }

    pub fn has_full_state(&self, slot: FieldSlot, connection: &C) -> bool {
        self.full_state
            .get(&slot)
            .map(|confirmed| confirmed.contains(connection))
            .unwrap_or(false)
    }

    pub fn mark_satisfied(&mut self, slot: FieldSlot, connection: C) {
        self.full_state.entry(slot).or_default().insert(connection);
    }
}

impl<C: Copy + Eq + Hash> Default for LocalSnapshotState<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::LocalSnapshotState;
    use crate::field::FieldSlot;

    const SLOT: FieldSlot = FieldSlot::from_u32(3);

    #[test]
    fn value_change_clears_confirmations() {
        let mut state: LocalSnapshotState<u8> = LocalSnapshotState::new();
        state.mark_satisfied(SLOT, 1);
        assert!(state.has_full_state(SLOT, &1));
        state.slot_changed(SLOT);
        assert!(!state.has_full_state(SLOT, &1));
    }

    #[test]
    fn version_bump_wraps_and_clears() {
        let mut state: LocalSnapshotState<u8> = LocalSnapshotState::new();
        state.set_version(u16::MAX);
        state.mark_satisfied(SLOT, 1);
        assert_eq!(state.bump_version(), 0);
        assert!(!state.has_full_state(SLOT, &1));
    }

    #[test]
    fn clearing_one_connection_keeps_others() {
        let mut state: LocalSnapshotState<u8> = LocalSnapshotState::new();
        state.mark_satisfied(SLOT, 1);
        state.mark_satisfied(SLOT, 2);
        state.clear_connection(&1);
        assert!(!state.has_full_state(SLOT, &1));
        assert!(state.has_full_state(SLOT, &2));
    }
}
