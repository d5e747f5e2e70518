use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use log::trace;

use super::local_state::LocalSnapshotState;
use crate::field::{FieldRegistry, FieldSlot};
use crate::object::{OwnershipState, SyncFlags};
use crate::sequence::sequence_greater_than_u32;
use crate::types::{Participant, SnapshotId, SnapshotVersion};

/// Per-(object, connection) convergence state. A connection only reaches
/// `FullAck` when every currently-controlled entry is confirmed at its
/// current value; one divergent entry keeps it in `PartialAck` and the
/// entry is retried every tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckState {
    NoState,
    PartialAck,
    FullAck,
}

struct SentSnapshot {
    id: SnapshotId,
    entries: Vec<(FieldSlot, u64)>,
}

#[derive(Default)]
struct ConnectionAckTracker {
    sent: VecDeque<SentSnapshot>,
    has_sent: bool,
}

/// One tick's outbound delta. Entries are serialized once and shared; each
/// target carries the indices of the entries it still needs.
pub struct OutboundSnapshot<C> {
    pub version: SnapshotVersion,
    pub snapshot_id: SnapshotId,
    pub entries: Vec<(FieldSlot, Vec<u8>)>,
    pub per_target: Vec<(C, Vec<usize>)>,
}

/// Versioned, per-connection acknowledgement tracker for one object's
/// outbound snapshots.
pub struct SnapshotReconciler<C> {
    local: LocalSnapshotState<C>,
    trackers: HashMap<C, ConnectionAckTracker>,
}

impl<C: Copy + Eq + Hash> SnapshotReconciler<C> {
    pub fn new() -> Self {
        Self {
            local: LocalSnapshotState::new(),
            trackers: HashMap::new(),
        }
    }

    pub fn version(&self) -> SnapshotVersion {
        self.local.version()
    }

    pub fn set_version(&mut self, version: SnapshotVersion) {
        self.local.set_version(version);
        for tracker in self.trackers.values_mut() {
            tracker.sent.clear();
        }
    }

    /// Full replication reset (ownership handoff). In-flight snapshots
    /// produced under the old version can no longer satisfy anything.
    pub fn bump_version(&mut self) -> SnapshotVersion {
        let version = self.local.bump_version();
        for tracker in self.trackers.values_mut() {
            tracker.sent.clear();
        }
        version
    }

    /// A slot's value changed locally; every peer needs a resend.
    pub fn note_slot_changed(&mut self, slot: FieldSlot) {
        self.local.slot_changed(slot);
    }

    /// Marks one connection as already holding the slot's current value
    /// without waiting for an ack. Used when relaying: the connection that
    /// authored a value must not have it echoed back.
    pub fn mark_satisfied(&mut self, slot: FieldSlot, connection: C) {
        self.local.mark_satisfied(slot, connection);
    }

    pub fn add_connection(&mut self, connection: C) {
        self.trackers.entry(connection).or_default();
    }

    pub fn remove_connection(&mut self, connection: &C) {
        self.trackers.remove(connection);
        self.local.clear_connection(connection);
    }

    /// Drops everything known about the connection's received state while
    /// keeping it as a target. Used when an object re-appears from culling:
    /// full state is resent rather than a stale delta.
    pub fn reset_connection(&mut self, connection: &C) {
        if let Some(tracker) = self.trackers.get_mut(connection) {
            tracker.sent.clear();
            tracker.has_sent = false;
        }
        self.local.clear_connection(connection);
    }

    /// Produces this tick's outbound delta for `targets`. An entry is
    /// included for a connection iff that connection lacks confirmed full
    /// state for the slot; a changed value clears those confirmations
    /// beforehand via [`Self::note_slot_changed`]. Returns `None` (and
    /// consumes no snapshot id) when every target is fully converged.
    ///
    /// A peer never transmits a slot whose authority predicate denies it;
    /// the host is exempt, since it relays values it has already validated
    /// on receipt.
    pub fn produce(
        &mut self,
        registry: &FieldRegistry<C>,
        flags: SyncFlags,
        local: &Participant<C>,
        ownership: &OwnershipState<C>,
        targets: &[C],
        ack_log_depth: usize,
    ) -> Option<OutboundSnapshot<C>> {
        let local_connection = local.connection();
        let mut entries: Vec<(FieldSlot, Vec<u8>, u64)> = Vec::new();
        for slot in registry.snapshot_slots() {
            if flags.suppresses(slot) {
                continue;
            }
            if !local.is_host()
                && !registry.authority_allows(slot, local_connection.as_ref(), ownership)
            {
                continue;
            }
            let (Some(bytes), Some(hash)) = (registry.cached_bytes(slot), registry.hash_of(slot))
            else {
                continue;
            };
            entries.push((slot, bytes.to_vec(), hash));
        }
        if entries.is_empty() {
            return None;
        }

        let mut per_target: Vec<(C, Vec<usize>)> = Vec::new();
        for target in targets {
            let indices: Vec<usize> = entries
                .iter()
                .enumerate()
                .filter(|(_, (slot, _, _))| !self.local.has_full_state(*slot, target))
                .map(|(index, _)| index)
                .collect();
            if !indices.is_empty() {
                per_target.push((*target, indices));
            }
        }
        if per_target.is_empty() {
            return None;
        }

        let snapshot_id = self.local.next_snapshot_id();
        for (target, indices) in &per_target {
            let tracker = self.trackers.entry(*target).or_default();
            tracker.has_sent = true;
            tracker.sent.push_back(SentSnapshot {
                id: snapshot_id,
                entries: indices
                    .iter()
                    .map(|index| (entries[*index].0, entries[*index].2))
                    .collect(),
            });
            while tracker.sent.len() > ack_log_depth {
                tracker.sent.pop_front();
            }
        }

        Some(OutboundSnapshot {
            version: self.local.version(),
            snapshot_id,
            entries: entries
                .into_iter()
                .map(|(slot, bytes, _)| (slot, bytes))
                .collect(),
            per_target,
        })
    }

    /// Consumes an inbound ack. Every sent entry whose on-wire hash still
    /// equals the slot's current hash marks the connection satisfied for
    /// that slot; entries whose value moved on since stay unconfirmed and
    /// are retried. Returns the connection's resulting ack state.
    pub fn handle_ack(
        &mut self,
        connection: &C,
        snapshot_id: SnapshotId,
        registry: &FieldRegistry<C>,
        flags: SyncFlags,
    ) -> Option<AckState> {
        let tracker = self.trackers.get_mut(connection)?;
        let position = tracker.sent.iter().position(|sent| sent.id == snapshot_id)?;

        let acked = &tracker.sent[position];
        let mut satisfied: Vec<FieldSlot> = Vec::new();
        for (slot, sent_hash) in &acked.entries {
            if registry.hash_of(*slot) == Some(*sent_hash) {
                satisfied.push(*slot);
            } else {
                trace!("ack for superseded value, slot stays unconfirmed");
            }
        }

        // everything up to and including the acked snapshot is settled;
        // ids wrap, so the comparison is the half-circle one
        while tracker
            .sent
            .front()
            .map(|sent| !sequence_greater_than_u32(sent.id, snapshot_id))
            .unwrap_or(false)
        {
            tracker.sent.pop_front();
        }

        for slot in satisfied {
            self.local.mark_satisfied(slot, *connection);
        }

        Some(self.ack_state(connection, registry, flags))
    }

    /// Derived `NoState -> PartialAck -> FullAck` status for one
    /// connection.
    pub fn ack_state(
        &self,
        connection: &C,
        registry: &FieldRegistry<C>,
        flags: SyncFlags,
    ) -> AckState {
        let has_sent = self
            .trackers
            .get(connection)
            .map(|tracker| tracker.has_sent)
            .unwrap_or(false);

        let mut any_unsatisfied = false;
        let mut any_controlled = false;
        for slot in registry.snapshot_slots() {
            if flags.suppresses(slot) {
                continue;
            }
            any_controlled = true;
            if !self.local.has_full_state(slot, connection) {
                any_unsatisfied = true;
            }
        }

        if !any_controlled {
            return AckState::NoState;
        }
        if any_unsatisfied {
            if has_sent {
                AckState::PartialAck
            } else {
                AckState::NoState
            }
        } else {
            AckState::FullAck
        }
    }
}

impl<C: Copy + Eq + Hash> Default for SnapshotReconciler<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{AckState, SnapshotReconciler};
    use crate::field::{FieldAuthority, FieldConfig, FieldRegistry, FieldSlot};
    use crate::object::{OwnershipState, SyncFlags};
    use crate::types::Participant;

    const A: FieldSlot = FieldSlot::from_u32(20);
    const B: FieldSlot = FieldSlot::from_u32(21);

    fn registry() -> FieldRegistry<u8> {
        let mut registry = FieldRegistry::new();
        registry.register(A, FieldConfig::default());
        registry.register(B, FieldConfig::default());
        registry.submit_local(A, vec![1]).unwrap();
        registry.submit_local(B, vec![2]).unwrap();
        registry
    }

    fn unowned() -> OwnershipState<u8> {
        OwnershipState::new(None)
    }

    #[test]
    fn resends_until_acked() {
        let mut reconciler: SnapshotReconciler<u8> = SnapshotReconciler::new();
        reconciler.add_connection(1);
        let registry = registry();
        let flags = SyncFlags::empty();

        let first = reconciler
            .produce(&registry, flags, &Participant::Host, &unowned(), &[1], 8)
            .unwrap();
        assert_eq!(first.per_target[0].1.len(), 2);

        // no ack arrived: both entries go out again
        let second = reconciler
            .produce(&registry, flags, &Participant::Host, &unowned(), &[1], 8)
            .unwrap();
        assert_eq!(second.per_target[0].1.len(), 2);

        let state = reconciler
            .handle_ack(&1, second.snapshot_id, &registry, flags)
            .unwrap();
        assert_eq!(state, AckState::FullAck);

        // fully converged: nothing to send
        assert!(reconciler
            .produce(&registry, flags, &Participant::Host, &unowned(), &[1], 8)
            .is_none());
    }

    #[test]
    fn changed_value_invalidates_confirmation() {
        let mut reconciler: SnapshotReconciler<u8> = SnapshotReconciler::new();
        reconciler.add_connection(1);
        let mut registry = registry();
        let flags = SyncFlags::empty();

        let out = reconciler
            .produce(&registry, flags, &Participant::Host, &unowned(), &[1], 8)
            .unwrap();
        reconciler.handle_ack(&1, out.snapshot_id, &registry, flags);

        registry.submit_local(A, vec![9]).unwrap();
        reconciler.note_slot_changed(A);

        let next = reconciler
            .produce(&registry, flags, &Participant::Host, &unowned(), &[1], 8)
            .unwrap();
        assert_eq!(next.per_target[0].1.len(), 1);
        assert_eq!(next.entries[next.per_target[0].1[0]].0, A);
    }

    #[test]
    fn ack_for_superseded_value_does_not_satisfy() {
        let mut reconciler: SnapshotReconciler<u8> = SnapshotReconciler::new();
        reconciler.add_connection(1);
        let mut registry = registry();
        let flags = SyncFlags::empty();

        let out = reconciler
            .produce(&registry, flags, &Participant::Host, &unowned(), &[1], 8)
            .unwrap();

        // value moves on before the ack lands
        registry.submit_local(A, vec![9]).unwrap();
        reconciler.note_slot_changed(A);

        let state = reconciler
            .handle_ack(&1, out.snapshot_id, &registry, flags)
            .unwrap();
        assert_eq!(state, AckState::PartialAck);

        let next = reconciler
            .produce(&registry, flags, &Participant::Host, &unowned(), &[1], 8)
            .unwrap();
        assert_eq!(next.per_target[0].1.len(), 1);
    }

    #[test]
    fn version_bump_forces_full_resend() {
        let mut reconciler: SnapshotReconciler<u8> = SnapshotReconciler::new();
        reconciler.add_connection(1);
        let registry = registry();
        let flags = SyncFlags::empty();

        let out = reconciler
            .produce(&registry, flags, &Participant::Host, &unowned(), &[1], 8)
            .unwrap();
        reconciler.handle_ack(&1, out.snapshot_id, &registry, flags);
        assert!(reconciler
            .produce(&registry, flags, &Participant::Host, &unowned(), &[1], 8)
            .is_none());

        reconciler.bump_version();
        let resend = reconciler
            .produce(&registry, flags, &Participant::Host, &unowned(), &[1], 8)
            .unwrap();
        assert_eq!(resend.per_target[0].1.len(), 2);
    }

    #[test]
    fn acks_after_version_bump_are_ignored() {
        let mut reconciler: SnapshotReconciler<u8> = SnapshotReconciler::new();
        reconciler.add_connection(1);
        let registry = registry();
        let flags = SyncFlags::empty();

        let out = reconciler
            .produce(&registry, flags, &Participant::Host, &unowned(), &[1], 8)
            .unwrap();
        reconciler.bump_version();
        // the sent log was cleared; the stale ack correlates with nothing
        assert!(reconciler
            .handle_ack(&1, out.snapshot_id, &registry, flags)
            .is_none());
    }

    #[test]
    fn entries_outside_local_authority_are_not_transmitted() {
        let mut reconciler: SnapshotReconciler<u8> = SnapshotReconciler::new();
        reconciler.add_connection(1);
        let mut registry: FieldRegistry<u8> = FieldRegistry::new();
        registry.register(A, FieldConfig::default());
        registry.register(
            B,
            FieldConfig {
                authority: FieldAuthority::Host,
                ..FieldConfig::default()
            },
        );
        registry.submit_local(A, vec![1]).unwrap();
        registry.submit_local(B, vec![2]).unwrap();
        let owned = OwnershipState::with_owner(None, Some(2u8));
        let flags = SyncFlags::empty();

        // the owner may author A but not the host-only B
        let out = reconciler
            .produce(&registry, flags, &Participant::Peer(2), &owned, &[1], 8)
            .unwrap();
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].0, A);

        // the host relays both
        let relayed = reconciler
            .produce(&registry, flags, &Participant::Host, &owned, &[1], 8)
            .unwrap();
        assert_eq!(relayed.entries.len(), 2);
    }
}
