use std::collections::HashMap;

use crate::field::FieldSlot;
use crate::sequence::sequence_greater_than_u32;
use crate::types::SnapshotId;

/// Inbound bookkeeping for one object: the last applied snapshot id and,
/// per slot, the hash of the last applied value. The hashes answer "does
/// the sender already match this value" without re-decoding the payload.
pub struct RemoteSnapshotState {
    last_snapshot_id: Option<SnapshotId>,
    last_applied: HashMap<FieldSlot, u64>,
}

impl RemoteSnapshotState {
    pub fn new() -> Self {
        Self {
            last_snapshot_id: None,
            last_applied: HashMap::new(),
        }
    }

    /// Accepts or rejects an inbound snapshot id. Snapshots must strictly
    /// advance; duplicates and reordered arrivals are dropped whole. Ids
    /// wrap, so the comparison is the half-circle one.
    pub fn accept(&mut self, id: SnapshotId) -> bool {
        if let Some(last) = self.last_snapshot_id {
            if !sequence_greater_than_u32(id, last) {
                return false;
            }
        }
        self.last_snapshot_id = Some(id);
        true
    }

    pub fn slot_matches(&self, slot: FieldSlot, hash: u64) -> bool {
        self.last_applied.get(&slot) == Some(&hash)
    }

    pub fn record(&mut self, slot: FieldSlot, hash: u64) {
        self.last_applied.insert(slot, hash);
    }

    /// Reset on version bump or ownership change so the next snapshot from
    /// the new authority applies in full.
    pub fn reset(&mut self) {
        self.last_snapshot_id = None;
        self.last_applied.clear();
    }
}

impl Default for RemoteSnapshotState {
    fn default() -> Self {
        Self::new()
    }
}
