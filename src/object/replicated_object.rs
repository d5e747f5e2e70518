use std::collections::HashMap;
use std::hash::Hash;

use super::culling::CullState;
use super::flags::SyncFlags;
use super::id::ObjectId;
use super::ownership::OwnershipState;
use crate::field::{FieldConfig, FieldRegistry, FieldSlot};
use crate::snapshot::{RemoteSnapshotState, SnapshotReconciler};
use crate::types::{GameInstant, SnapshotVersion};

/// One networked entity's replication record: identity, ownership, field
/// table, outbound reconciliation state, inbound bookkeeping, and
/// per-connection culling.
pub struct ReplicatedObject<C> {
    id: ObjectId,
    pub ownership: OwnershipState<C>,
    pub flags: SyncFlags,
    pub enabled: bool,
    pub parent: Option<ObjectId>,
    /// Skip the visibility test entirely; the object is replicated to every
    /// connected peer.
    pub always_transmit: bool,
    pub fields: FieldRegistry<C>,
    pub reconciler: SnapshotReconciler<C>,
    pub remote: RemoteSnapshotState,
    pub cull: HashMap<C, CullState>,
}

impl<C: Copy + Eq + Hash> ReplicatedObject<C> {
    pub fn new(id: ObjectId, creator: Option<C>) -> Self {
        Self {
            id,
            ownership: OwnershipState::new(creator),
            flags: SyncFlags::empty(),
            enabled: true,
            parent: None,
            always_transmit: false,
            fields: FieldRegistry::new(),
            reconciler: SnapshotReconciler::new(),
            remote: RemoteSnapshotState::new(),
            cull: HashMap::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn version(&self) -> SnapshotVersion {
        self.reconciler.version()
    }

    pub fn register_field(&mut self, slot: FieldSlot, config: FieldConfig<C>) -> bool {
        self.fields.register(slot, config)
    }

    /// Applies an ownership change that has already been authorized.
    /// Returns `false` (and does nothing) when the owner is unchanged, so
    /// the caller's ownership-changed hook fires exactly once per change.
    ///
    /// A real change is a full replication reset: the version bumps, every
    /// per-connection confirmation is dropped on both the outbound and
    /// inbound side, and reliable fields are queued to flush
    /// unconditionally under the new authority.
    pub fn apply_owner_change(&mut self, new_owner: Option<C>) -> bool {
        if !self.ownership.set_owner(new_owner) {
            return false;
        }
        self.reconciler.bump_version();
        self.remote.reset();
        self.fields.flush_reliable();
        true
    }

    /// Registers a connection as a replication target.
    pub fn add_connection(&mut self, connection: C, now: GameInstant) {
        self.reconciler.add_connection(connection);
        self.cull.insert(connection, CullState::new(now));
    }

    pub fn remove_connection(&mut self, connection: &C) {
        self.reconciler.remove_connection(connection);
        self.cull.remove(connection);
    }

    pub fn is_culled_for(&self, connection: &C) -> bool {
        self.cull
            .get(connection)
            .map(|state| state.is_culled())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::ReplicatedObject;
    use crate::field::{FieldConfig, FieldSlot};
    use crate::object::ObjectId;

    #[test]
    fn owner_change_resets_replication_state() {
        let mut object: ReplicatedObject<u8> = ReplicatedObject::new(ObjectId::from_u64(1), None);
        let slot = FieldSlot::from_u32(30);
        object.register_field(slot, FieldConfig::reliable());
        object.fields.submit_local(slot, vec![1]).unwrap();
        object.fields.take_reliable_changed();

        let before = object.version();
        assert!(object.apply_owner_change(Some(4)));
        assert_eq!(object.version(), before.wrapping_add(1));
        // reliable state flushes unconditionally across the handoff
        assert_eq!(object.fields.take_reliable_changed(), vec![slot]);
        // no-op change does not reset again
        assert!(!object.apply_owner_change(Some(4)));
        assert_eq!(object.version(), before.wrapping_add(1));
    }
}
