use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use log::{debug, trace, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::config::RouterConfig;
use super::connection::{ConnectionState, HandshakePhase};
use super::error::RouterError;
use super::event::ReplicationEvent;
use crate::field::{content_hash, FieldClass, FieldConfig, FieldSlot, InboundFieldResult};
use crate::message::{self, DetachMode, FieldValue, ObjectCreate, ReplicationMessage};
use crate::object::{
    CullTransition, ObjectId, ObjectIdGenerator, OwnershipState, ReplicatedObject, SyncFlags,
    VisibilityTest,
};
use crate::rpc::{RpcDispatcher, RpcError, RpcInvocation, RpcKey, RpcMode, RpcTarget};
use crate::sequence::{sequence_greater_than, sequence_less_than};
use crate::transport::Transport;
use crate::types::{GameInstant, Participant};
use crate::world::{WorldMut, WorldRef};

/// Registration-time description of a locally spawned object.
pub struct ObjectDescriptor<C> {
    pub owner: Option<C>,
    pub parent: Option<ObjectId>,
    pub flags: SyncFlags,
    pub always_transmit: bool,
    pub enabled: bool,
    pub fields: Vec<(FieldSlot, FieldConfig<C>)>,
}

impl<C> Default for ObjectDescriptor<C> {
    fn default() -> Self {
        Self {
            owner: None,
            parent: None,
            flags: SyncFlags::empty(),
            always_transmit: false,
            enabled: true,
            fields: Vec::new(),
        }
    }
}

/// The replication core. One instance per participant; the host instance
/// additionally validates and relays everything its peers produce.
///
/// The router never touches the network or the simulation directly: raw
/// payloads go out through a [`Transport`], come back in through
/// [`Self::receive`], and field bytes cross the world seam as opaque
/// values. Time is passed in explicitly so tests can drive it.
pub struct ReplicationRouter<C> {
    identity: Participant<C>,
    config: RouterConfig,
    objects: HashMap<ObjectId, ReplicatedObject<C>>,
    /// Spawn order, which is also snapshot and scene-description order.
    object_order: Vec<ObjectId>,
    connections: HashMap<C, ConnectionState>,
    id_generator: ObjectIdGenerator,
    rpc: RpcDispatcher<C>,
    visibility: Option<Box<dyn VisibilityTest<C>>>,
    batch_depth: usize,
    pending_batch: Vec<ObjectCreate<C>>,
    suppress_depth: usize,
    events: Vec<ReplicationEvent<C>>,
}

impl<C> ReplicationRouter<C>
where
    C: Copy + Eq + Hash + Debug + Serialize + DeserializeOwned,
{
    pub fn new(identity: Participant<C>) -> Self {
        Self::with_config(identity, RouterConfig::default())
    }

    pub fn with_config(identity: Participant<C>, config: RouterConfig) -> Self {
        Self {
            identity,
            config,
            objects: HashMap::new(),
            object_order: Vec::new(),
            connections: HashMap::new(),
            id_generator: ObjectIdGenerator::new(),
            rpc: RpcDispatcher::new(),
            visibility: None,
            batch_depth: 0,
            pending_batch: Vec::new(),
            suppress_depth: 0,
            events: Vec::new(),
        }
    }

    pub fn identity(&self) -> Participant<C> {
        self.identity
    }

    pub fn set_visibility_test(&mut self, test: Box<dyn VisibilityTest<C>>) {
        self.visibility = Some(test);
    }

    /// Carves out a disjoint object-id range, for participants that spawn
    /// concurrently with the host.
    pub fn set_id_base(&mut self, base: u64) {
        self.id_generator = ObjectIdGenerator::starting_at(base);
    }

    pub fn rpc_mut(&mut self) -> &mut RpcDispatcher<C> {
        &mut self.rpc
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&ReplicatedObject<C>> {
        self.objects.get(&id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut ReplicatedObject<C>> {
        self.objects.get_mut(&id)
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.object_order.clone()
    }

    pub fn connection_phase(&self, connection: &C) -> Option<HandshakePhase> {
        self.connections.get(connection).map(|state| state.phase)
    }

    /// Drains the accumulated application-facing events.
    pub fn take_events(&mut self) -> Vec<ReplicationEvent<C>> {
        std::mem::take(&mut self.events)
    }

    // lifecycle of connections ------------------------------------------

    /// A transport-level connection was established. Replication stays off
    /// until the join handshake completes.
    pub fn connection_opened(&mut self, connection: C) {
        self.connections
            .entry(connection)
            .or_insert_with(ConnectionState::new);
    }

    /// A connection went away, at any handshake phase. Objects it owned
    /// revert to the host.
    pub fn connection_closed<T: Transport<C>>(&mut self, connection: C, transport: &mut T) {
        if self.connections.remove(&connection).is_none() {
            return;
        }
        for object in self.objects.values_mut() {
            object.remove_connection(&connection);
        }
        if self.identity.is_host() {
            let orphaned: Vec<ObjectId> = self
                .objects
                .iter()
                .filter(|(_, object)| object.ownership.owner() == Some(connection))
                .map(|(id, _)| *id)
                .collect();
            for id in orphaned {
                if let Some(object) = self.objects.get_mut(&id) {
                    let previous = object.ownership.owner();
                    if object.apply_owner_change(None) {
                        self.events.push(ReplicationEvent::OwnershipChanged {
                            id,
                            previous,
                            owner: None,
                        });
                        self.send_reliable_to_connected(
                            &ReplicationMessage::SetOwner { id, owner: None },
                            transport,
                        );
                    }
                }
            }
        }
        self.events
            .push(ReplicationEvent::PeerDisconnected { connection });
    }

    // join handshake ----------------------------------------------------

    /// Host side: starts the join handshake by telling the connection which
    /// scene to load.
    pub fn begin_handshake<T: Transport<C>>(
        &mut self,
        connection: C,
        scene: u64,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        if !self.identity.is_host() {
            return Err(RouterError::HostOnly);
        }
        let state = self
            .connections
            .get_mut(&connection)
            .ok_or(RouterError::UnknownConnection)?;
        let handshake = fastrand::u64(..);
        state.scene = Some(scene);
        state.handshake = handshake;
        state.phase = HandshakePhase::MountingAssets;
        self.send_reliable(
            &connection,
            &ReplicationMessage::LoadSceneBegin { scene, handshake },
            transport,
        );
        Ok(())
    }

    /// Peer side: the application finished mounting the scene's assets and
    /// the handshake can resume with a snapshot request.
    pub fn asset_mount_complete<T: Transport<C>>(
        &mut self,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        if self.identity.is_host() {
            return Err(RouterError::PeerOnly);
        }
        let link = self.host_link().ok_or(RouterError::UnknownConnection)?;
        let state = self
            .connections
            .get_mut(&link)
            .ok_or(RouterError::UnknownConnection)?;
        if state.phase != HandshakePhase::MountingAssets {
            return Err(RouterError::UnexpectedPhase);
        }
        let Some(scene) = state.scene else {
            return Err(RouterError::UnexpectedPhase);
        };
        let handshake = state.handshake;
        state.phase = HandshakePhase::AwaitingSnapshot;
        self.send_reliable(
            &link,
            &ReplicationMessage::RequestSnapshot { scene, handshake },
            transport,
        );
        Ok(())
    }

    // object lifecycle --------------------------------------------------

    /// Reserves an id so the application can bind its world object before
    /// registering it for replication.
    pub fn reserve_object_id(&mut self) -> ObjectId {
        self.id_generator.generate()
    }

    /// Registers a locally spawned object and announces it, unless a
    /// suppress scope is open. Initial field values are read from the
    /// world; slots the world cannot serve yet are retried on the next
    /// tick.
    pub fn register_object<W: WorldRef, T: Transport<C>>(
        &mut self,
        id: ObjectId,
        descriptor: ObjectDescriptor<C>,
        now: GameInstant,
        world: &W,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        if self.objects.contains_key(&id) {
            return Err(RouterError::DuplicateObject { object: id });
        }

        let creator = self.identity.connection();
        let mut object = ReplicatedObject::new(id, creator);
        object.ownership = OwnershipState::with_owner(creator, descriptor.owner);
        object.flags = descriptor.flags;
        object.parent = descriptor.parent;
        object.enabled = descriptor.enabled;
        object.always_transmit = descriptor.always_transmit;
        for (slot, config) in descriptor.fields {
            object.register_field(slot, config);
            match world.field_bytes(id, slot) {
                Some(bytes) => {
                    object.fields.submit_local(slot, bytes)?;
                }
                None => object.fields.mark_dirty(slot)?,
            }
        }
        for (peer, state) in &self.connections {
            if state.phase == HandshakePhase::Connected {
                object.add_connection(*peer, now);
            }
        }

        let announce = self.suppress_depth == 0;
        let create = Self::describe(&object, world);
        self.object_order.push(id);
        self.objects.insert(id, object);

        if announce {
            if self.batch_depth > 0 {
                self.pending_batch.push(create);
            } else {
                self.send_reliable_to_connected(&ReplicationMessage::ObjectCreate(create), transport);
            }
        }
        Ok(())
    }

    /// Stops replicating an object and announces the destruction.
    pub fn destroy_object<T: Transport<C>>(
        &mut self,
        id: ObjectId,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        self.authorize_local(id)?;
        self.objects.remove(&id);
        self.object_order.retain(|other| *other != id);
        if self.suppress_depth == 0 {
            self.send_reliable_to_connected(&ReplicationMessage::ObjectDestroy { id }, transport);
        }
        Ok(())
    }

    /// Unhooks an object from replication without necessarily destroying
    /// its remote instances.
    pub fn detach_object<T: Transport<C>>(
        &mut self,
        id: ObjectId,
        mode: DetachMode,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        self.authorize_local(id)?;
        self.objects.remove(&id);
        self.object_order.retain(|other| *other != id);
        if self.suppress_depth == 0 {
            self.send_reliable_to_connected(&ReplicationMessage::ObjectDetach { id, mode }, transport);
        }
        Ok(())
    }

    /// Announces destruction of one component of a replicated object. The
    /// object itself stays replicated.
    pub fn destroy_component<T: Transport<C>>(
        &mut self,
        id: ObjectId,
        component: u32,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        self.authorize_local(id)?;
        self.send_reliable_to_connected(
            &ReplicationMessage::ObjectDestroyComponent { id, component },
            transport,
        );
        Ok(())
    }

    /// Announces destruction of a non-replicated descendant, addressed by
    /// its child path under the replicated root.
    pub fn destroy_descendant<T: Transport<C>>(
        &mut self,
        id: ObjectId,
        path: Vec<u32>,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        self.authorize_local(id)?;
        self.send_reliable_to_connected(
            &ReplicationMessage::ObjectDestroyDescendant { id, path },
            transport,
        );
        Ok(())
    }

    /// Re-announces an object whose structure changed. A refresh is a full
    /// replication reset, like an ownership handoff.
    pub fn refresh_object<W: WorldRef, T: Transport<C>>(
        &mut self,
        id: ObjectId,
        world: &W,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        self.authorize_local(id)?;
        let Some(object) = self.objects.get_mut(&id) else {
            return Err(RouterError::UnknownObject { object: id });
        };
        object.reconciler.bump_version();
        object.remote.reset();
        object.fields.flush_reliable();
        let message = ReplicationMessage::ObjectRefresh {
            id,
            parent: object.parent,
            payload: world.object_payload(id),
            field_table: Self::field_table(object),
        };
        self.send_reliable_to_connected(&message, transport);
        Ok(())
    }

    /// Re-announces a non-replicated descendant of a replicated root.
    pub fn refresh_descendant<T: Transport<C>>(
        &mut self,
        id: ObjectId,
        path: Vec<u32>,
        payload: Vec<u8>,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        self.authorize_local(id)?;
        self.send_reliable_to_connected(
            &ReplicationMessage::ObjectRefreshDescendant {
                id,
                path,
                payload,
                field_table: Vec::new(),
            },
            transport,
        );
        Ok(())
    }

    /// Reassigns ownership. Permitted to the host and to the current
    /// controller; fires the ownership-changed event exactly once per
    /// actual change.
    pub fn set_owner<T: Transport<C>>(
        &mut self,
        id: ObjectId,
        owner: Option<C>,
        transport: &mut T,
    ) -> Result<(), RouterError> {
        self.authorize_local(id)?;
        let Some(object) = self.objects.get_mut(&id) else {
            return Err(RouterError::UnknownObject { object: id });
        };
        let previous = object.ownership.owner();
        if object.apply_owner_change(owner) {
            self.events.push(ReplicationEvent::OwnershipChanged {
                id,
                previous,
                owner,
            });
            self.send_reliable_to_connected(&ReplicationMessage::SetOwner { id, owner }, transport);
        }
        Ok(())
    }

    // field plumbing ----------------------------------------------------

    /// Dirty-callback entry point: the named field changed and should be
    /// re-read from the world on the next tick.
    pub fn mark_field_changed(&mut self, id: ObjectId, slot: FieldSlot) -> Result<(), RouterError> {
        let object = self
            .objects
            .get_mut(&id)
            .ok_or(RouterError::UnknownObject { object: id })?;
        object.fields.mark_dirty(slot)?;
        Ok(())
    }

    /// Push-style alternative to [`Self::mark_field_changed`] for codecs
    /// that already hold the serialized value.
    pub fn submit_field(
        &mut self,
        id: ObjectId,
        slot: FieldSlot,
        bytes: Vec<u8>,
    ) -> Result<(), RouterError> {
        let object = self
            .objects
            .get_mut(&id)
            .ok_or(RouterError::UnknownObject { object: id })?;
        if object.fields.submit_local(slot, bytes)? {
            object.reconciler.note_slot_changed(slot);
        }
        Ok(())
    }

    /// Declares or replaces the schema of one field. Used after a remote
    /// spawn, where values arrive before the application declares authority
    /// and delivery classes.
    pub fn configure_field(
        &mut self,
        id: ObjectId,
        slot: FieldSlot,
        config: FieldConfig<C>,
    ) -> Result<(), RouterError> {
        let object = self
            .objects
            .get_mut(&id)
            .ok_or(RouterError::UnknownObject { object: id })?;
        if !object.fields.contains(slot) {
            object.register_field(slot, config);
        } else {
            object.fields.configure(slot, config)?;
        }
        Ok(())
    }

    // batching and suppression ------------------------------------------

    /// Opens a spawn batch: creations are held back and flushed as one
    /// message when the outermost batch closes.
    pub fn begin_spawn_batch(&mut self) {
        self.batch_depth += 1;
    }

    pub fn end_spawn_batch<T: Transport<C>>(&mut self, transport: &mut T) -> Result<(), RouterError> {
        if self.batch_depth == 0 {
            return Err(RouterError::SpawnBatchUnderflow);
        }
        self.batch_depth -= 1;
        if self.batch_depth == 0 && !self.pending_batch.is_empty() {
            let objects = std::mem::take(&mut self.pending_batch);
            self.send_reliable_to_connected(
                &ReplicationMessage::ObjectCreateBatch { objects },
                transport,
            );
        }
        Ok(())
    }

    /// Opens a suppress scope: lifecycle announcements are swallowed until
    /// the outermost scope closes. Used while instantiating content every
    /// participant already agrees on, like a scene load.
    pub fn begin_suppress(&mut self) {
        self.suppress_depth += 1;
    }

    pub fn end_suppress(&mut self) -> Result<(), RouterError> {
        if self.suppress_depth == 0 {
            return Err(RouterError::SuppressScopeUnderflow);
        }
        self.suppress_depth -= 1;
        Ok(())
    }

    // rpc ----------------------------------------------------------------

    /// Sends (or locally invokes, per the routing mode) an object-targeted
    /// call. The permission gate runs before anything leaves this machine.
    pub fn send_instance_rpc<T: Transport<C>>(
        &mut self,
        target: RpcTarget,
        key: RpcKey,
        args: Vec<u8>,
        transport: &mut T,
    ) -> Result<(), RpcError> {
        self.send_rpc(Some(target), key, args, transport)
    }

    /// Sends a call with no object target. Owner routing degenerates to
    /// host routing.
    pub fn send_static_rpc<T: Transport<C>>(
        &mut self,
        key: RpcKey,
        args: Vec<u8>,
        transport: &mut T,
    ) -> Result<(), RpcError> {
        self.send_rpc(None, key, args, transport)
    }

    fn send_rpc<T: Transport<C>>(
        &mut self,
        target: Option<RpcTarget>,
        key: RpcKey,
        args: Vec<u8>,
        transport: &mut T,
    ) -> Result<(), RpcError> {
        let config = self
            .rpc
            .config(&key)
            .ok_or(RpcError::UnknownMethod { method: key.method })?;
        let ownership = target
            .and_then(|target| target.object())
            .and_then(|id| self.objects.get(&id))
            .map(|object| object.ownership.clone());
        if !config.permission.permits(&self.identity, ownership.as_ref()) {
            return Err(RpcError::NotPermitted { method: key.method });
        }

        match config.mode {
            RpcMode::Host => {
                if self.identity.is_host() {
                    return self.invoke_rpc(&key, target, self.identity, &args);
                }
                self.send_rpc_to_host(&key, target, args, transport);
            }
            RpcMode::Owner => {
                let controls = ownership
                    .as_ref()
                    .map(|ownership| ownership.participant_has_control(&self.identity))
                    // no target object: owner routing degenerates to host
                    .unwrap_or(self.identity.is_host());
                if controls {
                    return self.invoke_rpc(&key, target, self.identity, &args);
                }
                if self.identity.is_host() {
                    match ownership.as_ref().and_then(|ownership| ownership.owner()) {
                        Some(owner) => {
                            self.send_reliable(&owner, &Self::rpc_message(&key, target, args), transport);
                        }
                        None => return self.invoke_rpc(&key, target, self.identity, &args),
                    }
                } else {
                    self.send_rpc_to_host(&key, target, args, transport);
                }
            }
            RpcMode::Broadcast => {
                if self.identity.is_host() {
                    self.send_reliable_to_connected(&Self::rpc_message(&key, target, args.clone()), transport);
                } else {
                    self.send_rpc_to_host(&key, target, args.clone(), transport);
                }
                return self.invoke_rpc(&key, target, self.identity, &args);
            }
        }
        Ok(())
    }

    fn send_rpc_to_host<T: Transport<C>>(
        &mut self,
        key: &RpcKey,
        target: Option<RpcTarget>,
        args: Vec<u8>,
        transport: &mut T,
    ) {
        if let Some(link) = self.host_link() {
            self.send_reliable(&link, &Self::rpc_message(key, target, args), transport);
        } else {
            warn!("rpc call with no host connection was dropped");
        }
    }

    fn invoke_rpc(
        &mut self,
        key: &RpcKey,
        target: Option<RpcTarget>,
        caller: Participant<C>,
        args: &[u8],
    ) -> Result<(), RpcError> {
        self.rpc.invoke(
            key,
            RpcInvocation {
                target,
                caller,
                args,
            },
        )
    }

    fn rpc_message(key: &RpcKey, target: Option<RpcTarget>, args: Vec<u8>) -> ReplicationMessage<C> {
        match target {
            Some(target) => ReplicationMessage::InstanceRpc {
                target,
                method: key.method,
                generic_args: key.generic_args.clone(),
                args,
            },
            None => ReplicationMessage::StaticRpc {
                method: key.method,
                generic_args: key.generic_args.clone(),
                args,
            },
        }
    }

    // per-tick outbound --------------------------------------------------

    /// One replication tick: updates visibility culling, re-reads changed
    /// field values from the world, and fans out delta snapshots and
    /// reliable field deltas.
    pub fn tick<W: WorldRef, T: Transport<C>>(
        &mut self,
        now: GameInstant,
        world: &W,
        transport: &mut T,
    ) {
        let peers = self.connected_peers();
        let order = self.object_order.clone();

        for id in order {
            let Some(object) = self.objects.get_mut(&id) else {
                continue;
            };

            // culling: flip per-connection state, resend on reveal
            for peer in &peers {
                let visible = object.always_transmit
                    || self
                        .visibility
                        .as_ref()
                        .map(|test| test.is_visible(id, peer))
                        .unwrap_or(true);
                let Some(cull) = object.cull.get_mut(peer) else {
                    continue;
                };
                match cull.update(visible, now, self.config.cull_grace_millis) {
                    Some(CullTransition::Revealed) => {
                        trace!("object {:?} revealed to {:?}", id, peer);
                        object.reconciler.reset_connection(peer);
                        let fields = Self::reliable_table(object);
                        if !fields.is_empty() {
                            if let Some(bytes) = encode_or_log(
                                &ReplicationMessage::<C>::ObjectFieldTableDelta { id, fields },
                            ) {
                                transport.send_reliable(peer, bytes);
                            }
                        }
                    }
                    Some(CullTransition::Culled) => {
                        trace!("object {:?} culled for {:?}", id, peer);
                    }
                    None => {}
                }
            }

            // change detection: re-read polled and dirtied slots
            let controls = object.ownership.participant_has_control(&self.identity);
            if controls {
                let mut slots = object.fields.polled_slots();
                for slot in object.fields.dirty_slots() {
                    if !slots.contains(&slot) {
                        slots.push(slot);
                    }
                }
                for slot in slots {
                    if object.flags.suppresses(slot) {
                        continue;
                    }
                    let Some(bytes) = world.field_bytes(id, slot) else {
                        continue;
                    };
                    match object.fields.submit_local(slot, bytes) {
                        Ok(true) => object.reconciler.note_slot_changed(slot),
                        Ok(false) => {}
                        Err(error) => warn!("field poll failed on {:?}: {}", id, error),
                    }
                }
            }

            // the host also produces for objects its peers author: it is
            // the relay between an owner and the other proxies
            let produces = controls || self.identity.is_host();
            let targets: Vec<C> = peers
                .iter()
                .filter(|peer| !object.is_culled_for(peer))
                .copied()
                .collect();

            if produces && !targets.is_empty() {
                if let Some(outbound) = object.reconciler.produce(
                    &object.fields,
                    object.flags,
                    &self.identity,
                    &object.ownership,
                    &targets,
                    self.config.ack_log_depth,
                ) {
                    for (target, indices) in &outbound.per_target {
                        let entries: Vec<FieldValue> = indices
                            .iter()
                            .map(|index| FieldValue {
                                slot: outbound.entries[*index].0,
                                bytes: outbound.entries[*index].1.clone(),
                            })
                            .collect();
                        let message = ReplicationMessage::<C>::DeltaSnapshot {
                            id,
                            version: outbound.version,
                            snapshot_id: outbound.snapshot_id,
                            entries,
                        };
                        if let Some(bytes) = encode_or_log(&message) {
                            transport.send_unreliable(target, bytes);
                        }
                    }
                }
            }

            // reliable side channel; same transmit gate as the snapshot
            // path, with the host exempt as relay
            let changed = object.fields.take_reliable_changed();
            if produces && !targets.is_empty() && !changed.is_empty() {
                let local_connection = self.identity.connection();
                let fields: Vec<FieldValue> = changed
                    .iter()
                    .filter(|slot| {
                        self.identity.is_host()
                            || object.fields.authority_allows(
                                **slot,
                                local_connection.as_ref(),
                                &object.ownership,
                            )
                    })
                    .filter_map(|slot| {
                        object.fields.cached_bytes(*slot).map(|bytes| FieldValue {
                            slot: *slot,
                            bytes: bytes.to_vec(),
                        })
                    })
                    .collect();
                if !fields.is_empty() {
                    if let Some(bytes) =
                        encode_or_log(&ReplicationMessage::<C>::ObjectFieldTableDelta { id, fields })
                    {
                        for target in &targets {
                            transport.send_reliable(target, bytes.clone());
                        }
                    }
                }
            }

            object.fields.clear_dirty();
        }
    }

    // inbound ------------------------------------------------------------

    /// Feeds one raw inbound payload through the router. Faults are
    /// contained per message: a bad payload is logged and dropped, never
    /// propagated to the caller.
    pub fn receive<W: WorldMut, T: Transport<C>>(
        &mut self,
        from: C,
        payload: &[u8],
        now: GameInstant,
        world: &mut W,
        transport: &mut T,
    ) {
        let message: ReplicationMessage<C> = match message::decode(payload) {
            Ok(message) => message,
            Err(error) => {
                warn!("undecodable payload dropped: {}", error);
                return;
            }
        };

        match message {
            ReplicationMessage::LoadSceneBegin { scene, handshake } => {
                self.on_load_scene_begin(from, scene, handshake)
            }
            ReplicationMessage::RequestSnapshot { scene, handshake } => {
                self.on_request_snapshot(from, scene, handshake, world, transport)
            }
            ReplicationMessage::SceneSnapshot {
                scene,
                handshake,
                objects,
            } => self.on_scene_snapshot(from, scene, handshake, objects, now, world, transport),
            ReplicationMessage::SceneLoaded { scene, handshake } => {
                self.on_scene_loaded(from, scene, handshake, now, world, transport)
            }
            other => {
                if !self.is_connected(&from) {
                    debug!("replication message before handshake completion dropped");
                    return;
                }
                self.on_replication_message(from, other, now, world, transport);
            }
        }
    }

    fn on_replication_message<W: WorldMut, T: Transport<C>>(
        &mut self,
        from: C,
        message: ReplicationMessage<C>,
        now: GameInstant,
        world: &mut W,
        transport: &mut T,
    ) {
        match message {
            ReplicationMessage::ObjectCreate(create) => {
                if let Some(sanitized) = self.accept_remote_create(Some(from), create, now) {
                    if self.identity.is_host() {
                        self.relay_reliable_except(
                            from,
                            &ReplicationMessage::ObjectCreate(sanitized),
                            transport,
                        );
                    }
                }
            }
            ReplicationMessage::ObjectCreateBatch { objects } => {
                let mut relayed = Vec::new();
                for create in objects {
                    if let Some(sanitized) = self.accept_remote_create(Some(from), create, now) {
                        relayed.push(sanitized);
                    }
                }
                if self.identity.is_host() && !relayed.is_empty() {
                    self.relay_reliable_except(
                        from,
                        &ReplicationMessage::ObjectCreateBatch { objects: relayed },
                        transport,
                    );
                }
            }
            ReplicationMessage::ObjectDestroy { id } => {
                if self.remove_remote_object(from, id) {
                    self.events.push(ReplicationEvent::ObjectDestroyed { id });
                    if self.identity.is_host() {
                        self.relay_reliable_except(
                            from,
                            &ReplicationMessage::ObjectDestroy { id },
                            transport,
                        );
                    }
                }
            }
            ReplicationMessage::ObjectDetach { id, mode } => {
                if self.remove_remote_object(from, id) {
                    self.events
                        .push(ReplicationEvent::ObjectDetached { id, mode });
                    if self.identity.is_host() {
                        self.relay_reliable_except(
                            from,
                            &ReplicationMessage::ObjectDetach { id, mode },
                            transport,
                        );
                    }
                }
            }
            ReplicationMessage::ObjectDestroyComponent { id, component } => {
                if self.sender_may_mutate(from, id) {
                    self.events
                        .push(ReplicationEvent::ComponentDestroyed { id, component });
                    if self.identity.is_host() {
                        self.relay_reliable_except(
                            from,
                            &ReplicationMessage::ObjectDestroyComponent { id, component },
                            transport,
                        );
                    }
                }
            }
            ReplicationMessage::ObjectDestroyDescendant { id, path } => {
                if self.sender_may_mutate(from, id) {
                    if self.identity.is_host() {
                        self.relay_reliable_except(
                            from,
                            &ReplicationMessage::ObjectDestroyDescendant {
                                id,
                                path: path.clone(),
                            },
                            transport,
                        );
                    }
                    self.events
                        .push(ReplicationEvent::DescendantDestroyed { id, path });
                }
            }
            ReplicationMessage::ObjectRefresh {
                id,
                parent,
                payload,
                field_table,
            } => self.on_object_refresh(from, id, parent, payload, field_table, world, transport),
            ReplicationMessage::ObjectRefreshDescendant {
                id,
                path,
                payload,
                field_table: _,
            } => {
                if self.sender_may_mutate(from, id) {
                    if self.identity.is_host() {
                        self.relay_reliable_except(
                            from,
                            &ReplicationMessage::ObjectRefreshDescendant {
                                id,
                                path: path.clone(),
                                payload: payload.clone(),
                                field_table: Vec::new(),
                            },
                            transport,
                        );
                    }
                    self.events
                        .push(ReplicationEvent::DescendantRefreshed { id, path, payload });
                }
            }
            ReplicationMessage::ObjectFieldTableDelta { id, fields } => {
                self.on_field_table_delta(from, id, fields, world, transport)
            }
            ReplicationMessage::DeltaSnapshot {
                id,
                version,
                snapshot_id,
                entries,
            } => self.on_delta_snapshot(from, id, version, snapshot_id, entries, world, transport),
            ReplicationMessage::DeltaSnapshotAck { id, snapshot_id } => {
                self.on_delta_snapshot_ack(from, id, snapshot_id)
            }
            ReplicationMessage::SetOwner { id, owner } => {
                self.on_set_owner(from, id, owner, transport)
            }
            ReplicationMessage::InstanceRpc {
                target,
                method,
                generic_args,
                args,
            } => self.on_rpc(from, Some(target), RpcKey { method, generic_args }, args, transport),
            ReplicationMessage::StaticRpc {
                method,
                generic_args,
                args,
            } => self.on_rpc(from, None, RpcKey { method, generic_args }, args, transport),
            ReplicationMessage::LoadSceneBegin { .. }
            | ReplicationMessage::RequestSnapshot { .. }
            | ReplicationMessage::SceneSnapshot { .. }
            | ReplicationMessage::SceneLoaded { .. } => {
                // handled before the phase gate
            }
        }
    }

    fn on_load_scene_begin(&mut self, from: C, scene: u64, handshake: u64) {
        if self.identity.is_host() {
            warn!("scene-load request from a peer dropped");
            return;
        }
        let Some(state) = self.connections.get_mut(&from) else {
            warn!("scene-load request on an unknown connection dropped");
            return;
        };
        state.scene = Some(scene);
        state.handshake = handshake;
        state.phase = HandshakePhase::MountingAssets;
        self.events
            .push(ReplicationEvent::AssetMountRequested { scene });
    }

    fn on_request_snapshot<W: WorldRef, T: Transport<C>>(
        &mut self,
        from: C,
        scene: u64,
        handshake: u64,
        world: &W,
        transport: &mut T,
    ) {
        if !self.identity.is_host() {
            warn!("snapshot request on a peer dropped");
            return;
        }
        let Some(state) = self.connections.get_mut(&from) else {
            warn!("snapshot request on an unknown connection dropped");
            return;
        };
        if state.phase != HandshakePhase::MountingAssets
            || state.scene != Some(scene)
            || state.handshake != handshake
        {
            warn!("snapshot request does not match the handshake in progress");
            return;
        }
        state.phase = HandshakePhase::Snapshot;
        let objects: Vec<ObjectCreate<C>> = self
            .object_order
            .iter()
            .filter_map(|id| self.objects.get(id))
            .map(|object| Self::describe(object, world))
            .collect();
        if let Some(state) = self.connections.get_mut(&from) {
            state.synced_objects = objects.iter().map(|create| create.id).collect();
        }
        self.send_reliable(
            &from,
            &ReplicationMessage::SceneSnapshot {
                scene,
                handshake,
                objects,
            },
            transport,
        );
    }

    fn on_scene_snapshot<W: WorldRef, T: Transport<C>>(
        &mut self,
        from: C,
        scene: u64,
        handshake: u64,
        objects: Vec<ObjectCreate<C>>,
        now: GameInstant,
        world: &W,
        transport: &mut T,
    ) {
        if self.identity.is_host() {
            warn!("scene snapshot sent to the host dropped");
            return;
        }
        let Some(state) = self.connections.get_mut(&from) else {
            warn!("scene snapshot on an unknown connection dropped");
            return;
        };
        if state.phase != HandshakePhase::AwaitingSnapshot
            || state.scene != Some(scene)
            || state.handshake != handshake
        {
            warn!("unexpected scene snapshot dropped");
            return;
        }
        state.phase = HandshakePhase::Snapshot;
        let synced: HashSet<ObjectId> = objects.iter().map(|create| create.id).collect();
        for create in objects {
            self.accept_remote_create(None, create, now);
        }
        if let Some(state) = self.connections.get_mut(&from) {
            state.phase = HandshakePhase::Connected;
            state.synced_objects = synced;
        }
        for object in self.objects.values_mut() {
            object.add_connection(from, now);
        }
        // confirmation first: the host only accepts creates from a
        // connection it has already moved to `Connected`
        self.send_reliable(
            &from,
            &ReplicationMessage::SceneLoaded { scene, handshake },
            transport,
        );
        self.announce_missed_creates(from, world, transport);
        self.events
            .push(ReplicationEvent::SceneSynchronized { scene });
    }

    fn on_scene_loaded<W: WorldRef, T: Transport<C>>(
        &mut self,
        from: C,
        scene: u64,
        handshake: u64,
        now: GameInstant,
        world: &W,
        transport: &mut T,
    ) {
        if !self.identity.is_host() {
            warn!("scene-loaded confirmation on a peer dropped");
            return;
        }
        let Some(state) = self.connections.get_mut(&from) else {
            warn!("scene-loaded confirmation on an unknown connection dropped");
            return;
        };
        if state.phase != HandshakePhase::Snapshot
            || state.scene != Some(scene)
            || state.handshake != handshake
        {
            warn!("scene-loaded confirmation does not match the handshake in progress");
            return;
        }
        state.phase = HandshakePhase::Connected;
        for object in self.objects.values_mut() {
            object.add_connection(from, now);
        }
        self.announce_missed_creates(from, world, transport);
        self.events
            .push(ReplicationEvent::PeerConnected { connection: from });
    }

    /// Announces objects the connection's scene snapshot predates. Runs on
    /// the transition to `Connected` on both ends: the host catches objects
    /// registered or relayed while the join was in flight, and a peer
    /// catches objects the application registered before its own join
    /// completed.
    fn announce_missed_creates<W: WorldRef, T: Transport<C>>(
        &mut self,
        connection: C,
        world: &W,
        transport: &mut T,
    ) {
        let synced = match self.connections.get_mut(&connection) {
            Some(state) => std::mem::take(&mut state.synced_objects),
            None => return,
        };
        for id in &self.object_order {
            if synced.contains(id) {
                continue;
            }
            let Some(object) = self.objects.get(id) else {
                continue;
            };
            debug!("announcing {:?} missed by joining connection", id);
            self.send_reliable(
                &connection,
                &ReplicationMessage::ObjectCreate(Self::describe(object, world)),
                transport,
            );
        }
    }

    /// Registers an object announced by a remote participant. On the host
    /// the description is sanitized first: creator and owner come from the
    /// transport identity, never from the payload. Returns the accepted
    /// (possibly sanitized) description for relaying.
    fn accept_remote_create(
        &mut self,
        from: Option<C>,
        mut create: ObjectCreate<C>,
        now: GameInstant,
    ) -> Option<ObjectCreate<C>> {
        if let Some(sender) = from.filter(|_| self.identity.is_host()) {
            create.creator = Some(sender);
            if let Some(owner) = create.owner {
                if owner != sender {
                    warn!("create naming a foreign owner clamped to its sender");
                    create.owner = Some(sender);
                }
            }
        }
        if self.objects.contains_key(&create.id) {
            warn!("duplicate create for {:?} dropped", create.id);
            return None;
        }

        let mut object = ReplicatedObject::new(create.id, create.creator);
        object.ownership = OwnershipState::with_owner(create.creator, create.owner);
        object.flags = create.flags;
        object.parent = create.parent;
        object.enabled = create.enabled;
        object.reconciler.set_version(create.version);
        for field in &create.field_table {
            object.register_field(field.slot, FieldConfig::default());
            if let Err(error) = object.fields.apply_trusted(field.slot, &field.bytes) {
                warn!("spawn-time field value rejected: {}", error);
            }
        }
        for (peer, state) in &self.connections {
            if state.phase != HandshakePhase::Connected {
                continue;
            }
            object.add_connection(*peer, now);
            // the author already holds every spawn-time value
            if from == Some(*peer) {
                for slot in object.fields.slots() {
                    object.reconciler.mark_satisfied(slot, *peer);
                }
            }
        }

        self.object_order.push(create.id);
        self.objects.insert(create.id, object);
        self.events.push(ReplicationEvent::ObjectSpawned {
            create: create.clone(),
        });
        Some(create)
    }

    /// Removes an object on a remote destroy or detach. Returns whether
    /// the sender was allowed to and the object existed.
    fn remove_remote_object(&mut self, from: C, id: ObjectId) -> bool {
        if !self.sender_may_mutate(from, id) {
            return false;
        }
        self.objects.remove(&id);
        self.object_order.retain(|other| *other != id);
        true
    }

    /// Lifecycle authority of a remote sender over an object: on the host,
    /// the sender must control the object; on a peer, the host (the only
    /// possible sender) is trusted, having validated the mutation already.
    fn sender_may_mutate(&self, from: C, id: ObjectId) -> bool {
        let Some(object) = self.objects.get(&id) else {
            debug!("message for unreplicated object {:?} dropped", id);
            return false;
        };
        if self.identity.is_host() && !object.ownership.connection_has_control(Some(&from)) {
            warn!("unauthorized lifecycle mutation of {:?} dropped", id);
            return false;
        }
        true
    }

    fn on_object_refresh<W: WorldMut, T: Transport<C>>(
        &mut self,
        from: C,
        id: ObjectId,
        parent: Option<ObjectId>,
        payload: Vec<u8>,
        field_table: Vec<FieldValue>,
        world: &mut W,
        transport: &mut T,
    ) {
        if !self.sender_may_mutate(from, id) {
            return;
        }
        let Some(object) = self.objects.get_mut(&id) else {
            return;
        };
        object.parent = parent;
        // a refresh is a full replication reset on both ends
        object.reconciler.bump_version();
        object.remote.reset();
        for field in &field_table {
            if !object.fields.contains(field.slot) {
                object.register_field(field.slot, FieldConfig::default());
            }
            match object.fields.apply_trusted(field.slot, &field.bytes) {
                Ok(InboundFieldResult::Applied) => {
                    if let Err(error) = world.apply_field(id, field.slot, &field.bytes) {
                        warn!("refresh field value rejected by the world: {}", error);
                    }
                }
                Ok(_) => {}
                Err(error) => warn!("refresh field value rejected: {}", error),
            }
        }
        if self.identity.is_host() {
            self.relay_reliable_except(
                from,
                &ReplicationMessage::ObjectRefresh {
                    id,
                    parent,
                    payload: payload.clone(),
                    field_table,
                },
                transport,
            );
        }
        self.events
            .push(ReplicationEvent::ObjectRefreshed { id, payload });
    }

    fn on_field_table_delta<W: WorldMut, T: Transport<C>>(
        &mut self,
        from: C,
        id: ObjectId,
        fields: Vec<FieldValue>,
        world: &mut W,
        transport: &mut T,
    ) {
        let is_host = self.identity.is_host();
        let identity = self.identity;
        let Some(object) = self.objects.get_mut(&id) else {
            debug!("reliable field delta for unreplicated object {:?} dropped", id);
            return;
        };
        if !is_host && object.ownership.participant_has_control(&identity) {
            debug!("reliable field delta for a locally controlled object dropped");
            return;
        }

        let mut relayed: Vec<FieldValue> = Vec::new();
        for field in &fields {
            if object.flags.suppresses(field.slot) {
                continue;
            }
            let result = if is_host {
                object
                    .fields
                    .apply_inbound(field.slot, &field.bytes, Some(&from), &object.ownership)
            } else {
                object.fields.apply_trusted(field.slot, &field.bytes)
            };
            match result {
                Ok(InboundFieldResult::Applied) => {
                    if let Err(error) = world.apply_field(id, field.slot, &field.bytes) {
                        warn!("field value rejected by the world: {}", error);
                        continue;
                    }
                    object.remote.record(field.slot, content_hash(&field.bytes));
                    if is_host {
                        relayed.push(field.clone());
                    }
                }
                Ok(_) => {}
                Err(error) => warn!("rejected reliable field write on {:?}: {}", id, error),
            }
        }

        if is_host && !relayed.is_empty() {
            self.relay_reliable_except(
                from,
                &ReplicationMessage::ObjectFieldTableDelta {
                    id,
                    fields: relayed,
                },
                transport,
            );
        }
    }

    fn on_delta_snapshot<W: WorldMut, T: Transport<C>>(
        &mut self,
        from: C,
        id: ObjectId,
        version: crate::types::SnapshotVersion,
        snapshot_id: crate::types::SnapshotId,
        entries: Vec<FieldValue>,
        world: &mut W,
        transport: &mut T,
    ) {
        let is_host = self.identity.is_host();
        let identity = self.identity;
        let Some(object) = self.objects.get_mut(&id) else {
            debug!("snapshot for unreplicated object {:?} dropped", id);
            return;
        };

        if is_host {
            if !object.ownership.connection_has_control(Some(&from)) {
                warn!("snapshot from a non-controlling connection dropped");
                return;
            }
        } else if object.ownership.participant_has_control(&identity) {
            debug!("snapshot for a locally controlled object dropped");
            return;
        }

        let local_version = object.reconciler.version();
        if sequence_less_than(version, local_version) {
            debug!("stale snapshot version for {:?} dropped", id);
            return;
        }
        if sequence_greater_than(version, local_version) {
            object.reconciler.set_version(version);
            object.remote.reset();
        }
        if !object.remote.accept(snapshot_id) {
            trace!("out-of-order snapshot {} for {:?} dropped", snapshot_id, id);
            return;
        }

        for entry in &entries {
            if object.flags.suppresses(entry.slot) {
                continue;
            }
            let hash = content_hash(&entry.bytes);
            if object.remote.slot_matches(entry.slot, hash) {
                continue;
            }
            let result = if is_host {
                object
                    .fields
                    .apply_inbound(entry.slot, &entry.bytes, Some(&from), &object.ownership)
            } else {
                object.fields.apply_trusted(entry.slot, &entry.bytes)
            };
            match result {
                Ok(InboundFieldResult::Applied) => {
                    if let Err(error) = world.apply_field(id, entry.slot, &entry.bytes) {
                        warn!("field value rejected by the world: {}", error);
                        continue;
                    }
                    object.remote.record(entry.slot, hash);
                    if is_host {
                        // relay through the normal snapshot machinery, but
                        // never echo the value back to its author
                        object.reconciler.note_slot_changed(entry.slot);
                        object.reconciler.mark_satisfied(entry.slot, from);
                    }
                }
                Ok(InboundFieldResult::Unchanged) => object.remote.record(entry.slot, hash),
                Ok(InboundFieldResult::UnknownSlot) => {}
                Err(error) => warn!("rejected field write on {:?}: {}", id, error),
            }
        }

        if let Some(bytes) =
            encode_or_log(&ReplicationMessage::<C>::DeltaSnapshotAck { id, snapshot_id })
        {
            transport.send_unreliable(&from, bytes);
        }
    }

    fn on_delta_snapshot_ack(&mut self, from: C, id: ObjectId, snapshot_id: crate::types::SnapshotId) {
        let Some(object) = self.objects.get_mut(&id) else {
            return;
        };
        let state = object
            .reconciler
            .handle_ack(&from, snapshot_id, &object.fields, object.flags);
        trace!("ack {} for {:?} from {:?}: {:?}", snapshot_id, id, from, state);
    }

    fn on_set_owner<T: Transport<C>>(
        &mut self,
        from: C,
        id: ObjectId,
        owner: Option<C>,
        transport: &mut T,
    ) {
        let is_host = self.identity.is_host();
        let Some(object) = self.objects.get_mut(&id) else {
            debug!("ownership change for unreplicated object {:?} dropped", id);
            return;
        };
        if is_host && !object.ownership.connection_has_control(Some(&from)) {
            warn!("unauthorized ownership change for {:?} dropped", id);
            return;
        }
        let previous = object.ownership.owner();
        if !object.apply_owner_change(owner) {
            return;
        }
        self.events.push(ReplicationEvent::OwnershipChanged {
            id,
            previous,
            owner,
        });
        if is_host {
            self.relay_reliable_except(from, &ReplicationMessage::SetOwner { id, owner }, transport);
        }
    }

    fn on_rpc<T: Transport<C>>(
        &mut self,
        from: C,
        target: Option<RpcTarget>,
        key: RpcKey,
        args: Vec<u8>,
        transport: &mut T,
    ) {
        let Some(config) = self.rpc.config(&key) else {
            let reason = RpcError::UnknownMethod { method: key.method }.to_string();
            self.kick(from, &reason, transport);
            return;
        };
        if !config.remote_authorized {
            let reason = RpcError::NotRemoteAuthorized { method: key.method }.to_string();
            self.kick(from, &reason, transport);
            return;
        }

        if !self.identity.is_host() {
            // the host already enforced the permission gate before relaying
            if config.mode == RpcMode::Host {
                warn!("host-routed rpc arrived at a peer and was dropped");
                return;
            }
            if let Err(error) = self.invoke_rpc(&key, target, Participant::Host, &args) {
                warn!("rpc invocation failed: {}", error);
            }
            return;
        }

        let caller = Participant::Peer(from);
        let ownership = target
            .and_then(|target| target.object())
            .and_then(|id| self.objects.get(&id))
            .map(|object| object.ownership.clone());
        if !config.permission.permits(&caller, ownership.as_ref()) {
            warn!("rpc call failed its permission gate and was dropped");
            return;
        }

        match config.mode {
            RpcMode::Host => {
                if let Err(error) = self.invoke_rpc(&key, target, caller, &args) {
                    warn!("rpc invocation failed: {}", error);
                }
            }
            RpcMode::Broadcast => {
                self.relay_reliable_except(from, &Self::rpc_message(&key, target, args.clone()), transport);
                if let Err(error) = self.invoke_rpc(&key, target, caller, &args) {
                    warn!("rpc invocation failed: {}", error);
                }
            }
            RpcMode::Owner => {
                let owner = ownership.as_ref().and_then(|ownership| ownership.owner());
                match owner {
                    // unowned: the host is the implicit owner
                    None => {
                        if let Err(error) = self.invoke_rpc(&key, target, caller, &args) {
                            warn!("rpc invocation failed: {}", error);
                        }
                    }
                    Some(destination) if destination == from => {
                        debug!("owner-routed rpc already at its owner dropped");
                    }
                    Some(destination) => {
                        self.send_reliable(
                            &destination,
                            &Self::rpc_message(&key, target, args),
                            transport,
                        );
                    }
                }
            }
        }
    }

    // plumbing -----------------------------------------------------------

    /// Authority of the local participant over an object for lifecycle
    /// operations: the host always, a peer only over objects it controls.
    fn authorize_local(&self, id: ObjectId) -> Result<(), RouterError> {
        let object = self
            .objects
            .get(&id)
            .ok_or(RouterError::UnknownObject { object: id })?;
        if self.identity.is_host() || object.ownership.participant_has_control(&self.identity) {
            Ok(())
        } else {
            Err(RouterError::NotAuthorized { object: id })
        }
    }

    fn kick<T: Transport<C>>(&mut self, connection: C, reason: &str, transport: &mut T) {
        warn!("kicking {:?}: {}", connection, reason);
        transport.disconnect(&connection, reason);
        self.connections.remove(&connection);
        for object in self.objects.values_mut() {
            object.remove_connection(&connection);
        }
        self.events.push(ReplicationEvent::PeerKicked {
            connection,
            reason: reason.to_string(),
        });
    }

    fn is_connected(&self, connection: &C) -> bool {
        self.connections
            .get(connection)
            .map(|state| state.phase == HandshakePhase::Connected)
            .unwrap_or(false)
    }

    fn connected_peers(&self) -> Vec<C> {
        self.connections
            .iter()
            .filter(|(_, state)| state.phase == HandshakePhase::Connected)
            .map(|(peer, _)| *peer)
            .collect()
    }

    /// A peer's single connection: its link to the host.
    fn host_link(&self) -> Option<C> {
        self.connections.keys().next().copied()
    }

    fn send_reliable<T: Transport<C>>(
        &self,
        connection: &C,
        message: &ReplicationMessage<C>,
        transport: &mut T,
    ) {
        if let Some(bytes) = encode_or_log(message) {
            transport.send_reliable(connection, bytes);
        }
    }

    fn send_reliable_to_connected<T: Transport<C>>(
        &self,
        message: &ReplicationMessage<C>,
        transport: &mut T,
    ) {
        let Some(bytes) = encode_or_log(message) else {
            return;
        };
        for (peer, state) in &self.connections {
            if state.phase == HandshakePhase::Connected {
                transport.send_reliable(peer, bytes.clone());
            }
        }
    }

    fn relay_reliable_except<T: Transport<C>>(
        &self,
        except: C,
        message: &ReplicationMessage<C>,
        transport: &mut T,
    ) {
        let Some(bytes) = encode_or_log(message) else {
            return;
        };
        for (peer, state) in &self.connections {
            if *peer != except && state.phase == HandshakePhase::Connected {
                transport.send_reliable(peer, bytes.clone());
            }
        }
    }

    /// Builds the spawn description for one object from its current
    /// replication state.
    fn describe<W: WorldRef>(object: &ReplicatedObject<C>, world: &W) -> ObjectCreate<C> {
        ObjectCreate {
            id: object.id(),
            creator: object.ownership.creator(),
            owner: object.ownership.owner(),
            parent: object.parent,
            transform: world.object_transform(object.id()),
            version: object.version(),
            flags: object.flags,
            field_table: Self::field_table(object),
            payload: world.object_payload(object.id()),
            enabled: object.enabled,
        }
    }

    fn field_table(object: &ReplicatedObject<C>) -> Vec<FieldValue> {
        object
            .fields
            .slots()
            .into_iter()
            .filter_map(|slot| {
                object.fields.cached_bytes(slot).map(|bytes| FieldValue {
                    slot,
                    bytes: bytes.to_vec(),
                })
            })
            .collect()
    }

    fn reliable_table(object: &ReplicatedObject<C>) -> Vec<FieldValue> {
        object
            .fields
            .slots()
            .into_iter()
            .filter(|slot| object.fields.class_of(*slot) == Some(FieldClass::Reliable))
            .filter_map(|slot| {
                object.fields.cached_bytes(slot).map(|bytes| FieldValue {
                    slot,
                    bytes: bytes.to_vec(),
                })
            })
            .collect()
    }
}

fn encode_or_log<C: Serialize>(message: &ReplicationMessage<C>) -> Option<Vec<u8>> {
    match message::encode(message) {
        Ok(bytes) => Some(bytes),
        Err(error) => {
            warn!("failed to encode outbound message: {}", error);
            None
        }
    }
}
