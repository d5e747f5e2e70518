//! Shared test harness: an in-memory transport that records traffic per
//! destination, a byte-map world, and helpers that pump messages between a
//! host router and its peers.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use replica_net::{
    FieldError, FieldSlot, GameInstant, ObjectId, Participant, ReplicationRouter, Transport,
    WorldMut, WorldRef,
};

/// The host as a peer sees it: a peer has exactly one connection.
pub const HOST_LINK: u8 = 0;

#[derive(Default)]
pub struct MockTransport {
    pub reliable: Vec<(u8, Vec<u8>)>,
    pub unreliable: Vec<(u8, Vec<u8>)>,
    pub disconnected: Vec<(u8, String)>,
}

impl MockTransport {
    /// Removes and returns everything queued for one destination, reliable
    /// traffic first.
    pub fn drain_for(&mut self, destination: u8) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let reliable = std::mem::take(&mut self.reliable);
        for (dest, bytes) in reliable {
            if dest == destination {
                out.push(bytes);
            } else {
                self.reliable.push((dest, bytes));
            }
        }
        let unreliable = std::mem::take(&mut self.unreliable);
        for (dest, bytes) in unreliable {
            if dest == destination {
                out.push(bytes);
            } else {
                self.unreliable.push((dest, bytes));
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.reliable.clear();
        self.unreliable.clear();
    }
}

impl Transport<u8> for MockTransport {
    fn send_reliable(&mut self, connection: &u8, payload: Vec<u8>) {
        self.reliable.push((*connection, payload));
    }

    fn send_unreliable(&mut self, connection: &u8, payload: Vec<u8>) {
        self.unreliable.push((*connection, payload));
    }

    fn disconnect(&mut self, connection: &u8, reason: &str) {
        self.disconnected.push((*connection, reason.to_string()));
    }
}

/// A world that stores serialized field values verbatim. Slots listed in
/// `rejected` fail to apply, for fault-isolation tests.
#[derive(Default)]
pub struct MockWorld {
    pub fields: HashMap<(ObjectId, FieldSlot), Vec<u8>>,
    pub payloads: HashMap<ObjectId, Vec<u8>>,
    pub rejected: HashSet<FieldSlot>,
}

impl WorldRef for MockWorld {
    fn field_bytes(&self, object: ObjectId, slot: FieldSlot) -> Option<Vec<u8>> {
        self.fields.get(&(object, slot)).cloned()
    }

    fn object_payload(&self, object: ObjectId) -> Vec<u8> {
        self.payloads.get(&object).cloned().unwrap_or_default()
    }
}

impl WorldMut for MockWorld {
    fn apply_field(
        &mut self,
        object: ObjectId,
        slot: FieldSlot,
        bytes: &[u8],
    ) -> Result<(), FieldError> {
        if self.rejected.contains(&slot) {
            return Err(FieldError::Decode {
                slot,
                reason: "rejected by test world".to_string(),
            });
        }
        self.fields.insert((object, slot), bytes.to_vec());
        Ok(())
    }
}

/// One participant: router, world, and transport wired together.
pub struct Endpoint {
    pub router: ReplicationRouter<u8>,
    pub world: MockWorld,
    pub transport: MockTransport,
}

impl Endpoint {
    pub fn host() -> Self {
        Self {
            router: ReplicationRouter::new(Participant::Host),
            world: MockWorld::default(),
            transport: MockTransport::default(),
        }
    }

    pub fn peer(id: u8) -> Self {
        Self {
            router: ReplicationRouter::new(Participant::Peer(id)),
            world: MockWorld::default(),
            transport: MockTransport::default(),
        }
    }

    pub fn tick(&mut self, now: GameInstant) {
        self.router.tick(now, &self.world, &mut self.transport);
    }
}

/// Delivers everything the host has queued for one peer.
pub fn deliver_to_peer(host: &mut Endpoint, peer: &mut Endpoint, peer_id: u8, now: GameInstant) {
    for bytes in host.transport.drain_for(peer_id) {
        peer.router
            .receive(HOST_LINK, &bytes, now, &mut peer.world, &mut peer.transport);
    }
}

/// Delivers everything a peer has queued for the host.
pub fn deliver_to_host(peer: &mut Endpoint, host: &mut Endpoint, peer_id: u8, now: GameInstant) {
    for bytes in peer.transport.drain_for(HOST_LINK) {
        host.router
            .receive(peer_id, &bytes, now, &mut host.world, &mut host.transport);
    }
}

/// One round trip in each direction.
pub fn exchange(host: &mut Endpoint, peer: &mut Endpoint, peer_id: u8, now: GameInstant) {
    deliver_to_peer(host, peer, peer_id, now);
    deliver_to_host(peer, host, peer_id, now);
}

/// Runs the full join handshake until the peer is connected.
pub fn connect(host: &mut Endpoint, peer: &mut Endpoint, peer_id: u8, scene: u64, now: GameInstant) {
    host.router.connection_opened(peer_id);
    peer.router.connection_opened(HOST_LINK);
    host.router
        .begin_handshake(peer_id, scene, &mut host.transport)
        .unwrap();
    deliver_to_peer(host, peer, peer_id, now);
    peer.router.asset_mount_complete(&mut peer.transport).unwrap();
    deliver_to_host(peer, host, peer_id, now);
    deliver_to_peer(host, peer, peer_id, now);
    deliver_to_host(peer, host, peer_id, now);
}
