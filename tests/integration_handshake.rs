//! Integration tests for the join handshake and object lifecycle: phase
//! progression, gating of early replication traffic, batched and
//! suppressed spawns, detach, and clean mid-handshake departure.

mod common;

use common::{connect, deliver_to_host, deliver_to_peer, Endpoint, HOST_LINK};

use replica_net::{
    decode, encode, DetachMode, FieldConfig, FieldSlot, GameInstant, HandshakePhase,
    ObjectDescriptor, ObjectId, ReplicationEvent, ReplicationMessage, RouterError,
};

const PEER: u8 = 1;
const SLOT: FieldSlot = FieldSlot::from_u32(20);
const SCENE: u64 = 7;

fn at(millis: u32) -> GameInstant {
    GameInstant::from_millis(millis)
}

fn spawn_host_object(host: &mut Endpoint) -> ObjectId {
    let id = host.router.reserve_object_id();
    host.world.fields.insert((id, SLOT), vec![1]);
    let descriptor = ObjectDescriptor {
        fields: vec![(SLOT, FieldConfig::default())],
        ..ObjectDescriptor::default()
    };
    host.router
        .register_object(id, descriptor, at(0), &host.world, &mut host.transport)
        .unwrap();
    id
}

#[test]
fn join_handshake_progresses_through_every_phase() {
    let mut host = Endpoint::host();
    let mut peer = Endpoint::peer(PEER);
    let id = spawn_host_object(&mut host);

    host.router.connection_opened(PEER);
    peer.router.connection_opened(HOST_LINK);
    assert_eq!(
        host.router.connection_phase(&PEER),
        Some(HandshakePhase::Connecting)
    );

    host.router
        .begin_handshake(PEER, SCENE, &mut host.transport)
        .unwrap();
    assert_eq!(
        host.router.connection_phase(&PEER),
        Some(HandshakePhase::MountingAssets)
    );

    deliver_to_peer(&mut host, &mut peer, PEER, at(0));
    assert_eq!(
        peer.router.connection_phase(&HOST_LINK),
        Some(HandshakePhase::MountingAssets)
    );
    assert!(peer.router.take_events().iter().any(|event| matches!(
        event,
        ReplicationEvent::AssetMountRequested { scene } if *scene == SCENE
    )));

    // the handshake suspends until the application reports mounted assets
    peer.router.asset_mount_complete(&mut peer.transport).unwrap();
    assert_eq!(
        peer.router.connection_phase(&HOST_LINK),
        Some(HandshakePhase::AwaitingSnapshot)
    );

    deliver_to_host(&mut peer, &mut host, PEER, at(0));
    assert_eq!(
        host.router.connection_phase(&PEER),
        Some(HandshakePhase::Snapshot)
    );

    deliver_to_peer(&mut host, &mut peer, PEER, at(0));
    assert_eq!(
        peer.router.connection_phase(&HOST_LINK),
        Some(HandshakePhase::Connected)
    );
    let peer_events = peer.router.take_events();
    assert!(peer_events.iter().any(|event| matches!(
        event,
        ReplicationEvent::ObjectSpawned { create } if create.id == id
    )));
    assert!(peer_events.iter().any(|event| matches!(
        event,
        ReplicationEvent::SceneSynchronized { scene } if *scene == SCENE
    )));
    assert!(peer.router.contains_object(id));

    deliver_to_host(&mut peer, &mut host, PEER, at(0));
    assert_eq!(
        host.router.connection_phase(&PEER),
        Some(HandshakePhase::Connected)
    );
    assert!(host.router.take_events().iter().any(|event| matches!(
        event,
        ReplicationEvent::PeerConnected { connection } if *connection == PEER
    )));
}

#[test]
fn spawn_during_the_join_window_is_announced_on_completion() {
    let mut host = Endpoint::host();
    let mut peer = Endpoint::peer(PEER);
    spawn_host_object(&mut host);

    host.router.connection_opened(PEER);
    peer.router.connection_opened(HOST_LINK);
    host.router
        .begin_handshake(PEER, SCENE, &mut host.transport)
        .unwrap();
    deliver_to_peer(&mut host, &mut peer, PEER, at(0));
    peer.router.asset_mount_complete(&mut peer.transport).unwrap();
    deliver_to_host(&mut peer, &mut host, PEER, at(0));

    // the scene snapshot is already built; this spawn lands in the window
    // before the peer confirms the load
    let late = spawn_host_object(&mut host);

    deliver_to_peer(&mut host, &mut peer, PEER, at(0));
    deliver_to_host(&mut peer, &mut host, PEER, at(0));
    assert_eq!(
        host.router.connection_phase(&PEER),
        Some(HandshakePhase::Connected)
    );
    deliver_to_peer(&mut host, &mut peer, PEER, at(0));
    assert!(
        peer.router.contains_object(late),
        "an object spawned mid-join must still reach the peer"
    );

    // and its snapshot traffic applies, rather than being dropped as unknown
    host.world.fields.insert((late, SLOT), vec![9]);
    host.router.mark_field_changed(late, SLOT).unwrap();
    host.tick(at(100));
    deliver_to_peer(&mut host, &mut peer, PEER, at(100));
    assert_eq!(peer.world.fields.get(&(late, SLOT)), Some(&vec![9]));
}

#[test]
fn peer_spawn_before_joining_reaches_the_host() {
    let mut host = Endpoint::host();
    let mut peer = Endpoint::peer(PEER);

    peer.router.set_id_base(1000);
    let id = peer.router.reserve_object_id();
    peer.world.fields.insert((id, SLOT), vec![4]);
    let descriptor = ObjectDescriptor {
        owner: Some(PEER),
        fields: vec![(SLOT, FieldConfig::default())],
        ..ObjectDescriptor::default()
    };
    peer.router
        .register_object(id, descriptor, at(0), &peer.world, &mut peer.transport)
        .unwrap();
    assert!(
        peer.transport.drain_for(HOST_LINK).is_empty(),
        "nothing is announced before the join completes"
    );

    connect(&mut host, &mut peer, PEER, SCENE, at(0));

    assert!(host.router.contains_object(id));
    let object = host.router.object(id).unwrap();
    assert_eq!(object.ownership.owner(), Some(PEER));
}

#[test]
fn replication_traffic_is_gated_until_connected() {
    let mut host = Endpoint::host();
    let id = spawn_host_object(&mut host);
    host.router.connection_opened(PEER);
    host.router
        .begin_handshake(PEER, SCENE, &mut host.transport)
        .unwrap();

    // mid-handshake, a destroy from the joining connection is ignored
    let early = ReplicationMessage::<u8>::ObjectDestroy { id };
    host.router.receive(
        PEER,
        &encode(&early).unwrap(),
        at(50),
        &mut host.world,
        &mut host.transport,
    );
    assert!(host.router.contains_object(id));
}

#[test]
fn snapshot_request_with_wrong_token_is_ignored() {
    let mut host = Endpoint::host();
    spawn_host_object(&mut host);
    host.router.connection_opened(PEER);
    host.router
        .begin_handshake(PEER, SCENE, &mut host.transport)
        .unwrap();
    host.transport.clear();

    let forged = ReplicationMessage::<u8>::RequestSnapshot {
        scene: SCENE,
        handshake: 0xdead_beef,
    };
    host.router.receive(
        PEER,
        &encode(&forged).unwrap(),
        at(50),
        &mut host.world,
        &mut host.transport,
    );
    assert_eq!(
        host.router.connection_phase(&PEER),
        Some(HandshakePhase::MountingAssets),
        "a token mismatch must not advance the handshake"
    );
    assert!(host.transport.drain_for(PEER).is_empty());
}

#[test]
fn mid_handshake_departure_is_clean() {
    let mut host = Endpoint::host();
    let mut peer = Endpoint::peer(PEER);
    spawn_host_object(&mut host);
    host.router.connection_opened(PEER);
    peer.router.connection_opened(HOST_LINK);
    host.router
        .begin_handshake(PEER, SCENE, &mut host.transport)
        .unwrap();
    deliver_to_peer(&mut host, &mut peer, PEER, at(0));

    host.router.connection_closed(PEER, &mut host.transport);
    assert!(host.router.connection_phase(&PEER).is_none());
    assert!(host.router.take_events().iter().any(|event| matches!(
        event,
        ReplicationEvent::PeerDisconnected { connection } if *connection == PEER
    )));

    // the world keeps ticking without the half-joined connection
    host.tick(at(100));
}

#[test]
fn batched_spawns_arrive_as_one_message() {
    let mut host = Endpoint::host();
    let mut peer = Endpoint::peer(PEER);
    connect(&mut host, &mut peer, PEER, SCENE, at(0));

    host.router.begin_spawn_batch();
    let first = spawn_host_object(&mut host);
    let second = spawn_host_object(&mut host);
    assert!(
        host.transport.drain_for(PEER).is_empty(),
        "creations are held back while the batch is open"
    );

    host.router.end_spawn_batch(&mut host.transport).unwrap();
    assert_eq!(host.transport.reliable.len(), 1);
    match decode::<u8>(&host.transport.reliable[0].1).unwrap() {
        ReplicationMessage::ObjectCreateBatch { objects } => {
            assert_eq!(objects.len(), 2);
        }
        other => panic!("expected a batched create, got {:?}", other),
    }

    deliver_to_peer(&mut host, &mut peer, PEER, at(0));
    assert!(peer.router.contains_object(first));
    assert!(peer.router.contains_object(second));
}

#[test]
fn suppress_scope_swallows_lifecycle_announcements() {
    let mut host = Endpoint::host();
    let mut peer = Endpoint::peer(PEER);
    connect(&mut host, &mut peer, PEER, SCENE, at(0));

    host.router.begin_suppress();
    let id = spawn_host_object(&mut host);
    assert!(host.transport.drain_for(PEER).is_empty());

    host.router.destroy_object(id, &mut host.transport).unwrap();
    assert!(host.transport.drain_for(PEER).is_empty());
    host.router.end_suppress().unwrap();

    assert_eq!(
        host.router.end_suppress(),
        Err(RouterError::SuppressScopeUnderflow)
    );
    assert_eq!(
        host.router.end_spawn_batch(&mut host.transport),
        Err(RouterError::SpawnBatchUnderflow)
    );
}

#[test]
fn duplicate_registration_is_refused() {
    let mut host = Endpoint::host();
    let id = spawn_host_object(&mut host);
    let result = host.router.register_object(
        id,
        ObjectDescriptor::default(),
        at(0),
        &host.world,
        &mut host.transport,
    );
    assert_eq!(result, Err(RouterError::DuplicateObject { object: id }));
}

#[test]
fn peer_created_object_replicates_to_the_host() {
    let mut host = Endpoint::host();
    let mut peer = Endpoint::peer(PEER);
    connect(&mut host, &mut peer, PEER, SCENE, at(0));
    host.router.take_events();

    // disjoint id range so peer spawns cannot alias host spawns
    peer.router.set_id_base(1000);
    let id = peer.router.reserve_object_id();
    peer.world.fields.insert((id, SLOT), vec![4]);
    let descriptor = ObjectDescriptor {
        owner: Some(PEER),
        fields: vec![(SLOT, FieldConfig::default())],
        ..ObjectDescriptor::default()
    };
    peer.router
        .register_object(id, descriptor, at(0), &peer.world, &mut peer.transport)
        .unwrap();
    deliver_to_host(&mut peer, &mut host, PEER, at(0));

    assert!(host.router.contains_object(id));
    let object = host.router.object(id).unwrap();
    assert_eq!(object.ownership.creator(), Some(PEER));
    assert_eq!(object.ownership.owner(), Some(PEER));
    assert!(host.router.take_events().iter().any(|event| matches!(
        event,
        ReplicationEvent::ObjectSpawned { create } if create.id == id
    )));

    // the owner's authored values flow to the host
    peer.world.fields.insert((id, SLOT), vec![5]);
    peer.router.mark_field_changed(id, SLOT).unwrap();
    peer.tick(at(100));
    deliver_to_host(&mut peer, &mut host, PEER, at(100));
    assert_eq!(host.world.fields.get(&(id, SLOT)), Some(&vec![5]));
}

#[test]
fn detach_keeps_the_remote_instance_out_of_replication() {
    let mut host = Endpoint::host();
    let mut peer = Endpoint::peer(PEER);
    let id = spawn_host_object(&mut host);
    connect(&mut host, &mut peer, PEER, SCENE, at(0));
    peer.router.take_events();

    host.router
        .detach_object(id, DetachMode::Keep, &mut host.transport)
        .unwrap();
    assert!(!host.router.contains_object(id));

    deliver_to_peer(&mut host, &mut peer, PEER, at(0));
    assert!(!peer.router.contains_object(id));
    assert!(peer.router.take_events().iter().any(|event| matches!(
        event,
        ReplicationEvent::ObjectDetached { id: object, mode: DetachMode::Keep } if *object == id
    )));
}
