use std::collections::HashSet;

use crate::object::ObjectId;

/// Join-handshake progression for one connection. Replication traffic is
/// only exchanged once a connection reaches `Connected`; everything else
/// it sends or is sent is dropped on the floor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Transport established, no scene negotiated yet.
    Connecting,
    /// The peer was told which scene to load and is mounting assets. The
    /// router suspends here until the application reports completion.
    MountingAssets,
    /// Assets mounted; the peer asked for the scene snapshot.
    AwaitingSnapshot,
    /// The snapshot was sent and the peer is instantiating it.
    Snapshot,
    /// Fully joined; replication flows.
    Connected,
}

/// Per-connection handshake record.
#[derive(Clone, Debug)]
pub struct ConnectionState {
    pub phase: HandshakePhase,
    /// Scene identity negotiated at handshake start.
    pub scene: Option<u64>,
    /// Random token echoed through the handshake so a stale or forged
    /// snapshot request cannot complete someone else's join.
    pub handshake: u64,
    /// Objects covered by the scene snapshot exchanged over this
    /// connection. Objects registered after the snapshot was built are
    /// announced separately when the handshake completes, then the set is
    /// dropped.
    pub synced_objects: HashSet<ObjectId>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            phase: HandshakePhase::Connecting,
            scene: None,
            handshake: 0,
            synced_objects: HashSet::new(),
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}
