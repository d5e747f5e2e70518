use crate::message::{DetachMode, ObjectCreate};
use crate::object::ObjectId;

/// Everything the router wants the application to react to, drained with
/// [`crate::router::ReplicationRouter::take_events`] after each tick or
/// receive call.
#[derive(Debug)]
pub enum ReplicationEvent<C> {
    /// A remote participant spawned an object. The application should
    /// instantiate it from the carried description, then declare its field
    /// schema with `configure_field` as needed.
    ObjectSpawned { create: ObjectCreate<C> },
    ObjectDestroyed { id: ObjectId },
    /// The object left replication but, depending on the mode, may live on
    /// locally.
    ObjectDetached { id: ObjectId, mode: DetachMode },
    ComponentDestroyed { id: ObjectId, component: u32 },
    DescendantDestroyed { id: ObjectId, path: Vec<u32> },
    /// The object's structure changed; re-initialize from the payload.
    ObjectRefreshed { id: ObjectId, payload: Vec<u8> },
    DescendantRefreshed {
        id: ObjectId,
        path: Vec<u32>,
        payload: Vec<u8>,
    },
    /// Fired exactly once per actual owner change, local or remote.
    OwnershipChanged {
        id: ObjectId,
        previous: Option<C>,
        owner: Option<C>,
    },
    /// Peer side: the host asked us to load a scene. Mount assets, then
    /// call `asset_mount_complete`.
    AssetMountRequested { scene: u64 },
    /// Peer side: the scene snapshot is fully instantiated and the host
    /// confirmed; replication is live.
    SceneSynchronized { scene: u64 },
    /// Host side: a connection finished its join handshake.
    PeerConnected { connection: C },
    PeerDisconnected { connection: C },
    /// The connection sent something that only forged traffic can produce
    /// and was dropped.
    PeerKicked { connection: C, reason: String },
}
