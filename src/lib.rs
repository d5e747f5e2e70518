//! # Replica Net
//! Authority-aware object replication for networked simulations: per-object
//! ownership, hash-based field change detection, versioned delta snapshots
//! with ack-driven convergence, permission-gated RPC dispatch, and a join
//! handshake — all independent of the transport and the simulation's own
//! object model, which plug in through the [`Transport`] and
//! [`WorldRef`]/[`WorldMut`] seams.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod error;
mod message;
mod sequence;
mod transport;
mod types;
mod world;

pub mod field;
pub mod object;
pub mod router;
pub mod rpc;
pub mod snapshot;

pub use error::ReplicationError;
pub use message::{decode, encode, DetachMode, FieldValue, MessageError, ObjectCreate, ReplicationMessage};
pub use sequence::{
    sequence_greater_than, sequence_greater_than_u32, sequence_less_than, sequence_less_than_u32,
};
pub use transport::Transport;
pub use types::{GameInstant, Participant, SnapshotId, SnapshotVersion};
pub use world::{WorldMut, WorldRef};

pub use field::{
    content_hash, FieldAuthority, FieldClass, FieldConfig, FieldError, FieldRegistry, FieldSlot,
    InboundFieldResult,
};
pub use object::{
    transform_slots, CullState, CullTransition, ObjectId, ObjectIdGenerator, OwnershipState,
    OwnershipStatus, ReplicatedObject, SyncFlags, VisibilityTest,
};
pub use router::{
    HandshakePhase, ObjectDescriptor, ReplicationEvent, ReplicationRouter, RouterConfig,
    RouterError,
};
pub use rpc::{
    MethodId, RpcConfig, RpcDispatcher, RpcError, RpcInvocation, RpcKey, RpcMode, RpcPermission,
    RpcTarget,
};
pub use snapshot::{
    AckState, OutboundSnapshot, RemoteSnapshotState, SnapshotError, SnapshotReconciler,
};
