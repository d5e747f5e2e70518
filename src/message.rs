//! The wire message catalogue and its envelope codec.
//!
//! Field values stay opaque byte strings produced by the external
//! byte-codec; only the envelope around them is encoded here (CBOR).
//! Sender identity is supplied by the transport and never read from a
//! payload: authority is always re-derived from the transport identity
//! against live state.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::field::FieldSlot;
use crate::object::{ObjectId, SyncFlags};
use crate::rpc::{MethodId, RpcTarget};
use crate::types::{SnapshotId, SnapshotVersion};

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("failed to decode message: {0}")]
    Decode(#[from] ciborium::de::Error<std::io::Error>),
}

/// One slot's serialized value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub slot: FieldSlot,
    pub bytes: Vec<u8>,
}

/// What happens to the remote instances of a detached object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetachMode {
    /// Peers keep their local instance alive, merely unhooked from
    /// replication.
    Keep,
    /// Peers discard their local instance.
    Discard,
}

/// Spawn description for one object, also the element of batched creation
/// and scene snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: Serialize",
    deserialize = "C: serde::de::DeserializeOwned"
))]
pub struct ObjectCreate<C> {
    pub id: ObjectId,
    pub creator: Option<C>,
    pub owner: Option<C>,
    pub parent: Option<ObjectId>,
    /// Opaque serialized transform, codec-owned like every field payload.
    pub transform: Option<Vec<u8>>,
    pub version: SnapshotVersion,
    pub flags: SyncFlags,
    pub field_table: Vec<FieldValue>,
    pub payload: Vec<u8>,
    pub enabled: bool,
}

/// Every message the replication router produces or consumes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: Serialize",
    deserialize = "C: serde::de::DeserializeOwned"
))]
pub enum ReplicationMessage<C> {
    ObjectCreate(ObjectCreate<C>),
    ObjectCreateBatch {
        objects: Vec<ObjectCreate<C>>,
    },
    ObjectRefresh {
        id: ObjectId,
        parent: Option<ObjectId>,
        payload: Vec<u8>,
        field_table: Vec<FieldValue>,
    },
    ObjectRefreshDescendant {
        id: ObjectId,
        path: Vec<u32>,
        payload: Vec<u8>,
        field_table: Vec<FieldValue>,
    },
    ObjectDestroy {
        id: ObjectId,
    },
    ObjectDetach {
        id: ObjectId,
        mode: DetachMode,
    },
    ObjectDestroyComponent {
        id: ObjectId,
        component: u32,
    },
    ObjectDestroyDescendant {
        id: ObjectId,
        path: Vec<u32>,
    },
    /// Reliable-field side channel, guaranteed-once delivery.
    ObjectFieldTableDelta {
        id: ObjectId,
        fields: Vec<FieldValue>,
    },
    /// Unreliable per-tick delta.
    DeltaSnapshot {
        id: ObjectId,
        version: SnapshotVersion,
        snapshot_id: SnapshotId,
        entries: Vec<FieldValue>,
    },
    DeltaSnapshotAck {
        id: ObjectId,
        snapshot_id: SnapshotId,
    },
    SetOwner {
        id: ObjectId,
        owner: Option<C>,
    },
    InstanceRpc {
        target: RpcTarget,
        method: MethodId,
        generic_args: Vec<u32>,
        args: Vec<u8>,
    },
    StaticRpc {
        method: MethodId,
        generic_args: Vec<u32>,
        args: Vec<u8>,
    },
    LoadSceneBegin {
        scene: u64,
        handshake: u64,
    },
    RequestSnapshot {
        scene: u64,
        handshake: u64,
    },
    SceneSnapshot {
        scene: u64,
        handshake: u64,
        objects: Vec<ObjectCreate<C>>,
    },
    SceneLoaded {
        scene: u64,
        handshake: u64,
    },
}

pub fn encode<C: Serialize>(message: &ReplicationMessage<C>) -> Result<Vec<u8>, MessageError> {
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(message, &mut buffer)?;
    Ok(buffer)
}

pub fn decode<C: DeserializeOwned>(bytes: &[u8]) -> Result<ReplicationMessage<C>, MessageError> {
    Ok(ciborium::de::from_reader(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, FieldValue, ReplicationMessage};
    use crate::field::FieldSlot;
    use crate::object::ObjectId;

    #[test]
    fn envelope_round_trips() {
        let message: ReplicationMessage<u8> = ReplicationMessage::DeltaSnapshot {
            id: ObjectId::from_u64(9),
            version: 3,
            snapshot_id: 71,
            entries: vec![FieldValue {
                slot: FieldSlot::from_u32(20),
                bytes: vec![1, 2, 3],
            }],
        };
        let bytes = encode(&message).unwrap();
        let decoded: ReplicationMessage<u8> = decode(&bytes).unwrap();
        match decoded {
            ReplicationMessage::DeltaSnapshot {
                id,
                version,
                snapshot_id,
                entries,
            } => {
                assert_eq!(id, ObjectId::from_u64(9));
                assert_eq!(version, 3);
                assert_eq!(snapshot_id, 71);
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].bytes, vec![1, 2, 3]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(decode::<u8>(&[0xff, 0x00, 0x13]).is_err());
    }
}
