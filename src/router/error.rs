use thiserror::Error;

use crate::field::FieldError;
use crate::object::ObjectId;

/// Local misuse of the router API. Inbound network faults are never
/// surfaced here; they are logged and contained per message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("object {object:?} is already replicated")]
    DuplicateObject { object: ObjectId },

    #[error("object {object:?} is not replicated")]
    UnknownObject { object: ObjectId },

    #[error("connection is not known to the router")]
    UnknownConnection,

    #[error("local participant may not perform this operation on object {object:?}")]
    NotAuthorized { object: ObjectId },

    #[error("operation is only valid on the host")]
    HostOnly,

    #[error("operation is only valid on a peer")]
    PeerOnly,

    #[error("connection is in the wrong handshake phase")]
    UnexpectedPhase,

    #[error("end_spawn_batch without a matching begin")]
    SpawnBatchUnderflow,

    #[error("end_suppress without a matching begin")]
    SuppressScopeUnderflow,

    #[error(transparent)]
    Field(#[from] FieldError),
}
