use thiserror::Error;

use crate::field::FieldError;
use crate::message::MessageError;
use crate::router::RouterError;
use crate::rpc::RpcError;
use crate::snapshot::SnapshotError;

/// Umbrella error for callers that funnel every subsystem through one
/// result type.
#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Message(#[from] MessageError),
}
