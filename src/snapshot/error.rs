use thiserror::Error;

use crate::object::ObjectId;
use crate::types::{SnapshotId, SnapshotVersion};

/// Rejection reasons on the snapshot reconciliation paths. These are
/// expected network conditions: callers log them and drop the offending
/// snapshot, relying on the next tick to self-heal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// Inbound snapshot was produced before our current version for the
    /// object (e.g. before an ownership handoff reset it).
    #[error("stale snapshot for object {object:?}: got version {got}, have {have}")]
    StaleVersion {
        object: ObjectId,
        got: SnapshotVersion,
        have: SnapshotVersion,
    },

    /// Inbound snapshot id is not newer than the last applied one.
    #[error("out-of-order snapshot {id} for object {object:?}")]
    OutOfOrder { object: ObjectId, id: SnapshotId },
}
