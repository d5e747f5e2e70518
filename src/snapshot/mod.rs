//! Versioned delta-snapshot reconciliation: what each peer still needs,
//! which inbound snapshots are stale, and when a connection has converged.

mod error;
mod local_state;
mod reconciler;
mod remote_state;

pub use error::SnapshotError;
pub use local_state::LocalSnapshotState;
pub use reconciler::{AckState, OutboundSnapshot, SnapshotReconciler};
pub use remote_state::RemoteSnapshotState;
