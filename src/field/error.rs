use thiserror::Error;

use super::FieldSlot;

/// Errors surfaced by the field registry and the world-apply path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// A local write referenced a slot that was never registered. This is a
    /// local logic bug, not a network condition.
    #[error("field slot {slot:?} is not registered")]
    UnknownSlot { slot: FieldSlot },

    /// An inbound write failed the authority predicate for its sender.
    /// Logged and dropped by the caller; never propagated over the network.
    #[error("sender is not authorized to write field slot {slot:?}")]
    Unauthorized { slot: FieldSlot },

    /// The external byte-codec rejected the payload for one field. Caught
    /// per-field so one malformed value never blocks the rest of the batch.
    #[error("failed to decode field slot {slot:?}: {reason}")]
    Decode { slot: FieldSlot, reason: String },
}
