//! Per-object replication state: identity, ownership, sync flags, and
//! visibility culling.

mod culling;
mod flags;
mod id;
mod ownership;
mod replicated_object;

pub use culling::{CullState, CullTransition, VisibilityTest};
pub use flags::{transform_slots, SyncFlags};
pub use id::{ObjectId, ObjectIdGenerator};
pub use ownership::{OwnershipState, OwnershipStatus};
pub use replicated_object::ReplicatedObject;
