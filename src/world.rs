//! Trait seams to the external object model. The core decides *what* must
//! be synchronized and *who* may write it; reading current field bytes and
//! applying received ones is the world's job, through its own byte-codec.

use crate::field::{FieldError, FieldSlot};
use crate::object::ObjectId;

/// Read access to the simulation world.
pub trait WorldRef {
    /// The current serialized value of one field, or `None` if the object
    /// or field does not exist locally.
    fn field_bytes(&self, object: ObjectId, slot: FieldSlot) -> Option<Vec<u8>>;

    /// Opaque spawn payload describing the object to remote instantiators
    /// (prefab reference, construction arguments). Used when building
    /// create and scene-snapshot messages.
    fn object_payload(&self, object: ObjectId) -> Vec<u8>;

    /// Serialized whole transform carried on spawn descriptions, so a
    /// remote instantiator can place the object before the first snapshot
    /// lands. `None` for worlds that replicate transforms purely through
    /// the reserved field slots.
    fn object_transform(&self, object: ObjectId) -> Option<Vec<u8>> {
        let _ = object;
        None
    }
}

/// Mutable access: applies a received field value into the world. Decode
/// failures are reported per field and never abort the surrounding batch.
pub trait WorldMut: WorldRef {
    fn apply_field(&mut self, object: ObjectId, slot: FieldSlot, bytes: &[u8])
        -> Result<(), FieldError>;
}
