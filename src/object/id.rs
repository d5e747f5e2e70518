use serde::{Deserialize, Serialize};

/// Stable identity of a replicated object. Opaque 64-bit value, never
/// reused for the lifetime of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

/// Hands out [`ObjectId`]s. Purely monotonic: destroyed ids are never
/// recycled, so a late message for a dead object can never alias a new one.
pub struct ObjectIdGenerator {
    next: u64,
}

impl ObjectIdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Starts the sequence at an arbitrary base. Participants that spawn
    /// objects concurrently carve out disjoint id ranges this way.
    pub fn starting_at(base: u64) -> Self {
        Self { next: base.max(1) }
    }

    pub fn generate(&mut self) -> ObjectId {
        let id = ObjectId(self.next);
        self.next += 1;
        id
    }
}

impl Default for ObjectIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
