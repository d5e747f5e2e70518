use serde::{Deserialize, Serialize};

use crate::field::FieldSlot;

/// Reserved slots for the built-in transform fields. User fields start at
/// [`transform_slots::FIRST_USER_SLOT`].
pub mod transform_slots {
    use crate::field::FieldSlot;

    pub const POSITION: FieldSlot = FieldSlot::from_u32(0);
    pub const ROTATION: FieldSlot = FieldSlot::from_u32(1);
    pub const SCALE: FieldSlot = FieldSlot::from_u32(2);

    pub const FIRST_USER_SLOT: u32 = 16;
}

/// Per-object bitset disabling position/rotation/scale/interpolation sync
/// independently. A suppressed slot is excluded from outbound snapshots and
/// ignored on inbound application, so both ends stay symmetric.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFlags(u8);

impl SyncFlags {
    pub const NO_POSITION_SYNC: SyncFlags = SyncFlags(1 << 0);
    pub const NO_ROTATION_SYNC: SyncFlags = SyncFlags(1 << 1);
    pub const NO_SCALE_SYNC: SyncFlags = SyncFlags(1 << 2);
    pub const NO_INTERPOLATION: SyncFlags = SyncFlags(1 << 3);

    pub fn empty() -> Self {
        SyncFlags(0)
    }

    pub fn contains(&self, other: SyncFlags) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn insert(&mut self, other: SyncFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: SyncFlags) {
        self.0 &= !other.0;
    }

    pub fn union(self, other: SyncFlags) -> SyncFlags {
        SyncFlags(self.0 | other.0)
    }

    /// Whether this flag set suppresses replication of the given slot.
    /// Only the reserved transform slots are ever suppressed; user slots
    /// always pass.
    pub fn suppresses(&self, slot: FieldSlot) -> bool {
        if slot == transform_slots::POSITION {
            self.contains(SyncFlags::NO_POSITION_SYNC)
        } else if slot == transform_slots::ROTATION {
            self.contains(SyncFlags::NO_ROTATION_SYNC)
        } else if slot == transform_slots::SCALE {
            self.contains(SyncFlags::NO_SCALE_SYNC)
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{transform_slots, SyncFlags};
    use crate::field::FieldSlot;

    #[test]
    fn position_flag_only_suppresses_position() {
        let flags = SyncFlags::NO_POSITION_SYNC;
        assert!(flags.suppresses(transform_slots::POSITION));
        assert!(!flags.suppresses(transform_slots::ROTATION));
        assert!(!flags.suppresses(transform_slots::SCALE));
        assert!(!flags.suppresses(FieldSlot::from_u32(40)));
    }

    #[test]
    fn insert_and_remove() {
        let mut flags = SyncFlags::empty();
        flags.insert(SyncFlags::NO_ROTATION_SYNC);
        assert!(flags.contains(SyncFlags::NO_ROTATION_SYNC));
        flags.remove(SyncFlags::NO_ROTATION_SYNC);
        assert_eq!(flags, SyncFlags::empty());
    }
}
