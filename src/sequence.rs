//! Wrapping comparison for `u16` snapshot versions and `u32` snapshot ids.
//!
//! Both counters wrap, so ordering is decided by which half of the number
//! circle the two values fall in, the standard sequence-number comparison
//! used by tick/packet counters.

/// Returns whether a wrapping version is newer than another.
/// `sequence_greater_than(2, 1)` is true, `sequence_greater_than(1, 2)` and
/// `sequence_greater_than(1, 1)` are false.
pub fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    ((s1 > s2) && (s1 - s2 <= 32768)) || ((s1 < s2) && (s2 - s1 > 32768))
}

/// Returns whether a wrapping version is older than another.
pub fn sequence_less_than(s1: u16, s2: u16) -> bool {
    sequence_greater_than(s2, s1)
}

/// The same comparison over the `u32` snapshot-id space.
pub fn sequence_greater_than_u32(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= u32::MAX / 2)) || ((s1 < s2) && (s2 - s1 > u32::MAX / 2))
}

pub fn sequence_less_than_u32(s1: u32, s2: u32) -> bool {
    sequence_greater_than_u32(s2, s1)
}
