use crate::object::ObjectId;
use crate::types::GameInstant;

/// Pluggable visibility test, consulted each tick for every
/// (object, connection) pair unless the object is marked always-transmit.
/// Implementations are typically bounding-volume checks against the
/// connection's viewpoint, but any predicate works.
pub trait VisibilityTest<C> {
    fn is_visible(&self, object: ObjectId, connection: &C) -> bool;
}

/// Transition produced by [`CullState::update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CullTransition {
    /// The object has been continuously invisible past the grace delay and
    /// replication to this connection stops.
    Culled,
    /// The object became visible again. The caller must clear the
    /// connection's snapshot-ack state so full state is resent rather than
    /// a stale delta.
    Revealed,
}

/// Per-(object, connection) culling record. An object only flips to culled
/// after being continuously invisible for the grace delay, which absorbs
/// visibility flicker; it flips back on the first positive test.
#[derive(Clone, Copy, Debug)]
pub struct CullState {
    culled: bool,
    last_visible_at: GameInstant,
}

impl CullState {
    pub fn new(now: GameInstant) -> Self {
        Self {
            culled: false,
            last_visible_at: now,
        }
    }

    pub fn is_culled(&self) -> bool {
        self.culled
    }

    pub fn update(
        &mut self,
        visible: bool,
        now: GameInstant,
        grace_millis: u32,
    ) -> Option<CullTransition> {
        if visible {
            self.last_visible_at = now;
            if self.culled {
                self.culled = false;
                return Some(CullTransition::Revealed);
            }
            return None;
        }

        if !self.culled && now.millis_since(&self.last_visible_at) >= grace_millis {
            self.culled = true;
            return Some(CullTransition::Culled);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::{CullState, CullTransition};
    use crate::types::GameInstant;

    const GRACE: u32 = 2000;

    fn at(millis: u32) -> GameInstant {
        GameInstant::from_millis(millis)
    }

    #[test]
    fn stays_visible_within_grace() {
        let mut state = CullState::new(at(0));
        assert_eq!(state.update(false, at(500), GRACE), None);
        assert_eq!(state.update(false, at(1999), GRACE), None);
        assert!(!state.is_culled());
    }

    #[test]
    fn culls_after_grace_elapses() {
        let mut state = CullState::new(at(0));
        assert_eq!(state.update(false, at(2000), GRACE), Some(CullTransition::Culled));
        assert!(state.is_culled());
        // already culled, no repeat transition
        assert_eq!(state.update(false, at(3000), GRACE), None);
    }

    #[test]
    fn flicker_resets_the_grace_window() {
        let mut state = CullState::new(at(0));
        assert_eq!(state.update(false, at(1500), GRACE), None);
        assert_eq!(state.update(true, at(1600), GRACE), None);
        assert_eq!(state.update(false, at(3000), GRACE), None);
        assert_eq!(state.update(false, at(3600), GRACE), Some(CullTransition::Culled));
    }

    #[test]
    fn reveal_is_immediate() {
        let mut state = CullState::new(at(0));
        state.update(false, at(2000), GRACE);
        assert!(state.is_culled());
        assert_eq!(state.update(true, at(2001), GRACE), Some(CullTransition::Revealed));
        assert!(!state.is_culled());
    }
}
