/// Per-object snapshot counter used for ack correlation. Wrapping `u32`,
/// incremented once per produced snapshot and compared with the wrapping
/// functions in [`crate::sequence`].
pub type SnapshotId = u32;

/// Wrapping `u16` object version, bumped whenever an object's replication
/// state is fully reset (ownership change, refresh). Compared with the
/// wrapping functions in [`crate::sequence`].
pub type SnapshotVersion = u16;

/// The local participant's identity: either the authoritative host, or a
/// remote peer known to the host by its connection identity `C`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Participant<C> {
    Host,
    Peer(C),
}

impl<C: Copy + Eq> Participant<C> {
    pub fn is_host(&self) -> bool {
        matches!(self, Participant::Host)
    }

    /// The connection identity of this participant, or `None` for the host.
    pub fn connection(&self) -> Option<C> {
        match self {
            Participant::Host => None,
            Participant::Peer(connection) => Some(*connection),
        }
    }
}

/// Millisecond timestamp on the simulation clock. Supplied by the caller on
/// every tick so tests can drive time explicitly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameInstant {
    millis: u32,
}

impl GameInstant {
    pub fn from_millis(millis: u32) -> Self {
        Self { millis }
    }

    pub fn as_millis(&self) -> u32 {
        self.millis
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero if `earlier`
    /// is actually later.
    pub fn millis_since(&self, earlier: &GameInstant) -> u32 {
        self.millis.saturating_sub(earlier.millis)
    }
}
