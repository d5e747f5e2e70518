use crate::types::Participant;

/// Derived view of the local participant's relationship to an object.
/// Never stored; always recomputed from `(owner, local identity)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwnershipStatus {
    /// The local participant authors this object's state.
    Owner,
    /// The local participant receives, but does not author, this object.
    Proxy,
    /// No peer owns the object; the host has implicit authority.
    Unowned,
}

/// Per-object record of who spawned the object and who currently authors
/// it. `owner == None` means unowned, which gives the host implicit
/// control. This is the single source of truth every other component
/// consults before accepting a mutation.
#[derive(Clone, Debug)]
pub struct OwnershipState<C> {
    creator: Option<C>,
    owner: Option<C>,
}

impl<C: Copy + Eq> OwnershipState<C> {
    pub fn new(creator: Option<C>) -> Self {
        Self {
            creator,
            owner: None,
        }
    }

    pub fn with_owner(creator: Option<C>, owner: Option<C>) -> Self {
        Self { creator, owner }
    }

    pub fn creator(&self) -> Option<C> {
        self.creator
    }

    pub fn owner(&self) -> Option<C> {
        self.owner
    }

    pub fn is_unowned(&self) -> bool {
        self.owner.is_none()
    }

    /// Reassigns the owner. Returns `true` only when the value actually
    /// changed, so callers fire their ownership-changed hook exactly once
    /// per change.
    pub fn set_owner(&mut self, new_owner: Option<C>) -> bool {
        if self.owner == new_owner {
            return false;
        }
        self.owner = new_owner;
        true
    }

    /// The derived Owner/Proxy/Unowned status for `local`.
    pub fn status(&self, local: &Participant<C>) -> OwnershipStatus {
        match self.owner {
            None => OwnershipStatus::Unowned,
            Some(owner) => {
                if local.connection() == Some(owner) {
                    OwnershipStatus::Owner
                } else {
                    OwnershipStatus::Proxy
                }
            }
        }
    }

    /// True iff the object is unowned and `connection` is the host
    /// (`None`), or `connection` equals the current owner.
    pub fn connection_has_control(&self, connection: Option<&C>) -> bool {
        match (&self.owner, connection) {
            (None, None) => true,
            (Some(owner), Some(connection)) => owner == connection,
            _ => false,
        }
    }

    pub fn participant_has_control(&self, participant: &Participant<C>) -> bool {
        self.connection_has_control(participant.connection().as_ref())
    }
}
