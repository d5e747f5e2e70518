use serde::{Deserialize, Serialize};

use crate::object::{ObjectId, OwnershipState};
use crate::types::Participant;

/// Stable numeric identity of a remotely callable method, assigned at
/// registration time. Generic methods register one identity per concrete
/// instantiation (selected on the wire by the generic-argument tags).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodId(u32);

impl MethodId {
    pub const fn from_u32(value: u32) -> Self {
        Self(value)
    }

    pub fn to_u32(&self) -> u32 {
        self.0
    }
}

/// Where a call is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcMode {
    /// Delivered to every participant; the permission gate is applied
    /// identically at every receiver.
    Broadcast,
    /// Routed to the object's owner, or the host if the object is unowned.
    Owner,
    /// Always routed to the host.
    Host,
}

/// Who may invoke the call. Evaluated before sending (to avoid pointless
/// traffic from a categorically invalid sender) and, independently and
/// non-optionally, on receipt — the sender is never trusted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcPermission {
    Any,
    /// Rejects unless the caller is the host.
    HostOnly,
    /// Rejects unless the caller controls the target object. An invalid or
    /// missing target object denies.
    OwnerOnly,
}

impl RpcPermission {
    pub fn permits<C: Copy + Eq>(
        &self,
        caller: &Participant<C>,
        ownership: Option<&OwnershipState<C>>,
    ) -> bool {
        match self {
            RpcPermission::Any => true,
            RpcPermission::HostOnly => caller.is_host(),
            RpcPermission::OwnerOnly => match ownership {
                None => false,
                Some(ownership) => ownership.participant_has_control(caller),
            },
        }
    }
}

/// The call target, resolved through an explicit registry rather than
/// dynamic dispatch over arbitrary component types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcTarget {
    Object(ObjectId),
    Component { object: ObjectId, component: u32 },
    System(u32),
}

impl RpcTarget {
    /// The object whose ownership gates this call, if any.
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            RpcTarget::Object(id) => Some(*id),
            RpcTarget::Component { object, .. } => Some(*object),
            RpcTarget::System(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RpcPermission;
    use crate::object::OwnershipState;
    use crate::types::Participant;

    #[test]
    fn host_only_rejects_peers() {
        let permission = RpcPermission::HostOnly;
        assert!(permission.permits::<u8>(&Participant::Host, None));
        assert!(!permission.permits(&Participant::Peer(1u8), None));
    }

    #[test]
    fn owner_only_follows_control() {
        let permission = RpcPermission::OwnerOnly;
        let owned = OwnershipState::with_owner(None, Some(1u8));
        assert!(permission.permits(&Participant::Peer(1), Some(&owned)));
        assert!(!permission.permits(&Participant::Peer(2), Some(&owned)));
        assert!(!permission.permits(&Participant::Host, Some(&owned)));

        let unowned: OwnershipState<u8> = OwnershipState::new(None);
        assert!(permission.permits(&Participant::Host, Some(&unowned)));
        assert!(!permission.permits(&Participant::Peer(1), Some(&unowned)));
    }

    #[test]
    fn owner_only_denies_missing_object() {
        let permission = RpcPermission::OwnerOnly;
        assert!(!permission.permits::<u8>(&Participant::Host, None));
    }
}
