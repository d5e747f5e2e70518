use crate::object::OwnershipState;

/// Per-field authority predicate, evaluated against the live ownership
/// record. A field transmits only when the predicate holds for the local
/// participant, and an inbound write is applied only when it holds for the
/// sender.
pub enum FieldAuthority<C> {
    /// Whoever currently controls the object (owner, or host if unowned).
    /// The default for synchronized fields.
    Controller,
    /// Only the host may author this field, regardless of ownership.
    Host,
    /// Custom predicate over the writer's connection identity (`None` is
    /// the host).
    Custom(Box<dyn Fn(Option<&C>) -> bool + Send + Sync>),
}

impl<C: Copy + Eq> FieldAuthority<C> {
    pub fn allows(&self, writer: Option<&C>, ownership: &OwnershipState<C>) -> bool {
        match self {
            FieldAuthority::Controller => ownership.connection_has_control(writer),
            FieldAuthority::Host => writer.is_none(),
            FieldAuthority::Custom(predicate) => predicate(writer),
        }
    }
}

impl<C> std::fmt::Debug for FieldAuthority<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldAuthority::Controller => write!(f, "Controller"),
            FieldAuthority::Host => write!(f, "Host"),
            FieldAuthority::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FieldAuthority;
    use crate::object::OwnershipState;

    #[test]
    fn controller_tracks_ownership() {
        let authority: FieldAuthority<u8> = FieldAuthority::Controller;
        let unowned: OwnershipState<u8> = OwnershipState::new(None);
        assert!(authority.allows(None, &unowned));
        assert!(!authority.allows(Some(&2), &unowned));

        let owned = OwnershipState::with_owner(None, Some(2u8));
        assert!(authority.allows(Some(&2), &owned));
        assert!(!authority.allows(None, &owned));
    }

    #[test]
    fn host_authority_ignores_ownership() {
        let authority: FieldAuthority<u8> = FieldAuthority::Host;
        let owned = OwnershipState::with_owner(None, Some(2u8));
        assert!(authority.allows(None, &owned));
        assert!(!authority.allows(Some(&2), &owned));
    }

    #[test]
    fn custom_predicate_is_consulted() {
        let authority: FieldAuthority<u8> = FieldAuthority::Custom(Box::new(|writer| {
            writer == Some(&7)
        }));
        let unowned: OwnershipState<u8> = OwnershipState::new(None);
        assert!(authority.allows(Some(&7), &unowned));
        assert!(!authority.allows(Some(&8), &unowned));
        assert!(!authority.allows(None, &unowned));
    }
}
