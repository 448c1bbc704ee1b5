use serde::{Deserialize, Serialize};

use cardkeep_core::IdentityId;

use crate::Role;

/// An authenticated principal.
///
/// `id` and `role` are always taken from a verified credential's claims; the
/// profile fields (`display_name`, `email`) come from the login response and
/// may be edited. The credential is never serialized with the identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: IdentityId,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip)]
    pub credential: String,
}

impl Identity {
    pub fn new(
        id: IdentityId,
        display_name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            email: email.into(),
            role,
            credential: String::new(),
        }
    }
}

// Credentials never reach logs.
impl core::fmt::Debug for Identity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Whoever is driving the client right now: nobody, or one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Actor {
    #[default]
    Anonymous,
    Identified(Identity),
}

impl Actor {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Actor::Anonymous => None,
            Actor::Identified(identity) => Some(identity),
        }
    }

    pub fn id(&self) -> Option<&IdentityId> {
        self.identity().map(|i| &i.id)
    }

    pub fn role(&self) -> Option<Role> {
        self.identity().map(|i| i.role)
    }

    pub fn credential(&self) -> Option<&str> {
        self.identity().map(|i| i.credential.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::Identified(_))
    }
}

impl From<Identity> for Actor {
    fn from(identity: Identity) -> Self {
        Actor::Identified(identity)
    }
}

impl From<Option<Identity>> for Actor {
    fn from(identity: Option<Identity>) -> Self {
        identity.map_or(Actor::Anonymous, Actor::Identified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_credential() {
        let mut identity = Identity::new("u1".parse().unwrap(), "Ana", "ana@x.example", Role::Member);
        identity.credential = "secret.token.value".to_string();
        let rendered = format!("{identity:?}");
        assert!(!rendered.contains("secret.token.value"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn anonymous_has_no_identity() {
        let actor = Actor::default();
        assert!(!actor.is_authenticated());
        assert_eq!(actor.role(), None);
        assert_eq!(actor.id(), None);
    }
}
