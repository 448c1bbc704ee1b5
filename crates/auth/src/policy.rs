//! Authorization policy: who may create/edit/delete/favorite/like which card.
//!
//! - No IO
//! - No panics
//! - Total over every `(actor, card)` pair
//!
//! Both backends and the cache coordinator call these; nothing else decides
//! permissions. Seed-record immutability is absolute: no role overrides it.

use thiserror::Error;

use cardkeep_cards::Card;
use cardkeep_core::{CardError, CardId};

use crate::{Actor, Role};

pub fn can_create(actor: &Actor) -> bool {
    matches!(actor.role(), Some(Role::Publisher | Role::Administrator))
}

pub fn can_edit(actor: &Actor, card: &Card) -> bool {
    if card.is_seed_record {
        return false;
    }
    match actor.identity() {
        None => false,
        Some(identity) => card.is_owned_by(&identity.id) || identity.role == Role::Administrator,
    }
}

pub fn can_delete(actor: &Actor, card: &Card) -> bool {
    can_edit(actor, card)
}

pub fn can_favorite(actor: &Actor) -> bool {
    actor.is_authenticated()
}

pub fn can_like(actor: &Actor) -> bool {
    actor.is_authenticated()
}

/// A mutation to be authorized, with the record it targets.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    Create,
    Edit(&'a Card),
    Delete(&'a Card),
    Favorite,
    Like,
}

impl Action<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Edit(_) => "edit",
            Action::Delete(_) => "delete",
            Action::Favorite => "favorite",
            Action::Like => "like",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("sign in required to {0}")]
    Anonymous(&'static str),

    #[error("card {0} ships with the demo dataset and cannot be changed")]
    SeedRecord(CardId),

    #[error("forbidden: cannot {action} ({reason})")]
    Forbidden { action: &'static str, reason: String },
}

impl From<AuthzError> for CardError {
    fn from(err: AuthzError) -> Self {
        CardError::unauthorized(err.to_string())
    }
}

/// Authorize `action` for `actor`, explaining a denial.
///
/// Agrees with the `can_*` predicates for every input.
pub fn authorize(actor: &Actor, action: Action<'_>) -> Result<(), AuthzError> {
    let allowed = match action {
        Action::Create => can_create(actor),
        Action::Edit(card) => can_edit(actor, card),
        Action::Delete(card) => can_delete(actor, card),
        Action::Favorite => can_favorite(actor),
        Action::Like => can_like(actor),
    };
    if allowed {
        return Ok(());
    }

    let Some(identity) = actor.identity() else {
        return Err(AuthzError::Anonymous(action.name()));
    };

    match action {
        Action::Edit(card) | Action::Delete(card) if card.is_seed_record => {
            Err(AuthzError::SeedRecord(card.id.clone()))
        }
        Action::Edit(card) | Action::Delete(card) => Err(AuthzError::Forbidden {
            action: action.name(),
            reason: format!("{} does not own card {}", identity.id, card.id),
        }),
        _ => Err(AuthzError::Forbidden {
            action: action.name(),
            reason: format!("role '{}' is not allowed", identity.role),
        }),
    }
}
