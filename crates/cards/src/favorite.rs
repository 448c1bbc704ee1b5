//! Per-identity relations to cards: favorites and likes.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cardkeep_core::{CardId, IdentityId};

/// A per-identity bookmark. Unique on `(identity_id, card_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub identity_id: IdentityId,
    pub card_id: CardId,
    pub created_at: DateTime<Utc>,
}

/// Marker recording that an identity currently likes a card.
/// Unique on `(identity_id, card_id)`; the card's `like_count` mirrors the
/// number of markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeMarker {
    pub identity_id: IdentityId,
    pub card_id: CardId,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a like toggle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub liked: bool,
    pub like_count: u32,
}

/// The current identity's favorites and likes, as seen by one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerMarks {
    #[serde(default)]
    pub favorites: BTreeSet<CardId>,
    #[serde(default)]
    pub likes: BTreeSet<CardId>,
}

impl ViewerMarks {
    /// Drop every mark pointing at `card_id`.
    pub fn forget(&mut self, card_id: &CardId) {
        self.favorites.remove(card_id);
        self.likes.remove(card_id);
    }

    /// Keep only marks whose card satisfies `exists`.
    pub fn retain_existing(&mut self, mut exists: impl FnMut(&CardId) -> bool) {
        self.favorites.retain(|id| exists(id));
        self.likes.retain(|id| exists(id));
    }
}
