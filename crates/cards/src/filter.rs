//! List filtering shared by every backend.

use serde::{Deserialize, Serialize};

use cardkeep_core::IdentityId;

use crate::Card;

/// Filter applied by `list`.
///
/// - `text`: case-insensitive substring match against title, subtitle and
///   description.
/// - `category`: exact (case-insensitive) category match.
/// - `location`: exact (case-insensitive) match on `address.city`.
/// - `owner`: only cards owned by this identity.
/// - `favorites_only`: only the current identity's favorites. Needs the
///   identity's favorite set, so it is applied by the backend rather than by
///   [`CardFilter::matches`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<IdentityId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub favorites_only: bool,
}

impl CardFilter {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Self::default()
        }
    }

    pub fn location(city: impl Into<String>) -> Self {
        Self {
            location: Some(city.into()),
            ..Self::default()
        }
    }

    pub fn owned_by(owner: IdentityId) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    pub fn favorites() -> Self {
        Self {
            favorites_only: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Field-level match (everything except `favorites_only`).
    pub fn matches(&self, card: &Card) -> bool {
        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = text.to_lowercase();
            let hit = [&card.title, &card.subtitle, &card.description]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if let Some(category) = &self.category {
            if !card.category.eq_ignore_ascii_case(category.trim()) {
                return false;
            }
        }

        if let Some(location) = &self.location {
            if !card.address.city.eq_ignore_ascii_case(location.trim()) {
                return false;
            }
        }

        if let Some(owner) = &self.owner {
            if &card.owner_id != owner {
                return false;
            }
        }

        true
    }
}
