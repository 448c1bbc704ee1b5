use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cardkeep_core::{CardId, IdentityId};

/// Owner id carried by records that ship with the simulated backend.
pub const SEED_OWNER: &str = "seed";

/// Contact channels printed on a card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Postal address of the business behind a card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub postal_code: String,
}

/// A shareable business-card record.
///
/// # Invariants
/// - `id` and `owner_id` never change after creation; [`CardPatch`] and
///   [`Card::reconcile_with`] leave both untouched.
/// - `is_seed_record` records are never editable or deletable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub owner_id: IdentityId,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contact: Contact,
    #[serde(default)]
    pub address: Address,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<String>,
    #[serde(default)]
    pub like_count: u32,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub is_seed_record: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn is_owned_by(&self, identity: &IdentityId) -> bool {
        &self.owner_id == identity
    }

    /// Copy server-authoritative fields from `canonical` into `self`.
    ///
    /// Identity fields (`id`, `owner_id`) and the seed flag are kept from
    /// `self`; everything else follows the canonical record.
    pub fn reconcile_with(&mut self, canonical: Card) {
        let Card {
            title,
            subtitle,
            description,
            contact,
            address,
            category,
            media_ref,
            like_count,
            view_count,
            created_at,
            updated_at,
            ..
        } = canonical;

        self.title = title;
        self.subtitle = subtitle;
        self.description = description;
        self.contact = contact;
        self.address = address;
        self.category = category;
        self.media_ref = media_ref;
        self.like_count = like_count;
        self.view_count = view_count;
        self.created_at = created_at;
        self.updated_at = updated_at;
    }
}

/// Payload for creating a card. The backend assigns `id`, `owner_id`,
/// counters and timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDraft {
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contact: Contact,
    #[serde(default)]
    pub address: Address,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<String>,
}

impl CardDraft {
    pub fn new(title: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            category: category.into(),
            ..Self::default()
        }
    }

    /// Materialize the draft as a stored record.
    pub fn into_card(self, id: CardId, owner_id: IdentityId, now: DateTime<Utc>) -> Card {
        Card {
            id,
            owner_id,
            title: self.title,
            subtitle: self.subtitle,
            description: self.description,
            contact: self.contact,
            address: self.address,
            category: self.category,
            media_ref: self.media_ref,
            like_count: 0,
            view_count: 0,
            is_seed_record: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a card. Absent fields are left untouched.
///
/// `media_ref: Some(None)` clears the media reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<Option<String>>,
}

impl CardPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the present fields into `card`. Does not touch `updated_at`;
    /// the caller decides which clock is authoritative.
    pub fn apply_to(&self, card: &mut Card) {
        if let Some(title) = &self.title {
            card.title = title.clone();
        }
        if let Some(subtitle) = &self.subtitle {
            card.subtitle = subtitle.clone();
        }
        if let Some(description) = &self.description {
            card.description = description.clone();
        }
        if let Some(contact) = &self.contact {
            card.contact = contact.clone();
        }
        if let Some(address) = &self.address {
            card.address = address.clone();
        }
        if let Some(category) = &self.category {
            card.category = category.clone();
        }
        if let Some(media_ref) = &self.media_ref {
            card.media_ref = media_ref.clone();
        }
    }
}
