//! The one interface both backends implement.
//!
//! The coordinator talks to a `dyn CardBackend` and never special-cases which
//! implementation sits behind it.

use core::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cardkeep_cards::{Card, CardDraft, CardFilter, CardPatch, LikeState, ViewerMarks};
use cardkeep_core::{CardError, CardId, CardResult};

/// Which backend is serving card operations.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Remote,
    #[default]
    Simulated,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Remote => "remote",
            BackendKind::Simulated => "simulated",
        }
    }
}

impl core::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = CardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "online" => Ok(BackendKind::Remote),
            "simulated" | "offline" => Ok(BackendKind::Simulated),
            other => Err(CardError::validation(format!("unknown backend '{other}'"))),
        }
    }
}

/// Backend operation names, shared by the remote wire mapping and the
/// simulated backend's fault injection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
    ToggleFavorite,
    ToggleLike,
    Marks,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::ToggleFavorite => "toggle_favorite",
            Operation::ToggleLike => "toggle_like",
            Operation::Marks => "marks",
        }
    }
}

impl core::fmt::Display for Operation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Card CRUD + favorite/like surface.
///
/// Every call acts on behalf of the session's current identity and enforces
/// the authorization policy on its side.
#[async_trait]
pub trait CardBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn list(&self, filter: &CardFilter) -> CardResult<Vec<Card>>;

    /// Fetch one card, counting a view.
    async fn get(&self, id: &CardId) -> CardResult<Card>;

    async fn create(&self, draft: CardDraft) -> CardResult<Card>;

    async fn update(&self, id: &CardId, patch: CardPatch) -> CardResult<Card>;

    async fn delete(&self, id: &CardId) -> CardResult<()>;

    /// Flip the favorite; returns the new state.
    async fn toggle_favorite(&self, id: &CardId) -> CardResult<bool>;

    /// Flip the like; returns the new state and count.
    async fn toggle_like(&self, id: &CardId) -> CardResult<LikeState>;

    /// The current identity's favorites and likes (empty when anonymous).
    async fn marks(&self) -> CardResult<ViewerMarks>;
}
