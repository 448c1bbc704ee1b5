//! Entity cache and mutation coordinator.
//!
//! [`CardCoordinator`] is the only thing presentation code talks to. It holds
//! the working set of cards and the current identity's marks, pre-checks
//! every mutation against the authorization policy, applies optimistic
//! changes immediately and confirms or reverts them once the active backend
//! answers.
//!
//! Reads go through [`CardCoordinator::snapshot`], an `Arc` to an immutable
//! [`CacheSnapshot`]. Mutations replace it copy-on-write.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use cardkeep_auth::{Action, authorize};
use cardkeep_cards::{
    Card, CardDraft, CardFilter, CardPatch, LikeState, ViewerMarks, validate_draft, validate_patch,
};
use cardkeep_core::{CardError, CardId, CardResult};

use crate::backend::{BackendKind, CardBackend};
use crate::session::SessionStore;

/// Mutation kinds tracked by the in-flight set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Update,
    Delete,
    ToggleFavorite,
    ToggleLike,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
            MutationKind::ToggleFavorite => "toggle_favorite",
            MutationKind::ToggleLike => "toggle_like",
        }
    }
}

impl core::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marks a pending mutation. At most one may exist per card, whatever its
/// kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InFlightKey {
    pub kind: MutationKind,
    pub card_id: CardId,
}

impl InFlightKey {
    pub fn new(kind: MutationKind, card_id: CardId) -> Self {
        Self { kind, card_id }
    }
}

/// Immutable read view of the coordinator's working set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    cards: Vec<Card>,
    marks: ViewerMarks,
    in_flight: BTreeSet<InFlightKey>,
}

impl CacheSnapshot {
    /// Cards in backend order. Ids are unique.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.cards.iter().find(|c| &c.id == id)
    }

    pub fn marks(&self) -> &ViewerMarks {
        &self.marks
    }

    pub fn is_favorite(&self, id: &CardId) -> bool {
        self.marks.favorites.contains(id)
    }

    pub fn is_liked(&self, id: &CardId) -> bool {
        self.marks.likes.contains(id)
    }

    pub fn is_in_flight(&self, kind: MutationKind, id: &CardId) -> bool {
        self.in_flight.iter().any(|k| k.kind == kind && &k.card_id == id)
    }

    pub fn in_flight(&self) -> &BTreeSet<InFlightKey> {
        &self.in_flight
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    fn position(&self, id: &CardId) -> Option<usize> {
        self.cards.iter().position(|c| &c.id == id)
    }

    fn card_mut(&mut self, id: &CardId) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| &c.id == id)
    }

    fn upsert(&mut self, card: Card) {
        match self.card_mut(&card.id) {
            Some(existing) => *existing = card,
            None => self.cards.push(card),
        }
    }

    fn remove(&mut self, id: &CardId) -> Option<(usize, Card)> {
        let index = self.position(id)?;
        Some((index, self.cards.remove(index)))
    }
}

/// What an optimistic apply overwrote; consumed by the revert.
#[derive(Debug, Clone)]
enum Preceding {
    Updated(Card),
    Deleted {
        index: usize,
        card: Card,
        favorite: bool,
        liked: bool,
    },
    Favorite(bool),
    Like {
        liked: bool,
        like_count: Option<u32>,
    },
}

impl Preceding {
    fn revert(self, snapshot: &mut CacheSnapshot, id: &CardId) {
        match self {
            Preceding::Updated(previous) => {
                if let Some(card) = snapshot.card_mut(id) {
                    let like_count = card.like_count;
                    *card = previous;
                    card.like_count = like_count;
                }
            }
            Preceding::Deleted {
                index,
                card,
                favorite,
                liked,
            } => {
                if snapshot.card(id).is_none() {
                    let index = index.min(snapshot.cards.len());
                    snapshot.cards.insert(index, card);
                }
                if favorite {
                    snapshot.marks.favorites.insert(id.clone());
                }
                if liked {
                    snapshot.marks.likes.insert(id.clone());
                }
            }
            Preceding::Favorite(was) => set_membership(&mut snapshot.marks.favorites, id, was),
            Preceding::Like { liked, like_count } => {
                set_membership(&mut snapshot.marks.likes, id, liked);
                if let (Some(count), Some(card)) = (like_count, snapshot.card_mut(id)) {
                    card.like_count = count;
                }
            }
        }
    }
}

/// A pending optimistic change. Dropped as soon as the backend call resolves.
#[derive(Debug)]
struct MutationIntent {
    key: InFlightKey,
    preceding: Option<Preceding>,
    generation: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    snapshot: Arc<CacheSnapshot>,
    /// Bumped by every applied refresh.
    generation: u64,
    /// Ticket handed to the most recently started refresh.
    refresh_issued: u64,
    /// Ticket of the refresh whose result is currently shown.
    refresh_applied: u64,
}

fn set_membership(set: &mut BTreeSet<CardId>, id: &CardId, member: bool) {
    if member {
        set.insert(id.clone());
    } else {
        set.remove(id);
    }
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Backend-agnostic, authorization-aware, optimistically consistent view of
/// cards. Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct CardCoordinator {
    session: Arc<SessionStore>,
    remote: Arc<dyn CardBackend>,
    simulated: Arc<dyn CardBackend>,
    active: Arc<RwLock<BackendKind>>,
    state: Arc<Mutex<CacheState>>,
}

impl CardCoordinator {
    pub fn new(
        session: Arc<SessionStore>,
        remote: Arc<dyn CardBackend>,
        simulated: Arc<dyn CardBackend>,
        initial: BackendKind,
    ) -> Self {
        Self {
            session,
            remote,
            simulated,
            active: Arc::new(RwLock::new(initial)),
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        lock(&self.state).snapshot.clone()
    }

    pub fn active_backend(&self) -> BackendKind {
        *self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch backends. The snapshot is left alone; call [`Self::refresh`]
    /// to see the new backend's data.
    pub fn select_backend(&self, kind: BackendKind) {
        let previous = {
            let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
            core::mem::replace(&mut *active, kind)
        };
        if previous != kind {
            tracing::info!(from = %previous, to = %kind, "backend switched");
        }
    }

    fn backend(&self) -> Arc<dyn CardBackend> {
        match self.active_backend() {
            BackendKind::Remote => self.remote.clone(),
            BackendKind::Simulated => self.simulated.clone(),
        }
    }

    /// Replace the snapshot with the active backend's (filtered) list and the
    /// current identity's marks. On failure the previous snapshot is kept.
    ///
    /// When refreshes overlap, the one started last wins. An older result
    /// arriving after a newer one has been applied is dropped and the cards
    /// already shown are returned.
    pub async fn refresh(&self, filter: Option<CardFilter>) -> CardResult<Vec<Card>> {
        let backend = self.backend();
        let filter = filter.unwrap_or_default();
        let authenticated = self.session.current().is_authenticated();
        let ticket = {
            let mut state = lock(&self.state);
            state.refresh_issued += 1;
            state.refresh_issued
        };

        let fetched = async {
            let cards = backend.list(&filter).await?;
            let marks = if authenticated {
                backend.marks().await?
            } else {
                ViewerMarks::default()
            };
            Ok::<_, CardError>((cards, marks))
        }
        .await;

        let (listed, mut marks) = match fetched {
            Ok(fetched) => fetched,
            Err(err) => {
                tracing::warn!(backend = %backend.kind(), error = %err, "refresh failed; keeping last snapshot");
                return Err(err);
            }
        };

        let mut seen = BTreeSet::new();
        let cards: Vec<Card> = listed.into_iter().filter(|c| seen.insert(c.id.clone())).collect();
        if filter.is_empty() {
            marks.retain_existing(|id| seen.contains(id));
        }

        let mut state = lock(&self.state);
        if ticket < state.refresh_applied {
            tracing::debug!(
                backend = %backend.kind(),
                ticket,
                applied = state.refresh_applied,
                "stale refresh dropped"
            );
            return Ok(state.snapshot.cards.clone());
        }
        state.refresh_applied = ticket;
        let in_flight = state.snapshot.in_flight.clone();
        state.snapshot = Arc::new(CacheSnapshot {
            cards: cards.clone(),
            marks,
            in_flight,
        });
        state.generation += 1;

        tracing::info!(
            backend = %backend.kind(),
            cards = cards.len(),
            generation = state.generation,
            "snapshot refreshed"
        );
        Ok(cards)
    }

    /// Fetch one card (counting a view) and upsert it into the snapshot.
    pub async fn get(&self, id: &CardId) -> CardResult<Card> {
        let card = self.backend().get(id).await?;

        let mut state = lock(&self.state);
        Arc::make_mut(&mut state.snapshot).upsert(card.clone());
        Ok(card)
    }

    /// Not optimistic: the card appears once the backend has stored it.
    pub async fn create(&self, draft: CardDraft) -> CardResult<Card> {
        let actor = self.session.current();
        authorize(&actor, Action::Create)?;
        validate_draft(&draft)?;

        let backend = self.backend();
        let state = self.state.clone();
        let task = tokio::spawn(async move {
            let card = backend.create(draft).await?;
            Arc::make_mut(&mut lock(&state).snapshot).upsert(card.clone());
            Ok::<_, CardError>(card)
        });

        let result = join(task).await;
        match &result {
            Ok(card) => tracing::info!(card_id = %card.id, "card created"),
            Err(err) => tracing::warn!(error = %err, "card creation failed"),
        }
        result
    }

    pub async fn update(&self, id: &CardId, patch: CardPatch) -> CardResult<Card> {
        let actor = self.session.current();
        let backend = self.backend();
        let target = id.clone();
        let call_patch = patch.clone();

        self.run_optimistic(
            MutationKind::Update,
            id,
            |snapshot| {
                let card = snapshot
                    .card(id)
                    .ok_or_else(|| CardError::not_found(format!("card {id}")))?;
                authorize(&actor, Action::Edit(card))?;
                validate_patch(&patch)
            },
            |snapshot| {
                let mut previous = None;
                if let Some(card) = snapshot.card_mut(id) {
                    previous = Some(card.clone());
                    patch.apply_to(card);
                    card.updated_at = Utc::now();
                }
                previous.map(Preceding::Updated)
            },
            async move { backend.update(&target, call_patch).await },
            |snapshot, canonical: &Card| {
                if let Some(card) = snapshot.card_mut(&canonical.id) {
                    card.reconcile_with(canonical.clone());
                }
            },
        )
        .await
    }

    pub async fn delete(&self, id: &CardId) -> CardResult<()> {
        let actor = self.session.current();
        let backend = self.backend();
        let target = id.clone();
        let confirmed = id.clone();

        self.run_optimistic(
            MutationKind::Delete,
            id,
            |snapshot| {
                let card = snapshot
                    .card(id)
                    .ok_or_else(|| CardError::not_found(format!("card {id}")))?;
                authorize(&actor, Action::Delete(card))?;
                Ok(())
            },
            |snapshot| {
                let favorite = snapshot.is_favorite(id);
                let liked = snapshot.is_liked(id);
                let (index, card) = snapshot.remove(id)?;
                snapshot.marks.forget(id);
                Some(Preceding::Deleted {
                    index,
                    card,
                    favorite,
                    liked,
                })
            },
            async move { backend.delete(&target).await },
            move |snapshot, _: &()| {
                snapshot.remove(&confirmed);
                snapshot.marks.forget(&confirmed);
            },
        )
        .await
    }

    /// Returns the new favorite state.
    pub async fn toggle_favorite(&self, id: &CardId) -> CardResult<bool> {
        let actor = self.session.current();
        let backend = self.backend();
        let target = id.clone();
        let confirmed = id.clone();

        self.run_optimistic(
            MutationKind::ToggleFavorite,
            id,
            |_| Ok(authorize(&actor, Action::Favorite)?),
            |snapshot| {
                let was = snapshot.is_favorite(id);
                set_membership(&mut snapshot.marks.favorites, id, !was);
                Some(Preceding::Favorite(was))
            },
            async move { backend.toggle_favorite(&target).await },
            move |snapshot, favorited: &bool| {
                set_membership(&mut snapshot.marks.favorites, &confirmed, *favorited);
            },
        )
        .await
    }

    pub async fn toggle_like(&self, id: &CardId) -> CardResult<LikeState> {
        let actor = self.session.current();
        let backend = self.backend();
        let target = id.clone();
        let confirmed = id.clone();

        self.run_optimistic(
            MutationKind::ToggleLike,
            id,
            |_| Ok(authorize(&actor, Action::Like)?),
            |snapshot| {
                let liked = snapshot.is_liked(id);
                set_membership(&mut snapshot.marks.likes, id, !liked);
                let like_count = snapshot.card_mut(id).map(|card| {
                    let before = card.like_count;
                    card.like_count = if liked {
                        before.saturating_sub(1)
                    } else {
                        before.saturating_add(1)
                    };
                    before
                });
                Some(Preceding::Like { liked, like_count })
            },
            async move { backend.toggle_like(&target).await },
            move |snapshot, state: &LikeState| {
                set_membership(&mut snapshot.marks.likes, &confirmed, state.liked);
                if let Some(card) = snapshot.card_mut(&confirmed) {
                    card.like_count = state.like_count;
                }
            },
        )
        .await
    }

    /// Apply, call, then confirm or revert.
    ///
    /// `check` runs first against the current snapshot, then the in-flight
    /// set is consulted: any pending mutation on the same card, of any kind,
    /// makes this one `Busy`. `apply` returns what it overwrote, or `None` when
    /// there was nothing to change locally. The backend call and the
    /// reconciliation run on a spawned task, so dropping the returned future
    /// does not abort the mutation.
    async fn run_optimistic<T, Fut>(
        &self,
        kind: MutationKind,
        id: &CardId,
        check: impl FnOnce(&CacheSnapshot) -> CardResult<()>,
        apply: impl FnOnce(&mut CacheSnapshot) -> Option<Preceding>,
        call: Fut,
        confirm: impl FnOnce(&mut CacheSnapshot, &T) + Send + 'static,
    ) -> CardResult<T>
    where
        T: Send + 'static,
        Fut: Future<Output = CardResult<T>> + Send + 'static,
    {
        let key = InFlightKey::new(kind, id.clone());

        let intent = {
            let mut state = lock(&self.state);
            check(&*state.snapshot)?;

            if let Some(pending) = state.snapshot.in_flight.iter().find(|k| &k.card_id == id) {
                tracing::debug!(%kind, pending = %pending.kind, card_id = %id, "mutation rejected: card busy");
                return Err(CardError::busy(format!("{} already in flight for card {id}", pending.kind)));
            }

            let generation = state.generation;
            let snapshot = Arc::make_mut(&mut state.snapshot);
            let preceding = apply(snapshot);
            snapshot.in_flight.insert(key.clone());

            tracing::debug!(%kind, card_id = %id, "optimistic change applied");
            MutationIntent {
                key,
                preceding,
                generation,
            }
        };

        let state = self.state.clone();
        let task = tokio::spawn(async move {
            let result = call.await;
            reconcile(&state, intent, &result, confirm);
            result
        });

        join(task).await
    }
}

impl core::fmt::Debug for CardCoordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CardCoordinator")
            .field("active", &self.active_backend())
            .finish_non_exhaustive()
    }
}

/// Confirm or revert a resolved mutation and release its in-flight key.
///
/// If a refresh landed while the call was pending, the refreshed snapshot
/// wins: failures are not reverted and confirmations only touch cards that
/// are still present.
fn reconcile<T>(
    state: &Mutex<CacheState>,
    intent: MutationIntent,
    result: &CardResult<T>,
    confirm: impl FnOnce(&mut CacheSnapshot, &T),
) {
    let MutationIntent {
        key,
        preceding,
        generation,
    } = intent;
    let id = &key.card_id;
    let kind = key.kind;

    let mut state = lock(state);
    let refreshed = state.generation != generation;
    let snapshot = Arc::make_mut(&mut state.snapshot);
    snapshot.in_flight.remove(&key);

    match result {
        Ok(_) if refreshed && snapshot.card(id).is_none() => {
            tracing::debug!(%kind, card_id = %id, "confirmation skipped: card left the snapshot");
        }
        Ok(value) => {
            confirm(snapshot, value);
            tracing::debug!(%kind, card_id = %id, "optimistic change confirmed");
        }
        Err(err) if refreshed => {
            tracing::info!(%kind, card_id = %id, error = %err, "mutation failed after refresh; keeping refreshed state");
        }
        Err(err) => {
            if let Some(preceding) = preceding {
                preceding.revert(snapshot, id);
            }
            tracing::warn!(%kind, card_id = %id, error = %err, "optimistic change reverted");
        }
    }
}

async fn join<T>(task: tokio::task::JoinHandle<CardResult<T>>) -> CardResult<T> {
    task.await
        .map_err(|e| CardError::unknown(format!("mutation task failed: {e}")))?
}
