//! Simulated backend: an in-memory, artificially latent stand-in for the
//! remote service.
//!
//! Same operation surface, same authorization rules and same error shapes as
//! the remote service, against a seeded dataset. State can be persisted to
//! and restored from the local key-value store under [`OFFLINE_STORE_KEY`].

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use cardkeep_auth::{
    Action, Actor, CredentialClaims, Hs256Credentials, Identity, authorize,
};
use cardkeep_cards::{
    Card, CardDraft, CardFilter, CardPatch, Favorite, LikeMarker, LikeState, ViewerMarks,
    validate_draft, validate_patch,
};
use cardkeep_core::{CardError, CardId, CardResult};

use crate::backend::{BackendKind, CardBackend, Operation};
use crate::config::LatencyProfile;
use crate::seed::{find_account, seed_cards};
use crate::session::SessionStore;
use crate::store::{KeyValueStore, OFFLINE_STORE_KEY};

/// Lifetime of credentials issued by [`OfflineBackend::authenticate`].
pub const CREDENTIAL_TTL_DAYS: i64 = 7;

const STATE_VERSION: u32 = 1;

/// Everything the simulated backend knows; this is what gets persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfflineState {
    version: u32,
    cards: Vec<Card>,
    favorites: Vec<Favorite>,
    likes: Vec<LikeMarker>,
}

impl OfflineState {
    fn seeded() -> Self {
        Self {
            version: STATE_VERSION,
            cards: seed_cards(),
            favorites: Vec::new(),
            likes: Vec::new(),
        }
    }

    fn card(&self, id: &CardId) -> CardResult<&Card> {
        self.cards
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| CardError::not_found(format!("card {id}")))
    }

    fn card_mut(&mut self, id: &CardId) -> CardResult<&mut Card> {
        self.cards
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| CardError::not_found(format!("card {id}")))
    }

    fn marks_for(&self, actor: &Actor) -> ViewerMarks {
        let Some(who) = actor.id() else {
            return ViewerMarks::default();
        };
        ViewerMarks {
            favorites: self
                .favorites
                .iter()
                .filter(|f| &f.identity_id == who)
                .map(|f| f.card_id.clone())
                .collect(),
            likes: self
                .likes
                .iter()
                .filter(|l| &l.identity_id == who)
                .map(|l| l.card_id.clone())
                .collect(),
        }
    }
}

pub struct OfflineBackend {
    session: Arc<SessionStore>,
    store: Arc<dyn KeyValueStore>,
    credentials: Hs256Credentials,
    latency: LatencyProfile,
    autosave: bool,
    state: Mutex<OfflineState>,
    faults: Mutex<HashMap<Operation, VecDeque<CardError>>>,
}

impl OfflineBackend {
    /// A backend holding the seed dataset. Call [`Self::restore`] to pick up
    /// previously persisted state.
    pub fn new(
        session: Arc<SessionStore>,
        store: Arc<dyn KeyValueStore>,
        credentials: Hs256Credentials,
        latency: LatencyProfile,
    ) -> Self {
        Self {
            session,
            store,
            credentials,
            latency,
            autosave: false,
            state: Mutex::new(OfflineState::seeded()),
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Persist after every successful mutation.
    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    /// Sign in with a demo account, returning the identity and a signed
    /// credential to hand to [`SessionStore::sign_in`].
    pub async fn authenticate(&self, email: &str, password: &str) -> CardResult<(Identity, String)> {
        self.simulate_latency().await;

        let account = find_account(email)
            .filter(|account| account.password == password)
            .ok_or_else(|| CardError::unauthorized("invalid email or password"))?;

        let mut claims = CredentialClaims::new(
            account.id.parse()?,
            account.role,
            Utc::now(),
            ChronoDuration::days(CREDENTIAL_TTL_DAYS),
        );
        claims.display_name = Some(account.display_name.to_string());
        claims.email = Some(account.email.to_string());

        let credential = self.credentials.issue(&claims)?;
        let identity = Identity::new(claims.sub, account.display_name, account.email, account.role);

        tracing::info!(email = account.email, role = %account.role, "offline authentication");
        Ok((identity, credential))
    }

    /// Write the full in-memory state under [`OFFLINE_STORE_KEY`].
    pub fn persist(&self) -> CardResult<()> {
        let bytes = {
            let state = self.lock_state();
            serde_json::to_vec(&*state)
                .map_err(|e| CardError::unknown(format!("failed to encode offline state: {e}")))?
        };
        self.store.set(OFFLINE_STORE_KEY, &bytes)?;
        tracing::debug!(bytes = bytes.len(), "offline state persisted");
        Ok(())
    }

    /// Replace the in-memory state with the persisted one.
    ///
    /// Returns `Ok(false)` when nothing was persisted. A corrupted record is
    /// an error and leaves the current state untouched.
    pub fn restore(&self) -> CardResult<bool> {
        let Some(bytes) = self.store.get(OFFLINE_STORE_KEY)? else {
            return Ok(false);
        };

        let restored: OfflineState = serde_json::from_slice(&bytes)
            .map_err(|e| CardError::unknown(format!("corrupted offline state: {e}")))?;
        if restored.version != STATE_VERSION {
            return Err(CardError::unknown(format!(
                "unsupported offline state version {} (expected {STATE_VERSION})",
                restored.version
            )));
        }

        let cards = restored.cards.len();
        *self.lock_state() = restored;
        tracing::info!(cards, "offline state restored");
        Ok(true)
    }

    /// Back to the seed dataset; session-created cards, favorites and likes
    /// are dropped and the persisted copy is removed.
    pub fn reset(&self) {
        *self.lock_state() = OfflineState::seeded();
        if let Err(err) = self.store.remove(OFFLINE_STORE_KEY) {
            tracing::warn!(error = %err, "failed to remove persisted offline state");
        }
        tracing::info!("offline state reset to seed dataset");
    }

    /// The current identity's favorites (empty when anonymous).
    pub async fn favorites(&self) -> CardResult<BTreeSet<CardId>> {
        Ok(self.marks().await?.favorites)
    }

    /// Make the next call of `operation` fail with `error` (one-shot, FIFO).
    pub fn fail_next(&self, operation: Operation, error: CardError) {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        faults.entry(operation).or_default().push_back(error);
    }

    fn lock_state(&self) -> MutexGuard<'_, OfflineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        let delay = self.latency.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Latency, then any injected fault for `operation`.
    async fn begin(&self, operation: Operation) -> CardResult<Actor> {
        self.simulate_latency().await;

        let fault = {
            let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
            faults.get_mut(&operation).and_then(VecDeque::pop_front)
        };
        if let Some(err) = fault {
            tracing::debug!(%operation, error = %err, "injected failure");
            return Err(err);
        }

        Ok(self.session.current())
    }

    fn after_mutation(&self) {
        if self.autosave {
            if let Err(err) = self.persist() {
                tracing::warn!(error = %err, "offline autosave failed");
            }
        }
    }
}

impl core::fmt::Debug for OfflineBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OfflineBackend")
            .field("latency", &self.latency)
            .field("autosave", &self.autosave)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CardBackend for OfflineBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    async fn list(&self, filter: &CardFilter) -> CardResult<Vec<Card>> {
        let actor = self.begin(Operation::List).await?;
        let state = self.lock_state();

        let favorites = filter.favorites_only.then(|| state.marks_for(&actor).favorites);
        Ok(state
            .cards
            .iter()
            .filter(|card| filter.matches(card))
            .filter(|card| favorites.as_ref().is_none_or(|favs| favs.contains(&card.id)))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &CardId) -> CardResult<Card> {
        self.begin(Operation::Get).await?;
        let card = {
            let mut state = self.lock_state();
            let card = state.card_mut(id)?;
            card.view_count = card.view_count.saturating_add(1);
            card.clone()
        };
        self.after_mutation();
        Ok(card)
    }

    async fn create(&self, draft: CardDraft) -> CardResult<Card> {
        let actor = self.begin(Operation::Create).await?;
        authorize(&actor, Action::Create)?;
        validate_draft(&draft)?;
        let owner = actor
            .id()
            .cloned()
            .ok_or_else(|| CardError::unauthorized("sign in required to create"))?;

        let card = {
            let mut state = self.lock_state();
            let mut id = CardId::new();
            while state.cards.iter().any(|c| c.id == id) {
                id = CardId::new();
            }
            let card = draft.into_card(id, owner, Utc::now());
            state.cards.push(card.clone());
            card
        };
        self.after_mutation();

        tracing::info!(card_id = %card.id, owner_id = %card.owner_id, "offline card created");
        Ok(card)
    }

    async fn update(&self, id: &CardId, patch: CardPatch) -> CardResult<Card> {
        let actor = self.begin(Operation::Update).await?;
        let card = {
            let mut state = self.lock_state();
            let card = state.card_mut(id)?;
            authorize(&actor, Action::Edit(card))?;
            validate_patch(&patch)?;

            patch.apply_to(card);
            card.updated_at = Utc::now();
            card.clone()
        };
        self.after_mutation();
        Ok(card)
    }

    async fn delete(&self, id: &CardId) -> CardResult<()> {
        let actor = self.begin(Operation::Delete).await?;
        {
            let mut state = self.lock_state();
            authorize(&actor, Action::Delete(state.card(id)?))?;

            state.cards.retain(|c| &c.id != id);
            state.favorites.retain(|f| &f.card_id != id);
            state.likes.retain(|l| &l.card_id != id);
        }
        self.after_mutation();

        tracing::info!(card_id = %id, "offline card deleted");
        Ok(())
    }

    async fn toggle_favorite(&self, id: &CardId) -> CardResult<bool> {
        let actor = self.begin(Operation::ToggleFavorite).await?;
        authorize(&actor, Action::Favorite)?;
        let who = actor
            .id()
            .cloned()
            .ok_or_else(|| CardError::unauthorized("sign in required to favorite"))?;

        let favorited = {
            let mut state = self.lock_state();
            state.card(id)?;

            let before = state.favorites.len();
            state.favorites.retain(|f| !(f.identity_id == who && &f.card_id == id));
            let removed = state.favorites.len() != before;
            if !removed {
                state.favorites.push(Favorite {
                    identity_id: who,
                    card_id: id.clone(),
                    created_at: Utc::now(),
                });
            }
            !removed
        };
        self.after_mutation();
        Ok(favorited)
    }

    async fn toggle_like(&self, id: &CardId) -> CardResult<LikeState> {
        let actor = self.begin(Operation::ToggleLike).await?;
        authorize(&actor, Action::Like)?;
        let who = actor
            .id()
            .cloned()
            .ok_or_else(|| CardError::unauthorized("sign in required to like"))?;

        let outcome = {
            let mut state = self.lock_state();
            state.card(id)?;

            let before = state.likes.len();
            state.likes.retain(|l| !(l.identity_id == who && &l.card_id == id));
            let liked = state.likes.len() == before;
            if liked {
                state.likes.push(LikeMarker {
                    identity_id: who,
                    card_id: id.clone(),
                    created_at: Utc::now(),
                });
            }

            let card = state.card_mut(id)?;
            card.like_count = if liked {
                card.like_count.saturating_add(1)
            } else {
                card.like_count.saturating_sub(1)
            };
            LikeState {
                liked,
                like_count: card.like_count,
            }
        };
        self.after_mutation();
        Ok(outcome)
    }

    async fn marks(&self) -> CardResult<ViewerMarks> {
        let actor = self.begin(Operation::Marks).await?;
        Ok(self.lock_state().marks_for(&actor))
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use cardkeep_auth::Role;

    use super::*;
    use crate::store::MemoryStore;

    const SECRET: &[u8] = b"offline-test-secret";

    struct Fixture {
        store: Arc<MemoryStore>,
        session: Arc<SessionStore>,
        backend: OfflineBackend,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(SessionStore::new(store.clone(), Arc::new(Hs256Credentials::new(SECRET))));
        let backend = OfflineBackend::new(
            session.clone(),
            store.clone(),
            Hs256Credentials::new(SECRET),
            LatencyProfile::none(),
        );
        Fixture { store, session, backend }
    }

    fn sign_in_as(f: &Fixture, id: &str, role: Role) {
        let claims = CredentialClaims::new(id.parse().unwrap(), role, Utc::now(), ChronoDuration::hours(1));
        let credential = Hs256Credentials::new(SECRET).issue(&claims).unwrap();
        f.session
            .sign_in(Identity::new(id.parse().unwrap(), id, format!("{id}@x.example"), role), credential)
            .unwrap();
    }

    fn card_id(s: &str) -> CardId {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn list_filters_by_text_category_and_location() {
        let f = fixture();
        assert_eq!(f.backend.list(&CardFilter::default()).await.unwrap().len(), 6);

        let porto = f.backend.list(&CardFilter::location("porto")).await.unwrap();
        assert_eq!(porto.len(), 2);

        let services_in_lisbon = CardFilter {
            category: Some("services".into()),
            location: Some("Lisbon".into()),
            ..CardFilter::default()
        };
        let hits = f.backend.list(&services_in_lisbon).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Velo Repair Co.");

        assert_eq!(f.backend.list(&CardFilter::text("sourdough")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_counts_views_and_reports_missing() {
        let f = fixture();
        let before = f.backend.get(&card_id("card-1")).await.unwrap().view_count;
        let after = f.backend.get(&card_id("card-1")).await.unwrap().view_count;
        assert_eq!(after, before + 1);

        assert!(matches!(
            f.backend.get(&card_id("card-404")).await,
            Err(CardError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_requires_publisher_and_sets_owner() {
        let f = fixture();
        let draft = CardDraft::new("Kiosk Azul", "food");

        assert!(matches!(f.backend.create(draft.clone()).await, Err(CardError::Unauthorized(_))));

        sign_in_as(&f, "m1", Role::Member);
        assert!(matches!(f.backend.create(draft.clone()).await, Err(CardError::Unauthorized(_))));

        sign_in_as(&f, "u1", Role::Publisher);
        let card = f.backend.create(draft).await.unwrap();
        assert_eq!(card.owner_id.as_str(), "u1");
        assert!(!card.is_seed_record);
        assert_eq!(f.backend.list(&CardFilter::default()).await.unwrap().len(), 7);

        assert!(matches!(
            f.backend.create(CardDraft::new("", "food")).await,
            Err(CardError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn update_checks_existence_then_ownership() {
        let f = fixture();
        sign_in_as(&f, "u1", Role::Publisher);
        let card = f.backend.create(CardDraft::new("Kiosk Azul", "food")).await.unwrap();

        assert!(matches!(
            f.backend.update(&card_id("card-404"), CardPatch::title("x")).await,
            Err(CardError::NotFound(_))
        ));

        sign_in_as(&f, "u2", Role::Publisher);
        assert!(matches!(
            f.backend.update(&card.id, CardPatch::title("Mine now")).await,
            Err(CardError::Unauthorized(_))
        ));

        sign_in_as(&f, "root", Role::Administrator);
        let updated = f.backend.update(&card.id, CardPatch::title("Kiosk Azul II")).await.unwrap();
        assert_eq!(updated.title, "Kiosk Azul II");
        assert_eq!(updated.owner_id.as_str(), "u1");
        assert!(updated.updated_at >= card.updated_at);

        assert!(matches!(
            f.backend.update(&card_id("card-1"), CardPatch::title("Seized")).await,
            Err(CardError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_card_and_its_favorites() {
        let f = fixture();
        sign_in_as(&f, "u1", Role::Publisher);
        let card = f.backend.create(CardDraft::new("Kiosk Azul", "food")).await.unwrap();
        assert!(f.backend.toggle_favorite(&card.id).await.unwrap());
        assert!(f.backend.toggle_like(&card.id).await.unwrap().liked);

        f.backend.delete(&card.id).await.unwrap();

        assert!(matches!(f.backend.get(&card.id).await, Err(CardError::NotFound(_))));
        assert_eq!(f.backend.marks().await.unwrap(), ViewerMarks::default());
        assert!(matches!(
            f.backend.delete(&card_id("card-2")).await,
            Err(CardError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn favorites_toggle_per_identity() {
        let f = fixture();
        let id = card_id("card-1");
        assert!(matches!(f.backend.toggle_favorite(&id).await, Err(CardError::Unauthorized(_))));

        sign_in_as(&f, "m1", Role::Member);
        assert!(f.backend.toggle_favorite(&id).await.unwrap());
        assert_eq!(f.backend.list(&CardFilter::favorites()).await.unwrap().len(), 1);

        sign_in_as(&f, "m2", Role::Member);
        assert!(f.backend.marks().await.unwrap().favorites.is_empty());

        sign_in_as(&f, "m1", Role::Member);
        assert!(!f.backend.toggle_favorite(&id).await.unwrap());
        assert!(f.backend.favorites().await.unwrap().is_empty());

        assert!(matches!(
            f.backend.toggle_favorite(&card_id("card-404")).await,
            Err(CardError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn likes_adjust_counter() {
        let f = fixture();
        sign_in_as(&f, "m1", Role::Member);
        let id = card_id("card-2");
        let base = f.backend.get(&id).await.unwrap().like_count;

        let liked = f.backend.toggle_like(&id).await.unwrap();
        assert_eq!(liked, LikeState { liked: true, like_count: base + 1 });

        let unliked = f.backend.toggle_like(&id).await.unwrap();
        assert_eq!(unliked, LikeState { liked: false, like_count: base });
    }

    #[tokio::test]
    async fn injected_failures_are_one_shot() {
        let f = fixture();
        f.backend.fail_next(Operation::List, CardError::network("offline"));

        assert!(matches!(
            f.backend.list(&CardFilter::default()).await,
            Err(CardError::Network(_))
        ));
        assert!(f.backend.list(&CardFilter::default()).await.is_ok());
    }

    #[tokio::test]
    async fn persist_restore_and_reset() {
        let f = fixture();
        sign_in_as(&f, "u1", Role::Publisher);
        let card = f.backend.create(CardDraft::new("Kiosk Azul", "food")).await.unwrap();
        f.backend.toggle_favorite(&card.id).await.unwrap();
        f.backend.persist().unwrap();

        let fresh = OfflineBackend::new(
            f.session.clone(),
            f.store.clone(),
            Hs256Credentials::new(SECRET),
            LatencyProfile::none(),
        );
        assert!(fresh.restore().unwrap());
        let listed = fresh.list(&CardFilter::default()).await.unwrap();
        assert!(listed.contains(&card));
        assert!(fresh.marks().await.unwrap().favorites.contains(&card.id));

        fresh.reset();
        assert_eq!(fresh.list(&CardFilter::default()).await.unwrap().len(), 6);
        assert!(!fresh.restore().unwrap());
    }

    #[tokio::test]
    async fn corrupted_store_is_reported_and_ignored() {
        let f = fixture();
        f.store.set(OFFLINE_STORE_KEY, b"{\"version\":1,\"cards\":").unwrap();
        assert!(matches!(f.backend.restore(), Err(CardError::Unknown(_))));
        assert_eq!(f.backend.list(&CardFilter::default()).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn autosave_persists_each_mutation() {
        let f = fixture();
        let backend = OfflineBackend::new(
            f.session.clone(),
            f.store.clone(),
            Hs256Credentials::new(SECRET),
            LatencyProfile::none(),
        )
        .with_autosave(true);
        sign_in_as(&f, "m1", Role::Member);

        backend.toggle_favorite(&card_id("card-3")).await.unwrap();
        assert!(f.store.get(OFFLINE_STORE_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn authenticate_issues_verifiable_credentials() {
        let f = fixture();
        let (identity, credential) = f.backend.authenticate("publisher@cardkeep.demo", "demo").await.unwrap();
        let signed = f.session.sign_in(identity, credential).unwrap();
        assert_eq!(signed.role, Role::Publisher);
        assert_eq!(signed.display_name, "Paulo Publisher");

        assert!(matches!(
            f.backend.authenticate("publisher@cardkeep.demo", "wrong").await,
            Err(CardError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn latency_is_injected() {
        let f = fixture();
        let slow = OfflineBackend::new(
            f.session.clone(),
            f.store.clone(),
            Hs256Credentials::new(SECRET),
            LatencyProfile::fixed(Duration::from_millis(20)),
        );
        let started = Instant::now();
        slow.list(&CardFilter::default()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
