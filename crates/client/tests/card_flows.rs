use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;

use cardkeep_auth::{Actor, CredentialClaims, Hs256Credentials, Identity, Role};
use cardkeep_cards::{CardDraft, CardFilter, CardPatch};
use cardkeep_client::store::SESSION_KEY;
use cardkeep_client::{
    CardBackend, CardClient, ClientConfig, FileStore, KeyValueStore, LatencyProfile, MemoryStore,
    OfflineBackend, Operation, SessionStore,
};
use cardkeep_core::{CardError, CardId};

fn config(latency: LatencyProfile) -> ClientConfig {
    ClientConfig {
        offline_latency: latency,
        autosave_offline: false,
        ..ClientConfig::default()
    }
}

fn client(latency: LatencyProfile) -> CardClient {
    CardClient::with_store(&config(latency), Arc::new(MemoryStore::new())).unwrap()
}

fn credentials() -> Hs256Credentials {
    Hs256Credentials::new(ClientConfig::default().credential_secret.as_bytes())
}

fn mint(id: &str, role: Role) -> String {
    let claims = CredentialClaims::new(id.parse().unwrap(), role, Utc::now(), ChronoDuration::minutes(10));
    credentials().issue(&claims).unwrap()
}

fn sign_in(session: &SessionStore, id: &str, role: Role) -> Identity {
    let identity = Identity::new(id.parse().unwrap(), id, format!("{id}@cards.example"), role);
    session.sign_in(identity, mint(id, role)).unwrap()
}

fn card_id(s: &str) -> CardId {
    s.parse().unwrap()
}

#[tokio::test]
async fn restore_twice_yields_the_same_identity() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let first = SessionStore::new(store.clone(), Arc::new(credentials()));
    let me = sign_in(&first, "m1", Role::Member);

    let restarted = SessionStore::new(store.clone(), Arc::new(credentials()));
    let a = restarted.restore();
    let b = restarted.restore();
    assert_eq!(a, b);
    assert_eq!(a.identity(), Some(&me));
}

#[tokio::test]
async fn restore_takes_role_from_the_credential_not_the_cached_record() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let session = SessionStore::new(store.clone(), Arc::new(credentials()));
    sign_in(&session, "m1", Role::Member);

    let raw = store.get(SESSION_KEY).unwrap().unwrap();
    let mut record: Value = serde_json::from_slice(&raw).unwrap();
    record["identity"]["role"] = Value::String("administrator".into());
    store.set(SESSION_KEY, &serde_json::to_vec(&record).unwrap()).unwrap();

    let restarted = SessionStore::new(store.clone(), Arc::new(credentials()));
    assert_eq!(restarted.restore().role(), Some(Role::Member));
}

#[tokio::test]
async fn corrupted_session_starts_anonymous_and_is_discarded() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    store.set(SESSION_KEY, b"{ not json").unwrap();

    let session = SessionStore::new(store.clone(), Arc::new(credentials()));
    assert_eq!(session.restore(), Actor::Anonymous);
    assert!(store.get(SESSION_KEY).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_update_is_visible_then_rolled_back() {
    let c = client(LatencyProfile::fixed(Duration::from_millis(100)));
    sign_in(&c.session, "u1", Role::Publisher);
    let card = c.cards.create(CardDraft::new("A", "food")).await.unwrap();
    c.offline.fail_next(Operation::Update, CardError::network("link down"));

    let (result, seen) = tokio::join!(c.cards.update(&card.id, CardPatch::title("B")), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        c.cards.snapshot().card(&card.id).map(|card| card.title.clone())
    });

    assert_eq!(seen.as_deref(), Some("B"));
    assert!(matches!(result, Err(CardError::Network(_))));
    assert_eq!(c.cards.snapshot().card(&card.id).unwrap().title, "A");
}

#[tokio::test(start_paused = true)]
async fn back_to_back_toggles_change_state_once() {
    let c = client(LatencyProfile::fixed(Duration::from_millis(250)));
    sign_in(&c.session, "m1", Role::Member);
    c.cards.refresh(None).await.unwrap();
    let x = card_id("card-3");

    let (first, second) = tokio::join!(c.cards.toggle_favorite(&x), c.cards.toggle_favorite(&x));
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| matches!(r, Ok(true))).count(), 1);
    assert_eq!(results.iter().filter(|r| matches!(r, Err(CardError::Busy(_)))).count(), 1);

    assert!(c.cards.snapshot().is_favorite(&x));
    let marks = c.offline.marks().await.unwrap();
    assert_eq!(marks.favorites.into_iter().collect::<Vec<_>>(), vec![x]);
}

#[tokio::test]
async fn offline_state_survives_a_fresh_instance() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<FileStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let session = Arc::new(SessionStore::new(store.clone(), Arc::new(credentials())));
    sign_in(&session, "u1", Role::Publisher);

    let original = OfflineBackend::new(session.clone(), store.clone(), credentials(), LatencyProfile::none());
    let created = original.create(CardDraft::new("Kiosk Azul", "food")).await.unwrap();
    original.persist().unwrap();
    drop(original);

    let reopened: Arc<FileStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let fresh = OfflineBackend::new(session, reopened, credentials(), LatencyProfile::none());
    assert!(fresh.restore().unwrap());

    let listed = fresh.list(&CardFilter::default()).await.unwrap();
    assert_eq!(listed.len(), 7);
    assert!(listed.contains(&created));
}

#[tokio::test]
async fn anonymous_then_member_favorite_flow() {
    let c = client(LatencyProfile::none());
    c.cards.refresh(None).await.unwrap();
    let before = c.cards.snapshot();
    let id = card_id("card-1");

    assert!(matches!(c.cards.toggle_favorite(&id).await, Err(CardError::Unauthorized(_))));
    assert_eq!(*c.cards.snapshot(), *before);

    sign_in(&c.session, "m1", Role::Member);
    assert!(c.cards.toggle_favorite(&id).await.unwrap());
    assert!(!c.cards.toggle_favorite(&id).await.unwrap());
    assert!(c.offline.marks().await.unwrap().favorites.is_empty());
    assert!(c.cards.snapshot().marks().favorites.is_empty());
}

#[tokio::test]
async fn ownership_rules_for_publishers_and_administrators() {
    let c = client(LatencyProfile::none());

    sign_in(&c.session, "u1", Role::Publisher);
    let card = c.cards.create(CardDraft::new("U1 Studio", "design")).await.unwrap();
    assert_eq!(card.owner_id.as_str(), "u1");

    sign_in(&c.session, "u2", Role::Publisher);
    assert!(matches!(
        c.cards.update(&card.id, CardPatch::title("Taken over")).await,
        Err(CardError::Unauthorized(_))
    ));
    assert_eq!(c.cards.snapshot().card(&card.id).unwrap().title, "U1 Studio");

    sign_in(&c.session, "boss", Role::Administrator);
    let updated = c.cards.update(&card.id, CardPatch::title("Renamed")).await.unwrap();
    assert_eq!(updated.title, "Renamed");
    assert_eq!(updated.owner_id.as_str(), "u1");
}

#[tokio::test]
async fn seed_cards_stay_immutable_for_everyone() {
    let c = client(LatencyProfile::none());
    c.cards.refresh(None).await.unwrap();
    sign_in(&c.session, "boss", Role::Administrator);

    for id in ["card-1", "card-6"] {
        let id = card_id(id);
        assert!(matches!(c.cards.delete(&id).await, Err(CardError::Unauthorized(_))));
        assert!(c.cards.snapshot().card(&id).is_some());
    }
}

#[tokio::test]
async fn member_cannot_create() {
    let c = client(LatencyProfile::none());
    sign_in(&c.session, "m1", Role::Member);
    assert!(matches!(
        c.cards.create(CardDraft::new("Nope", "food")).await,
        Err(CardError::Unauthorized(_))
    ));
    c.cards.refresh(None).await.unwrap();
    assert_eq!(c.cards.snapshot().len(), 6);
}
