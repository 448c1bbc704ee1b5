//! Wiring: one handle owning the session, both backends and the coordinator.

use std::sync::Arc;

use anyhow::Context;

use cardkeep_auth::{Hs256Credentials, Identity};
use cardkeep_core::CardResult;

use crate::backend::CardBackend;
use crate::cache::CardCoordinator;
use crate::config::ClientConfig;
use crate::offline::OfflineBackend;
use crate::remote::RemoteBackend;
use crate::session::SessionStore;
use crate::store::{FileStore, KeyValueStore};

/// Everything a presentation layer needs. Cheap to clone.
#[derive(Clone)]
pub struct CardClient {
    pub session: Arc<SessionStore>,
    pub offline: Arc<OfflineBackend>,
    pub cards: CardCoordinator,
}

impl CardClient {
    /// Open with a file-backed store under the configured data directory.
    pub fn open(config: &ClientConfig) -> anyhow::Result<Self> {
        let dir = config.resolve_data_dir()?;
        let store = FileStore::open(&dir)
            .with_context(|| format!("failed to open data directory at {}", dir.display()))?;
        Self::with_store(config, Arc::new(store))
    }

    /// Restores the persisted session and offline state, then selects the
    /// configured initial backend.
    pub fn with_store(config: &ClientConfig, store: Arc<dyn KeyValueStore>) -> anyhow::Result<Self> {
        let credentials = Hs256Credentials::new(config.credential_secret.as_bytes());

        let session = Arc::new(SessionStore::new(store.clone(), Arc::new(credentials.clone())));
        session.restore();

        let offline = Arc::new(
            OfflineBackend::new(session.clone(), store, credentials, config.offline_latency)
                .with_autosave(config.autosave_offline),
        );
        if let Err(err) = offline.restore() {
            tracing::warn!(error = %err, "discarding unreadable offline state; starting from seed data");
            offline.reset();
        }

        let remote = remote_backend(config, &session)?;
        let cards = CardCoordinator::new(session.clone(), remote, offline.clone(), config.initial_backend);

        tracing::info!(backend = %config.initial_backend, "card client ready");
        Ok(Self {
            session,
            offline,
            cards,
        })
    }

    /// Sign in with a demo account of the simulated backend.
    pub async fn sign_in_offline(&self, email: &str, password: &str) -> CardResult<Identity> {
        let (identity, credential) = self.offline.authenticate(email, password).await?;
        Ok(self.session.sign_in(identity, credential)?)
    }
}

impl core::fmt::Debug for CardClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CardClient")
            .field("session", &self.session)
            .field("cards", &self.cards)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "http")]
fn remote_backend(config: &ClientConfig, session: &SessionStore) -> anyhow::Result<Arc<dyn CardBackend>> {
    let gateway = crate::http::HttpGateway::new(&config.api_url, config.request_timeout())
        .context("failed to build HTTP client")?;
    Ok(Arc::new(RemoteBackend::new(gateway, session.credential_watch())))
}

#[cfg(not(feature = "http"))]
fn remote_backend(config: &ClientConfig, session: &SessionStore) -> anyhow::Result<Arc<dyn CardBackend>> {
    tracing::info!(api_url = %config.api_url, "built without the `http` feature; remote backend is disconnected");
    Ok(Arc::new(RemoteBackend::new(
        crate::remote::DisconnectedGateway,
        session.credential_watch(),
    )))
}

#[cfg(test)]
mod tests {
    use cardkeep_auth::Role;
    use cardkeep_cards::CardDraft;

    use super::*;
    use crate::backend::BackendKind;
    use crate::config::LatencyProfile;

    fn config(dir: &std::path::Path) -> ClientConfig {
        ClientConfig {
            data_dir: Some(dir.to_path_buf()),
            offline_latency: LatencyProfile::none(),
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn reopening_restores_session_and_offline_data() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());

        let client = CardClient::open(&cfg).unwrap();
        let me = client.sign_in_offline("publisher@cardkeep.demo", "demo").await.unwrap();
        assert_eq!(me.role, Role::Publisher);
        let card = client.cards.create(CardDraft::new("Kiosk Azul", "food")).await.unwrap();

        let reopened = CardClient::open(&cfg).unwrap();
        assert_eq!(reopened.session.current().id(), Some(&me.id));
        let cards = reopened.cards.refresh(None).await.unwrap();
        assert!(cards.iter().any(|c| c.id == card.id && c.owner_id == me.id));
    }

    #[tokio::test]
    async fn remote_without_transport_fails_as_network() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ClientConfig {
            initial_backend: BackendKind::Remote,
            api_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 1,
            ..config(dir.path())
        };
        let client = CardClient::open(&cfg).unwrap();

        let err = client.cards.refresh(None).await.unwrap_err();
        assert!(err.is_transient());
        assert!(client.cards.snapshot().is_empty());
    }
}
