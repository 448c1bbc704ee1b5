//! Identity session store: the single owner of "who is using this client".
//!
//! The identity's id and role are only ever taken from verified credential
//! claims, both at sign-in and when a persisted session is restored, so a
//! tampered cache cannot change either.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use cardkeep_auth::{Actor, CredentialError, CredentialVerifier, Identity};
use cardkeep_core::{CardError, CardResult};

use crate::store::{KeyValueStore, SESSION_KEY, StoreError};

/// What is written under [`SESSION_KEY`].
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    identity: Identity,
    credential: String,
}

/// Why a session record could not be read back or written.
#[derive(Debug, Error)]
enum SessionRecordError {
    #[error("session record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session credential rejected: {0}")]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    verifier: Arc<dyn CredentialVerifier>,
    current: RwLock<Option<Identity>>,
    credential_tx: watch::Sender<Option<String>>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        let (credential_tx, _) = watch::channel(None);
        Self {
            store,
            verifier,
            current: RwLock::new(None),
            credential_tx,
        }
    }

    /// Load the persisted session, if any.
    ///
    /// A missing, unreadable, corrupted or expired record leaves the store
    /// anonymous; a bad record is also deleted. Never fails.
    pub fn restore(&self) -> Actor {
        let raw = match self.store.get(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!("no persisted session");
                self.set_current(None);
                return Actor::Anonymous;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to read persisted session; starting anonymous");
                self.set_current(None);
                return Actor::Anonymous;
            }
        };

        match self.decode(&raw) {
            Ok(identity) => {
                tracing::info!(identity_id = %identity.id, role = %identity.role, "session restored");
                self.set_current(Some(identity.clone()));
                Actor::Identified(identity)
            }
            Err(reason) => {
                tracing::warn!(%reason, "discarding persisted session");
                if let Err(err) = self.store.remove(SESSION_KEY) {
                    tracing::warn!(error = %err, "failed to remove discarded session");
                }
                self.set_current(None);
                Actor::Anonymous
            }
        }
    }

    /// Make `identity` current, authenticated by `credential`.
    ///
    /// Id and role are overwritten from the credential's claims. The
    /// `{identity, credential}` record is persisted in one write and the
    /// outgoing credential is published to [`Self::credential_watch`].
    pub fn sign_in(&self, identity: Identity, credential: String) -> Result<Identity, CredentialError> {
        let claims = self.verifier.verify(&credential, Utc::now())?;

        let display_name = if identity.display_name.trim().is_empty() {
            claims.display_name.unwrap_or_default()
        } else {
            identity.display_name
        };
        let email = if identity.email.trim().is_empty() {
            claims.email.unwrap_or_default()
        } else {
            identity.email
        };

        let identity = Identity {
            id: claims.sub,
            display_name,
            email,
            role: claims.role,
            credential,
        };

        self.persist(&identity);
        self.set_current(Some(identity.clone()));
        tracing::info!(identity_id = %identity.id, role = %identity.role, "signed in");
        Ok(identity)
    }

    /// Forget the current identity. Idempotent.
    pub fn sign_out(&self) {
        let previous = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            current.take()
        };
        self.credential_tx.send_replace(None);

        if let Err(err) = self.store.remove(SESSION_KEY) {
            tracing::warn!(error = %err, "failed to remove persisted session");
        }
        if let Some(identity) = previous {
            tracing::info!(identity_id = %identity.id, "signed out");
        }
    }

    /// The current identity, or [`Actor::Anonymous`].
    pub fn current(&self) -> Actor {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Actor::from(current.clone())
    }

    /// Edit the current identity's profile fields (never id or role).
    pub fn update_profile(
        &self,
        display_name: Option<String>,
        email: Option<String>,
    ) -> CardResult<Identity> {
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(CardError::validation(format!("invalid email '{email}'")));
            }
        }

        let updated = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let identity = current
                .as_mut()
                .ok_or_else(|| CardError::unauthorized("sign in required to update profile"))?;
            if let Some(display_name) = display_name {
                identity.display_name = display_name;
            }
            if let Some(email) = email {
                identity.email = email;
            }
            identity.clone()
        };

        self.persist(&updated);
        Ok(updated)
    }

    /// Receiver for the credential attached to outgoing remote calls.
    /// `None` while anonymous.
    pub fn credential_watch(&self) -> watch::Receiver<Option<String>> {
        self.credential_tx.subscribe()
    }

    fn set_current(&self, identity: Option<Identity>) {
        let credential = identity.as_ref().map(|i| i.credential.clone());
        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *current = identity;
        }
        self.credential_tx.send_replace(credential);
    }

    // A failed write keeps the in-memory session; it just won't survive a restart.
    fn persist(&self, identity: &Identity) {
        let record = PersistedSession {
            identity: identity.clone(),
            credential: identity.credential.clone(),
        };
        if let Err(err) = self.write_record(&record) {
            tracing::error!(error = %err, "failed to persist session");
        }
    }

    fn write_record(&self, record: &PersistedSession) -> Result<(), SessionRecordError> {
        let bytes = serde_json::to_vec(record)?;
        self.store.set(SESSION_KEY, &bytes)?;
        Ok(())
    }

    fn decode(&self, raw: &[u8]) -> Result<Identity, SessionRecordError> {
        let record: PersistedSession = serde_json::from_slice(raw)?;
        let claims = self.verifier.verify(&record.credential, Utc::now())?;

        Ok(Identity {
            id: claims.sub,
            display_name: record.identity.display_name,
            email: record.identity.email,
            role: claims.role,
            credential: record.credential,
        })
    }
}

impl core::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionStore")
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}
