//! Remote backend: maps card operations onto a request/response gateway and
//! folds transport and status failures into [`CardError`].
//!
//! The gateway is the seam between this mapping and the actual transport
//! (`HttpGateway` behind the `http` feature, or a fake in tests).

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;

use cardkeep_cards::{Card, CardDraft, CardFilter, CardPatch, LikeState, ViewerMarks};
use cardkeep_core::{CardError, CardId, CardResult};

use crate::backend::{BackendKind, CardBackend, Operation};

/// One call to the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub operation: Operation,
    pub target: Option<CardId>,
    pub payload: Value,
    /// Bearer credential of the current session, if any.
    pub credential: Option<String>,
}

/// Raw status and JSON body returned by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: Value,
}

impl GatewayResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure before any status was received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn send(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError>;
}

/// Gateway for builds without a transport: every call is a network error,
/// so the coordinator behaves as if the service were unreachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedGateway;

#[async_trait]
impl RemoteGateway for DisconnectedGateway {
    async fn send(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        Err(GatewayError::Transport(format!(
            "no transport available for {}",
            request.operation
        )))
    }
}

/// Map a non-success status to the error taxonomy.
pub fn error_for_status(status: u16, body: &Value) -> CardError {
    let message = body
        .get("error")
        .or_else(|| body.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("status {status}"));

    match status {
        400 | 422 => CardError::Validation(message),
        401 | 403 => CardError::Unauthorized(message),
        404 => CardError::NotFound(message),
        409 | 423 | 429 => CardError::Busy(message),
        _ => CardError::Unknown(message),
    }
}

impl From<GatewayError> for CardError {
    fn from(err: GatewayError) -> Self {
        CardError::Network(err.to_string())
    }
}

#[derive(serde::Deserialize)]
struct FavoriteBody {
    favorited: bool,
}

/// Card backend talking to the remote service through `G`.
pub struct RemoteBackend<G> {
    gateway: G,
    credential: watch::Receiver<Option<String>>,
}

impl<G: RemoteGateway> RemoteBackend<G> {
    /// `credential` is usually [`SessionStore::credential_watch`], so sign-in
    /// and sign-out take effect on the next call.
    ///
    /// [`SessionStore::credential_watch`]: crate::session::SessionStore::credential_watch
    pub fn new(gateway: G, credential: watch::Receiver<Option<String>>) -> Self {
        Self { gateway, credential }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: Operation,
        target: Option<&CardId>,
        payload: impl Serialize + Send,
    ) -> CardResult<T> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| CardError::unknown(format!("failed to encode {operation} request: {e}")))?;
        let request = GatewayRequest {
            operation,
            target: target.cloned(),
            payload,
            credential: self.credential.borrow().clone(),
        };

        let response = self.gateway.send(request).await.map_err(|err| {
            tracing::warn!(%operation, error = %err, "remote call failed");
            CardError::from(err)
        })?;

        if !response.is_success() {
            let err = error_for_status(response.status, &response.body);
            tracing::debug!(%operation, status = response.status, error = %err, "remote call rejected");
            return Err(err);
        }

        serde_json::from_value(response.body)
            .map_err(|e| CardError::unknown(format!("unexpected {operation} response: {e}")))
    }
}

impl<G> core::fmt::Debug for RemoteBackend<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RemoteBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl<G: RemoteGateway> CardBackend for RemoteBackend<G> {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn list(&self, filter: &CardFilter) -> CardResult<Vec<Card>> {
        self.call(Operation::List, None, filter).await
    }

    async fn get(&self, id: &CardId) -> CardResult<Card> {
        self.call(Operation::Get, Some(id), Value::Null).await
    }

    async fn create(&self, draft: CardDraft) -> CardResult<Card> {
        self.call(Operation::Create, None, draft).await
    }

    async fn update(&self, id: &CardId, patch: CardPatch) -> CardResult<Card> {
        self.call(Operation::Update, Some(id), patch).await
    }

    async fn delete(&self, id: &CardId) -> CardResult<()> {
        let _: Value = self.call(Operation::Delete, Some(id), Value::Null).await?;
        Ok(())
    }

    async fn toggle_favorite(&self, id: &CardId) -> CardResult<bool> {
        let body: FavoriteBody = self.call(Operation::ToggleFavorite, Some(id), Value::Null).await?;
        Ok(body.favorited)
    }

    async fn toggle_like(&self, id: &CardId) -> CardResult<LikeState> {
        self.call(Operation::ToggleLike, Some(id), Value::Null).await
    }

    async fn marks(&self) -> CardResult<ViewerMarks> {
        self.call(Operation::Marks, None, Value::Null).await
    }
}
