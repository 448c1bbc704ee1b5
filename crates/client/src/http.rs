//! HTTP transport for [`RemoteBackend`](crate::remote::RemoteBackend).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;

use crate::backend::Operation;
use crate::remote::{GatewayError, GatewayRequest, GatewayResponse, RemoteGateway};

/// JSON-over-HTTP gateway with bearer authentication.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn route(&self, request: &GatewayRequest) -> Result<(Method, String), GatewayError> {
        let base = &self.base_url;
        let target = || {
            request
                .target
                .as_ref()
                .ok_or_else(|| GatewayError::Transport(format!("{} requires a card id", request.operation)))
        };

        Ok(match request.operation {
            Operation::List => (Method::GET, format!("{base}/cards")),
            Operation::Get => (Method::GET, format!("{base}/cards/{}", target()?)),
            Operation::Create => (Method::POST, format!("{base}/cards")),
            Operation::Update => (Method::PATCH, format!("{base}/cards/{}", target()?)),
            Operation::Delete => (Method::DELETE, format!("{base}/cards/{}", target()?)),
            Operation::ToggleFavorite => (Method::POST, format!("{base}/cards/{}/favorite", target()?)),
            Operation::ToggleLike => (Method::POST, format!("{base}/cards/{}/like", target()?)),
            Operation::Marks => (Method::GET, format!("{base}/me/marks")),
        })
    }
}

/// Filter fields become query parameters on `GET /cards`.
fn list_query(payload: &Value) -> Vec<(String, String)> {
    let Some(fields) = payload.as_object() else {
        return Vec::new();
    };
    fields
        .iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key.clone(), s.clone())),
            Value::Bool(true) => Some((key.clone(), "true".to_string())),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn send(&self, request: GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let (method, url) = self.route(&request)?;
        let mut req = self.client.request(method.clone(), &url);

        if let Some(token) = &request.credential {
            req = req.bearer_auth(token);
        }
        req = match request.operation {
            Operation::List => req.query(&list_query(&request.payload)),
            Operation::Create | Operation::Update => req.json(&request.payload),
            _ => req,
        };

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Transport(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(|e| GatewayError::Transport(e.to_string()))?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        tracing::debug!(%method, %url, status, "remote request completed");
        Ok(GatewayResponse { status, body })
    }
}
