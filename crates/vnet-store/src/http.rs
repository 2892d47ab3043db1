//! HTTP adapter for the remote resource store.
//!
//! Each primitive is a JSON `POST {base_url}/{method}` whose body names the
//! call target, the credential, and the parameters (type tag plus fields):
//!
//! ```text
//! POST /walk   {"target": "7c1f/switch-agent", "cid": "...", "params": {"tid": "compute.vswitch"}}
//! 200          {"children": [{"tid": "compute.vswitch", "id": "...", "name": "demo"}]}
//! ```
//!
//! Non-success responses carry `{"error": "..."}`, surfaced as
//! `StoreError::Rejected` with the store's message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vnet_core::ResourceKind;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::types::{Fields, Resource, Scope};
use crate::{StoreDeleter, StoreReader, StoreWriter};

/// Target used for mux-published resources.
const MUX_TARGET: &str = "0";

/// HTTP client for the resource store.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    config: StoreConfig,
}

/// Request body shared by all four primitives.
#[derive(Debug, Serialize)]
struct CallRequest<'a> {
    target: String,
    cid: &'a str,
    params: Fields,
}

/// Response of `walk`.
#[derive(Debug, Deserialize)]
struct WalkResponse {
    #[serde(default)]
    children: Vec<Value>,
}

/// Error response from the store.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl HttpStore {
    /// Create a new store client.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transport` if the HTTP client cannot be built.
    pub fn new(config: StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create a new store client with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: StoreConfig) -> Self {
        Self { client, config }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Resolve the wire target for a scope.
    #[must_use]
    pub fn target(&self, scope: &Scope) -> String {
        match scope {
            Scope::Agent => self.config.agent_target(),
            Scope::Switch(id) => id.to_string(),
            Scope::Mux => MUX_TARGET.to_string(),
        }
    }

    async fn invoke(
        &self,
        method: &str,
        scope: &Scope,
        kind: ResourceKind,
        mut params: Fields,
    ) -> Result<Option<Value>> {
        let url = format!("{}/{method}", self.config.base_url.trim_end_matches('/'));
        params.insert("tid".to_string(), Value::String(kind.tag().to_string()));

        let request = CallRequest {
            target: self.target(scope),
            cid: &self.config.credential,
            params,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("{method} request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await.map_err(|e| {
                StoreError::Transport(format!("failed to read {method} response: {e}"))
            })?;
            if body.is_empty() {
                return Ok(None);
            }
            let value = serde_json::from_slice(&body).map_err(|e| {
                StoreError::Serialization(format!("invalid {method} response: {e}"))
            })?;
            return Ok(Some(value));
        }

        if status == reqwest::StatusCode::NOT_FOUND && method == "get" {
            return Ok(None);
        }

        let error = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("store returned status {status}"));

        tracing::error!(
            method,
            scope = %scope,
            kind = %kind,
            status = %status,
            error = %error,
            "Store call failed"
        );

        Err(StoreError::Rejected(error))
    }

    /// Decode one row, filling in the type tag when the store leaves it out.
    fn decode_row(kind: ResourceKind, value: Value) -> Result<Resource> {
        let Value::Object(mut map) = value else {
            return Err(StoreError::Unknown);
        };
        map.entry("tid")
            .or_insert_with(|| Value::String(kind.tag().to_string()));
        serde_json::from_value(Value::Object(map))
            .map_err(|e| StoreError::Serialization(format!("invalid {kind} record: {e}")))
    }
}

#[async_trait]
impl StoreReader for HttpStore {
    async fn walk(&self, scope: &Scope, kind: ResourceKind) -> Result<Vec<Resource>> {
        let value = self
            .invoke("walk", scope, kind, Fields::new())
            .await?
            .ok_or(StoreError::Unknown)?;
        let response: WalkResponse = serde_json::from_value(value)
            .map_err(|e| StoreError::Serialization(format!("invalid walk response: {e}")))?;

        response
            .children
            .into_iter()
            .map(|child| Self::decode_row(kind, child))
            .collect()
    }

    async fn get(&self, scope: &Scope, kind: ResourceKind, id: &str) -> Result<Option<Resource>> {
        let value = self
            .invoke("get", scope, kind, crate::types::id_selector(id))
            .await?;
        value.map(|v| Self::decode_row(kind, v)).transpose()
    }
}

#[async_trait]
impl StoreWriter for HttpStore {
    async fn set(&self, scope: &Scope, kind: ResourceKind, fields: Fields) -> Result<Resource> {
        let value = self
            .invoke("set", scope, kind, fields)
            .await?
            .ok_or(StoreError::Unknown)?;
        let resource = Self::decode_row(kind, value)?;

        tracing::debug!(scope = %scope, kind = %kind, id = %resource.id, "Stored resource");
        Ok(resource)
    }
}

#[async_trait]
impl StoreDeleter for HttpStore {
    async fn delete(&self, scope: &Scope, kind: ResourceKind, selector: Fields) -> Result<()> {
        self.invoke("delete", scope, kind, selector).await?;
        tracing::debug!(scope = %scope, kind = %kind, "Deleted resource");
        Ok(())
    }
}
