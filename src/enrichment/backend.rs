// Backend lookup API: authoritative message and identity data

use crate::config::BackendConfig;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("No backend origin configured")]
    MissingOrigin,

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),
}

/// Server-side view of a message
///
/// Field aliases accept the chat server's native post shape as well.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteMessage {
    #[serde(default, alias = "user_id")]
    pub author_id: Option<String>,
    /// Epoch milliseconds
    #[serde(default, alias = "create_at")]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub root_id: Option<String>,
    #[serde(default, alias = "message")]
    pub text: Option<String>,
}

/// Display name to identity mapping returned by the name lookup
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteIdentity {
    #[serde(default, alias = "username")]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Batch lookups against the chat backend
///
/// Implementations return an error for any failed batch; callers decide how
/// to degrade.
#[allow(async_fn_in_trait)]
pub trait LookupBackend {
    /// Look up at most one batch of message ids
    async fn messages_by_id(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, RemoteMessage>, LookupError>;

    /// Look up at most one batch of display names
    async fn identities_by_name(&self, names: &[String]) -> Result<Vec<RemoteIdentity>, LookupError>;
}

/// reqwest-backed client for the lookup endpoints
pub struct HttpBackend {
    client: reqwest::Client,
    origin: String,
    messages_path: String,
    identities_path: String,
    auth_token: Option<String>,
    cookie: Option<String>,
}

impl HttpBackend {
    /// Create a client from backend settings; the origin is required
    pub fn new(config: &BackendConfig) -> Result<Self, LookupError> {
        let origin = config
            .origin
            .as_deref()
            .map(|o| o.trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .ok_or(LookupError::MissingOrigin)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            origin,
            messages_path: config.messages_path.clone(),
            identities_path: config.identities_path.clone(),
            auth_token: config.auth_token.clone(),
            cookie: config.cookie.clone(),
        })
    }

    /// Client with default paths and no credentials
    pub fn with_origin(origin: &str) -> Result<Self, LookupError> {
        Self::new(&BackendConfig {
            origin: Some(origin.to_string()),
            ..Default::default()
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    async fn post_json(&self, path: &str, body: &[String]) -> Result<Value, LookupError> {
        let url = format!("{}{}", self.origin, path);

        let mut request = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("User-Agent", "chat-harvest")
            .json(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        if let Some(cookie) = &self.cookie {
            request = request.header("Cookie", cookie);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))
    }
}

impl LookupBackend for HttpBackend {
    async fn messages_by_id(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, RemoteMessage>, LookupError> {
        let data = self.post_json(&self.messages_path, ids).await?;
        parse_message_map(data)
    }

    async fn identities_by_name(&self, names: &[String]) -> Result<Vec<RemoteIdentity>, LookupError> {
        let data = self.post_json(&self.identities_path, names).await?;
        parse_identities(data)
    }
}

/// Decode `{ id: message }`, also accepting a `{ "posts": { ... } }` wrapper
fn parse_message_map(data: Value) -> Result<HashMap<String, RemoteMessage>, LookupError> {
    let Value::Object(mut entries) = data else {
        return Err(LookupError::Decode("expected a JSON object".to_string()));
    };

    if let Some(Value::Object(posts)) = entries.remove("posts") {
        entries = posts;
    }

    let mut messages = HashMap::with_capacity(entries.len());
    for (id, value) in entries {
        match serde_json::from_value::<RemoteMessage>(value) {
            Ok(message) => {
                messages.insert(id, message);
            }
            Err(e) => log::debug!("[Enrich] Skipping undecodable message {}: {}", id, e),
        }
    }
    Ok(messages)
}

/// Decode `[ { name, id } ]`, skipping entries that are not identities
fn parse_identities(data: Value) -> Result<Vec<RemoteIdentity>, LookupError> {
    let Value::Array(entries) = data else {
        return Err(LookupError::Decode("expected a JSON array".to_string()));
    };

    Ok(entries
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RemoteIdentity>(value) {
            Ok(identity) => Some(identity),
            Err(e) => {
                log::debug!("[Enrich] Skipping undecodable identity: {}", e);
                None
            }
        })
        .collect())
}
