//! Firebase Realtime Database tree store.
//!
//! Talks to the database through its REST API: every node is addressable as
//! `<database_url>/<path>.json`.
//!
//! | Operation              | Request                                          |
//! |------------------------|--------------------------------------------------|
//! | `get`                  | `GET`                                            |
//! | `set`                  | `PUT`                                            |
//! | `update`               | `PATCH`                                          |
//! | `push`                 | `POST`, key returned as `{"name": ...}`          |
//! | `query_child_equal_to` | `GET ?orderBy="<field>"&equalTo=<json value>`    |
//! | `child_keys`           | `GET ?shallow=true`                              |
//!
//! Equality queries are served by an `.indexOn` rule for the queried field (see
//! `database.rules.json`). Without one Firebase answers 400 and the adapter falls
//! back to reading the whole node and filtering it locally.
//!
//! Filtered and shallow responses are JSON objects without a defined order, so
//! children are returned sorted by key. Push keys are time-ordered, which makes that
//! insertion order for records created through `push`.

use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::path::{is_valid_key, join, segments};
use super::{BackendError, Result, TreeStore};
use crate::config::FirebaseConfig;
use crate::utils::retry::{connection_backoff, is_transient};

/// Firebase Realtime Database over REST.
pub struct FirebaseTreeStore {
    client: Client,
    base_url: String,
    /// Query parameters carried by the configured URL, e.g. the emulator's `ns`.
    base_query: Vec<(String, String)>,
    auth_token: Option<String>,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl FirebaseTreeStore {
    /// Create a store for the configured database.
    ///
    /// No request is made; call [`probe`](Self::probe) to verify connectivity.
    pub fn new(config: &FirebaseConfig) -> Result<Self> {
        if config.database_url.is_empty() {
            return Err(BackendError::Unavailable(
                "Firebase database_url not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let (base_url, base_query) = match config.database_url.split_once('?') {
            Some((base, query)) => (base, parse_query(query)),
            None => (config.database_url.as_str(), Vec::new()),
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            base_query,
            auth_token: config.auth_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Check that the database answers, retrying transient failures with backoff.
    pub async fn probe(&self) -> Result<()> {
        (|| async { self.child_keys("").await.map(|_| ()) })
            .retry(connection_backoff())
            .when(is_transient)
            .notify(|err, delay| {
                warn!(error = %err, delay = ?delay, "Firebase not reachable, retrying");
            })
            .await?;
        info!(url = %self.base_url, "Connected to Firebase Realtime Database");
        Ok(())
    }

    /// URL of the node at `path`.
    fn url(&self, path: &str) -> Result<String> {
        if let Some(bad) = segments(path).into_iter().find(|s| !is_valid_key(s)) {
            return Err(BackendError::InvalidPath(format!(
                "segment {:?} in {:?}",
                bad, path
            )));
        }
        Ok(format!("{}/{}.json", self.base_url, join(&[path])))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let mut builder = self.client.request(method, self.url(path)?);
        if !self.base_query.is_empty() {
            builder = builder.query(&self.base_query);
        }
        if let Some(token) = &self.auth_token {
            builder = builder.query(&[("auth", token.as_str())]);
        }
        Ok(builder)
    }

    /// Send a request, turning non-success statuses into `BackendError::Status`.
    async fn send(builder: RequestBuilder, path: &str) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or_else(|_| body.chars().take(200).collect());
        warn!(path = %path, status = %status, message = %message, "Firebase request failed");
        Err(BackendError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn read_json(response: Response) -> Result<Value> {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Equality filter over a full read of `base`, for databases without an index.
    async fn scan_child_equal_to(
        &self,
        base: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>> {
        let node = self.get(base).await?.unwrap_or(Value::Null);
        Ok(into_children(base, node)?
            .into_iter()
            .filter(|(_, child)| child.get(field) == Some(value))
            .collect())
    }
}

/// Firebase answers 400 "Index not defined" to `orderBy` on an unindexed field.
fn is_missing_index(err: &BackendError) -> bool {
    matches!(
        err,
        BackendError::Status { status: 400, message } if message.contains("Index not defined")
    )
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Flatten a collection node into `(key, child)` pairs sorted by key.
///
/// Firebase renders nodes whose keys are all small integers as JSON arrays, with
/// `null` in the gaps.
fn into_children(path: &str, node: Value) -> Result<Vec<(String, Value)>> {
    let mut children: Vec<(String, Value)> = match node {
        Value::Null => Vec::new(),
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        other => {
            return Err(BackendError::Malformed {
                path: path.to_string(),
                reason: format!("expected a collection, got {}", other),
            })
        }
    };
    children.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(children)
}

#[async_trait]
impl TreeStore for FirebaseTreeStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let response = Self::send(self.request(Method::GET, path)?, path).await?;
        let value = Self::read_json(response).await?;
        debug!(path = %path, "firebase get");
        Ok(Some(value).filter(|v| !v.is_null()))
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        let builder = self.request(Method::PUT, path)?.json(&value);
        Self::send(builder, path).await?;
        debug!(path = %path, "firebase set");
        Ok(())
    }

    async fn update(&self, path: &str, partial: Map<String, Value>) -> Result<()> {
        let builder = self.request(Method::PATCH, path)?.json(&partial);
        Self::send(builder, path).await?;
        debug!(path = %path, "firebase update");
        Ok(())
    }

    async fn push(&self, base: &str, value: Value) -> Result<String> {
        let builder = self.request(Method::POST, base)?.json(&value);
        let response = Self::send(builder, base).await?;
        let pushed: PushResponse =
            serde_json::from_value(Self::read_json(response).await?).map_err(|e| {
                BackendError::Malformed {
                    path: base.to_string(),
                    reason: format!("push response: {}", e),
                }
            })?;
        debug!(base = %base, key = %pushed.name, "firebase push");
        Ok(pushed.name)
    }

    async fn query_child_equal_to(
        &self,
        base: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>> {
        let order_by = serde_json::to_string(field)?;
        let equal_to = serde_json::to_string(value)?;
        let builder = self
            .request(Method::GET, base)?
            .query(&[("orderBy", order_by.as_str()), ("equalTo", equal_to.as_str())]);

        let response = match Self::send(builder, base).await {
            Ok(response) => response,
            Err(e) if is_missing_index(&e) => {
                warn!(
                    path = %base,
                    field = %field,
                    "No .indexOn rule for field, filtering the full node instead"
                );
                return self.scan_child_equal_to(base, field, value).await;
            }
            Err(e) => return Err(e),
        };
        let node = Self::read_json(response).await?;
        into_children(base, node)
    }

    async fn child_keys(&self, path: &str) -> Result<Vec<String>> {
        let builder = self
            .request(Method::GET, path)?
            .query(&[("shallow", "true")]);
        let response = Self::send(builder, path).await?;
        let node = Self::read_json(response).await?;
        Ok(into_children(path, node)?
            .into_iter()
            .map(|(k, _)| k)
            .collect())
    }

    fn name(&self) -> &str {
        "firebase"
    }
}
