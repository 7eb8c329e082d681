//! In-memory tree store.
//!
//! Keeps the whole tree as a single JSON value and applies Firebase semantics to it:
//! `null` and empty objects are never stored, so writing either removes the node and
//! any ancestors it leaves empty. Children keep insertion order.
//!
//! Faults and latency can be injected for tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use super::path::{is_valid_key, segments};
use super::{BackendError, Result, TreeStore};

/// In-memory tree store.
#[derive(Default)]
pub struct MemoryTreeStore {
    root: RwLock<Value>,
    push_sequence: AtomicU64,
    fail_reads_under: RwLock<Vec<String>>,
    fail_on_write: RwLock<bool>,
    unavailable: RwLock<bool>,
    latency: RwLock<Option<Duration>>,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read at or below `prefix` fail.
    pub async fn fail_reads_under(&self, prefix: &str) {
        self.fail_reads_under
            .write()
            .await
            .push(segments(prefix).join("/"));
    }

    pub async fn clear_read_failures(&self) {
        self.fail_reads_under.write().await.clear();
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    /// Simulate a total outage: every call fails.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    /// Delay every call by `latency` before it touches the tree.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().await = latency;
    }

    /// Copy of the whole tree.
    pub async fn snapshot(&self) -> Value {
        self.root.read().await.clone()
    }

    async fn before_call(&self) -> Result<()> {
        let latency = *self.latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if *self.unavailable.read().await {
            return Err(BackendError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    async fn before_read(&self, path: &str) -> Result<()> {
        self.before_call().await?;
        let normalized = segments(path).join("/");
        let failing = self.fail_reads_under.read().await;
        if failing
            .iter()
            .any(|prefix| is_at_or_below(&normalized, prefix))
        {
            return Err(BackendError::Status {
                status: 500,
                message: format!("injected read failure at {}", normalized),
            });
        }
        Ok(())
    }

    async fn before_write(&self) -> Result<()> {
        self.before_call().await?;
        if *self.fail_on_write.read().await {
            return Err(BackendError::Status {
                status: 500,
                message: "injected write failure".to_string(),
            });
        }
        Ok(())
    }

    /// Time-ordered unique key, in the spirit of Firebase push ids.
    fn next_push_key(&self) -> String {
        let seq = self.push_sequence.fetch_add(1, Ordering::SeqCst);
        format!("{:012x}{:08x}", Utc::now().timestamp_millis(), seq)
    }
}

fn is_at_or_below(path: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || path == prefix
        || (path.starts_with(prefix) && path[prefix.len()..].starts_with('/'))
}

fn validate_segments(path: &str) -> Result<Vec<&str>> {
    let segs = segments(path);
    match segs.iter().find(|s| !is_valid_key(s)) {
        Some(bad) => Err(BackendError::InvalidPath(format!(
            "segment {:?} in {:?}",
            bad, path
        ))),
        None => Ok(segs),
    }
}

/// Strip `null` fields and empty objects, the way Firebase stores values.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if cleaned.is_empty() {
                Value::Null
            } else {
                Value::Object(cleaned)
            }
        }
        other => other,
    }
}

fn read_node<'a>(node: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    segs.iter().try_fold(node, |current, seg| current.get(*seg))
}

fn write_node(node: &mut Value, segs: &[&str], value: Value) {
    let Some((head, rest)) = segs.split_first() else {
        *node = value;
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    if let Some(children) = node.as_object_mut() {
        if value.is_null() && !children.contains_key(*head) {
            return;
        }
        let child = children.entry(head.to_string()).or_insert(Value::Null);
        write_node(child, rest, value);
        let prune = child.is_null() || child.as_object().is_some_and(|m| m.is_empty());
        if prune {
            children.retain(|k, _| k != head);
        }
    }

    if node.as_object().is_some_and(|m| m.is_empty()) {
        *node = Value::Null;
    }
}

#[async_trait]
impl TreeStore for MemoryTreeStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        self.before_read(path).await?;
        let segs = validate_segments(path)?;
        let root = self.root.read().await;
        Ok(read_node(&root, &segs)
            .filter(|v| !v.is_null())
            .cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        self.before_write().await?;
        let segs = validate_segments(path)?;
        let mut root = self.root.write().await;
        write_node(&mut root, &segs, normalize(value));
        debug!(path = %path, "memory set");
        Ok(())
    }

    async fn update(&self, path: &str, partial: Map<String, Value>) -> Result<()> {
        self.before_write().await?;
        let base = validate_segments(path)?;
        let mut root = self.root.write().await;
        for (field, value) in partial {
            let mut segs = base.clone();
            segs.extend(validate_segments(&field)?);
            write_node(&mut root, &segs, normalize(value));
        }
        debug!(path = %path, "memory update");
        Ok(())
    }

    async fn push(&self, base: &str, value: Value) -> Result<String> {
        self.before_write().await?;
        let mut segs = validate_segments(base)?;
        let key = self.next_push_key();
        segs.push(&key);
        let mut root = self.root.write().await;
        write_node(&mut root, &segs, normalize(value));
        debug!(base = %base, key = %key, "memory push");
        Ok(key)
    }

    async fn query_child_equal_to(
        &self,
        base: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>> {
        self.before_read(base).await?;
        let segs = validate_segments(base)?;
        let root = self.root.read().await;
        let Some(Value::Object(children)) = read_node(&root, &segs) else {
            return Ok(Vec::new());
        };
        Ok(children
            .iter()
            .filter(|(_, child)| child.get(field) == Some(value))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
