//! Tree-structured document storage.
//!
//! The ledger persists everything through [`TreeStore`]: a remote store where every
//! node is addressed by a slash-separated path (`events/2024-03/<key>`) and holds a
//! JSON value. The trait mirrors the primitives of a Firebase Realtime Database:
//! reads and full overwrites by path, field merges, pushes with store-assigned keys
//! and single-field equality queries over the children of a node.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::config::{BackendConfig, BackendType};

#[cfg(feature = "firebase")]
pub mod firebase;
pub mod memory;
pub mod path;

#[cfg(feature = "firebase")]
pub use firebase::FirebaseTreeStore;
pub use memory::MemoryTreeStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors reported by a [`TreeStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// HTTP transport failed (connect, timeout, TLS).
    #[cfg(feature = "firebase")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("Backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// A value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store answered, but not with what the protocol promises.
    #[error("Malformed response at {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// A path was rejected before reaching the store.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The store cannot be reached at all.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Interface to a tree-structured document store.
///
/// Implementations:
/// - `MemoryTreeStore`: in-process tree, used for tests and local development
/// - `FirebaseTreeStore`: Firebase Realtime Database over its REST API
///
/// Children of a node are enumerated in the store's native order. For both
/// implementations that is ascending key order for store-assigned keys, which are
/// time-ordered.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Read the subtree at `path`. Returns `None` when nothing is stored there.
    async fn get(&self, path: &str) -> Result<Option<Value>>;

    /// Overwrite the value at `path`. Writing `null` removes the node.
    async fn set(&self, path: &str, value: Value) -> Result<()>;

    /// Merge the fields of `partial` into the object at `path`.
    ///
    /// Fields absent from `partial` are left untouched; a `null` field removes that
    /// child.
    async fn update(&self, path: &str, partial: serde_json::Map<String, Value>) -> Result<()>;

    /// Create a new child under `base` with a store-assigned unique key.
    ///
    /// Returns the assigned key (not the full path).
    async fn push(&self, base: &str, value: Value) -> Result<String>;

    /// Children of `base` whose `field` equals `value` exactly.
    ///
    /// An absent `base` yields an empty result, not an error.
    async fn query_child_equal_to(
        &self,
        base: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>>;

    /// Names of the direct children of `path`.
    ///
    /// The default reads the whole subtree; implementations with a cheaper
    /// enumeration should override it.
    async fn child_keys(&self, path: &str) -> Result<Vec<String>> {
        match self.get(path).await? {
            None => Ok(Vec::new()),
            Some(Value::Object(children)) => Ok(children.keys().cloned().collect()),
            Some(_) => Err(BackendError::Malformed {
                path: path.to_string(),
                reason: "expected an object node".to_string(),
            }),
        }
    }

    /// Short implementation name for logging.
    fn name(&self) -> &str;
}

/// Initialize the tree store selected by configuration.
pub async fn init_backend(config: &BackendConfig) -> Result<Arc<dyn TreeStore>> {
    match config.backend_type {
        BackendType::Memory => {
            info!("Storage: in-memory tree store");
            Ok(Arc::new(MemoryTreeStore::new()))
        }
        #[cfg(feature = "firebase")]
        BackendType::Firebase => {
            info!(url = %config.firebase.database_url, "Storage: Firebase Realtime Database");
            let store = FirebaseTreeStore::new(&config.firebase)?;
            store.probe().await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "firebase"))]
        BackendType::Firebase => {
            tracing::error!("Firebase storage requested but 'firebase' feature is not enabled");
            Err(BackendError::Unavailable(
                "firebase feature not enabled".to_string(),
            ))
        }
    }
}
