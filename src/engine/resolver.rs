//! Record key resolution.
//!
//! Finds the record that aggregates a `(user_id, action)` pair inside a partition.
//! Under [`KeyStrategy::Scan`] records live under store-assigned keys and are
//! found with an equality query on `user_id`; under [`KeyStrategy::Composite`]
//! the key is a name-based UUID of the pair, so the lookup is a single read and a
//! pair can never own two keys.

use std::sync::{Arc, LazyLock};

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{EventPaths, PartitionId, UpstreamError};
use crate::config::KeyStrategy;
use crate::model::EventRecord;
use crate::storage::TreeStore;

/// Namespace for composite record keys.
static RECORD_KEY_NAMESPACE: LazyLock<Uuid> =
    LazyLock::new(|| Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"records.actiontally"));

/// Key of the record for a pair under [`KeyStrategy::Composite`].
pub fn composite_key(user_id: &str, action: &str) -> String {
    // Unit separator: cannot be confused with content of either identifier.
    let name = format!("{}\u{1f}{}", user_id, action);
    Uuid::new_v5(&RECORD_KEY_NAMESPACE, name.as_bytes())
        .simple()
        .to_string()
}

/// Decode a stored child, logging and skipping anything that is not a record.
pub(crate) fn decode_record(partition: &str, key: &str, value: Value) -> Option<EventRecord> {
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(partition = %partition, key = %key, error = %e, "Skipping undecodable record");
            None
        }
    }
}

/// Locates the aggregate record for a pair.
pub struct RecordKeyResolver {
    store: Arc<dyn TreeStore>,
    paths: EventPaths,
    strategy: KeyStrategy,
}

impl RecordKeyResolver {
    pub fn new(store: Arc<dyn TreeStore>, paths: EventPaths, strategy: KeyStrategy) -> Self {
        Self {
            store,
            paths,
            strategy,
        }
    }

    pub fn strategy(&self) -> KeyStrategy {
        self.strategy
    }

    /// Find the record for `(user_id, action)` in `partition`.
    ///
    /// Returns the first match in the store's enumeration order. An absent
    /// partition is simply a miss.
    pub async fn find_existing(
        &self,
        partition: &PartitionId,
        user_id: &str,
        action: &str,
    ) -> Result<Option<(String, EventRecord)>, UpstreamError> {
        let found = match self.strategy {
            KeyStrategy::Scan => self.scan(partition, user_id, action).await?,
            KeyStrategy::Composite => self.keyed(partition, user_id, action).await?,
        };
        debug!(
            partition = %partition,
            user_id = %user_id,
            action = %action,
            key = ?found.as_ref().map(|(k, _)| k),
            "Resolved record key"
        );
        Ok(found)
    }

    async fn scan(
        &self,
        partition: &PartitionId,
        user_id: &str,
        action: &str,
    ) -> Result<Option<(String, EventRecord)>, UpstreamError> {
        let base = self.paths.partition(partition);
        let candidates = self
            .store
            .query_child_equal_to(&base, "user_id", &Value::String(user_id.to_string()))
            .await
            .map_err(|e| {
                UpstreamError::new(format!("look up {}/{} in {}", user_id, action, base), e)
            })?;

        Ok(candidates.into_iter().find_map(|(key, value)| {
            decode_record(partition.as_str(), &key, value)
                .filter(|record| record.is_for(user_id, action))
                .map(|record| (key, record))
        }))
    }

    async fn keyed(
        &self,
        partition: &PartitionId,
        user_id: &str,
        action: &str,
    ) -> Result<Option<(String, EventRecord)>, UpstreamError> {
        let key = composite_key(user_id, action);
        let path = self.paths.record(partition, &key);
        let value = self
            .store
            .get(&path)
            .await
            .map_err(|e| UpstreamError::new(format!("read {}", path), e))?;

        Ok(value
            .and_then(|v| decode_record(partition.as_str(), &key, v))
            .filter(|record| record.is_for(user_id, action))
            .map(|record| (key, record)))
    }
}
