//! Read side: point lookups within a partition and scans across all of them.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use super::resolver::decode_record;
use super::{EventPaths, PartitionId, PartitionRouter, Result, UpstreamError};
use crate::model::EventRecord;
use crate::storage::{BackendError, TreeStore};

/// Answers queries over stored records.
pub struct QueryEngine {
    store: Arc<dyn TreeStore>,
    paths: EventPaths,
    router: PartitionRouter,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn TreeStore>, paths: EventPaths, router: PartitionRouter) -> Self {
        Self {
            store,
            paths,
            router,
        }
    }

    /// Records in `partition` whose action is exactly `action`.
    pub async fn query_by_action(
        &self,
        partition: &PartitionId,
        action: &str,
    ) -> Result<Vec<EventRecord>> {
        let base = self.paths.partition(partition);
        let children = self
            .store
            .query_child_equal_to(&base, "action", &Value::String(action.to_string()))
            .await
            .map_err(|e| UpstreamError::new(format!("query {} by action", base), e))?;

        let records = decode_all(partition, children);
        debug!(partition = %partition, action = %action, count = records.len(), "Queried by action");
        Ok(records)
    }

    /// Records for `action` in an explicit `YYYY-MM` period, or the current one.
    pub async fn query_by_action_in_period(
        &self,
        period: Option<&str>,
        action: &str,
    ) -> Result<Vec<EventRecord>> {
        let partition = self.router.partition_for_period(period)?;
        self.query_by_action(&partition, action).await
    }

    /// Every record in `partition`.
    pub async fn query_all(&self, partition: &PartitionId) -> Result<Vec<EventRecord>> {
        Ok(self.read_partition(partition).await?)
    }

    /// Records from every partition, optionally restricted to one action.
    ///
    /// Partitions are read concurrently. A partition that cannot be read is
    /// logged and contributes nothing; failing to list the partitions fails the
    /// whole call. Results are grouped by ascending partition name.
    #[tracing::instrument(name = "engine.query_all_partitions", skip_all, fields(action = ?action))]
    pub async fn query_across_all_partitions(
        &self,
        action: Option<&str>,
    ) -> Result<Vec<EventRecord>> {
        let root = self.paths.root();
        let mut partitions = self
            .store
            .child_keys(root)
            .await
            .map_err(|e| UpstreamError::new(format!("list partitions under {}", root), e))?;
        partitions.sort();

        let reads = partitions.into_iter().map(|name| async move {
            let partition = PartitionId::from(name);
            match self.read_partition(&partition).await {
                Ok(records) => records,
                Err(e) => {
                    warn!(partition = %partition, error = %e, "Skipping unreadable partition");
                    Vec::new()
                }
            }
        });

        let records: Vec<EventRecord> = join_all(reads)
            .await
            .into_iter()
            .flatten()
            .filter(|record| action.map_or(true, |a| record.action == a))
            .collect();

        debug!(count = records.len(), "Queried across all partitions");
        Ok(records)
    }

    async fn read_partition(
        &self,
        partition: &PartitionId,
    ) -> std::result::Result<Vec<EventRecord>, UpstreamError> {
        let base = self.paths.partition(partition);
        let node = self
            .store
            .get(&base)
            .await
            .map_err(|e| UpstreamError::new(format!("read {}", base), e))?;

        match node {
            None => Ok(Vec::new()),
            Some(Value::Object(children)) => Ok(decode_all(partition, children)),
            Some(_) => Err(UpstreamError::new(
                format!("read {}", base),
                BackendError::Malformed {
                    path: base.clone(),
                    reason: "partition is not an object".to_string(),
                },
            )),
        }
    }
}

fn decode_all(
    partition: &PartitionId,
    children: impl IntoIterator<Item = (String, Value)>,
) -> Vec<EventRecord> {
    children
        .into_iter()
        .filter_map(|(key, value)| decode_record(partition.as_str(), &key, value))
        .collect()
}

#[cfg(test)]
mod tests;
