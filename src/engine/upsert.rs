//! Create-or-merge of aggregate records.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::{
    now_rfc3339, EventPaths, PartitionRouter, RecordKeyResolver, Result, UpstreamError,
};
use crate::config::KeyStrategy;
use crate::model::{EventRecord, UsageEvent};
use crate::storage::TreeStore;

/// Read-modify-write state machine behind every accepted event.
///
/// Lookup and write are separate backend calls with no compare-and-swap in
/// between, so two concurrent upserts for the same pair can both read the same
/// count and one increment is lost. Route upserts through
/// [`SingleWriter`](super::SingleWriter) when that matters.
pub struct UpsertEngine {
    store: Arc<dyn TreeStore>,
    paths: EventPaths,
    router: PartitionRouter,
    resolver: RecordKeyResolver,
}

impl UpsertEngine {
    pub fn new(
        store: Arc<dyn TreeStore>,
        paths: EventPaths,
        router: PartitionRouter,
        key_strategy: KeyStrategy,
    ) -> Self {
        let resolver = RecordKeyResolver::new(store.clone(), paths.clone(), key_strategy);
        Self {
            store,
            paths,
            router,
            resolver,
        }
    }

    /// Check an event without touching the backend.
    pub fn validate(&self, event: &UsageEvent) -> Result<()> {
        let event = event.normalized();
        event.validate()?;
        self.router.route_for(Some(&event.timestamp))?;
        Ok(())
    }

    /// Fold `event` into the record for its pair and return the persisted record.
    ///
    /// Fields are trimmed before anything else, so `" u1 "` and `"u1"` share a record.
    #[tracing::instrument(
        name = "engine.upsert",
        skip_all,
        fields(user_id = %event.user_id, action = %event.action)
    )]
    pub async fn upsert(&self, event: &UsageEvent) -> Result<EventRecord> {
        let event = &event.normalized();
        event.validate()?;
        let partition = self.router.route_for(Some(&event.timestamp))?;

        let existing = self
            .resolver
            .find_existing(&partition, &event.user_id, &event.action)
            .await?;

        match existing {
            Some((key, current)) => {
                let merged = current.merged_with(event, now_rfc3339());
                let path = self.paths.record(&partition, &key);
                self.store
                    .set(&path, encode(&merged)?)
                    .await
                    .map_err(|e| UpstreamError::new(format!("overwrite {}", path), e))?;

                debug!(
                    partition = %partition,
                    key = %key,
                    usage_count = merged.usage_count,
                    "Merged event into existing record"
                );
                Ok(merged)
            }
            None => {
                let record = EventRecord::first(event, now_rfc3339());
                let key = match self.resolver.strategy() {
                    KeyStrategy::Scan => {
                        let base = self.paths.partition(&partition);
                        self.store
                            .push(&base, encode(&record)?)
                            .await
                            .map_err(|e| UpstreamError::new(format!("push to {}", base), e))?
                    }
                    KeyStrategy::Composite => {
                        let key = super::composite_key(&event.user_id, &event.action);
                        let path = self.paths.record(&partition, &key);
                        self.store
                            .set(&path, encode(&record)?)
                            .await
                            .map_err(|e| UpstreamError::new(format!("create {}", path), e))?;
                        key
                    }
                };

                info!(partition = %partition, key = %key, "Created record");
                Ok(record)
            }
        }
    }
}

fn encode(record: &EventRecord) -> std::result::Result<Value, UpstreamError> {
    serde_json::to_value(record)
        .map_err(|e| UpstreamError::new("encode record", e.into()))
}
