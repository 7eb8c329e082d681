//! Service facade wiring the engine to a store according to configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::{LedgerConfig, WriteMode};
use crate::engine::{
    EventPaths, PartitionRouter, QueryEngine, Result, SingleWriter, UpsertEngine,
};
use crate::model::{EventRecord, UsageEvent};
use crate::storage::TreeStore;
use crate::users::UserDirectory;

enum Writer {
    Direct(Arc<UpsertEngine>),
    Queued(SingleWriter),
}

/// Everything the HTTP layer needs, built once at startup.
pub struct Ledger {
    writer: Writer,
    queries: QueryEngine,
    users: UserDirectory,
}

impl Ledger {
    /// Build the ledger over `store`.
    ///
    /// In single-writer mode this spawns the shard workers, so it must run
    /// inside a Tokio runtime.
    pub fn new(store: Arc<dyn TreeStore>, config: &LedgerConfig) -> Self {
        let paths = EventPaths::new(config.events_root.clone());
        let router = PartitionRouter::from_config(config);

        let engine = Arc::new(UpsertEngine::new(
            store.clone(),
            paths.clone(),
            router.clone(),
            config.key_strategy,
        ));
        let writer = match config.write_mode {
            WriteMode::Direct => Writer::Direct(engine),
            WriteMode::SingleWriter => Writer::Queued(SingleWriter::spawn(
                engine,
                config.writer_shards,
                config.writer_queue_depth,
            )),
        };

        info!(
            store = store.name(),
            partitioning = ?config.partitioning,
            key_strategy = ?config.key_strategy,
            write_mode = ?config.write_mode,
            "Ledger ready"
        );

        Self {
            writer,
            queries: QueryEngine::new(store.clone(), paths, router),
            users: UserDirectory::new(store, config.users_root.clone()),
        }
    }

    /// Accept one usage event and return the updated aggregate.
    pub async fn record_event(&self, event: UsageEvent) -> Result<EventRecord> {
        match &self.writer {
            Writer::Direct(engine) => engine.upsert(&event).await,
            Writer::Queued(writer) => writer.submit(event).await,
        }
    }

    pub fn queries(&self) -> &QueryEngine {
        &self.queries
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }
}
