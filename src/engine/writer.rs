//! Sharded single-writer queue.
//!
//! Every pair hashes to one shard and each shard applies its upserts one at a
//! time, so increments for a pair are never lost within this process. Distinct
//! pairs on different shards proceed in parallel.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::{Result, UpsertEngine, UpstreamError};
use crate::model::{EventRecord, UsageEvent};
use crate::storage::BackendError;

struct WriteJob {
    event: UsageEvent,
    reply: oneshot::Sender<Result<EventRecord>>,
}

/// Front of the shard workers.
///
/// Workers stop once every clone of the queue senders is dropped, i.e. when the
/// `SingleWriter` is dropped.
pub struct SingleWriter {
    engine: Arc<UpsertEngine>,
    shards: Vec<mpsc::Sender<WriteJob>>,
}

impl SingleWriter {
    /// Spawn `shards` workers, each with a queue of `queue_depth` pending events.
    ///
    /// Must be called from within a Tokio runtime. Zero values are raised to one.
    pub fn spawn(engine: Arc<UpsertEngine>, shards: usize, queue_depth: usize) -> Self {
        let shards = shards.max(1);
        let senders = (0..shards)
            .map(|shard| {
                let (tx, rx) = mpsc::channel(queue_depth.max(1));
                tokio::spawn(run_shard(shard, engine.clone(), rx));
                tx
            })
            .collect();

        info!(shards, queue_depth, "Single-writer queue started");

        Self {
            engine,
            shards: senders,
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard owning the pair.
    pub fn shard_for(&self, user_id: &str, action: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        (user_id, action).hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Queue `event` on its shard and wait for the persisted record.
    ///
    /// Invalid events are rejected here and never queued. Once queued, the
    /// upsert is applied even if the caller stops waiting.
    pub async fn submit(&self, event: UsageEvent) -> Result<EventRecord> {
        let event = event.normalized();
        self.engine.validate(&event)?;

        let shard = self.shard_for(&event.user_id, &event.action);
        let (reply, response) = oneshot::channel();

        self.shards[shard]
            .send(WriteJob { event, reply })
            .await
            .map_err(|_| queue_closed(shard))?;

        response.await.map_err(|_| queue_closed(shard))?
    }
}

async fn run_shard(shard: usize, engine: Arc<UpsertEngine>, mut jobs: mpsc::Receiver<WriteJob>) {
    while let Some(job) = jobs.recv().await {
        let result = engine.upsert(&job.event).await;
        if job.reply.send(result).is_err() {
            debug!(shard, "Caller went away before the upsert completed");
        }
    }
    debug!(shard, "Writer shard stopped");
}

fn queue_closed(shard: usize) -> UpstreamError {
    UpstreamError::new(
        format!("enqueue on writer shard {}", shard),
        BackendError::Unavailable("writer shard stopped".to_string()),
    )
}
