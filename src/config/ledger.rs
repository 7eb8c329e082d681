//! Aggregation engine configuration.

use serde::Deserialize;

/// How events are split into partitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partitioning {
    /// One partition per calendar month of the event timestamp (`YYYY-MM`).
    #[default]
    Monthly,
    /// Every event lands in the same partition.
    Single,
}

/// How the storage key of an aggregate record is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Store-assigned keys; existing records are found with an equality query.
    #[default]
    Scan,
    /// Key derived from `(user_id, action)`; lookups are single keyed reads.
    Composite,
}

/// How concurrent upserts are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Each request runs its own read-modify-write. Same-pair concurrent upserts
    /// can lose increments.
    #[default]
    Direct,
    /// Upserts are funneled through per-key single-writer queues.
    SingleWriter,
}

/// Ledger configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Root path under which partitions are stored.
    pub events_root: String,
    /// Root path under which user profiles are stored.
    pub users_root: String,
    /// Partitioning scheme.
    pub partitioning: Partitioning,
    /// Partition name used by `Partitioning::Single`.
    pub single_partition: String,
    /// Record key strategy.
    pub key_strategy: KeyStrategy,
    /// Concurrency policy for upserts.
    pub write_mode: WriteMode,
    /// Number of single-writer shards (only used by `WriteMode::SingleWriter`).
    pub writer_shards: usize,
    /// Queue depth per shard.
    pub writer_queue_depth: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            events_root: "events".to_string(),
            users_root: "users".to_string(),
            partitioning: Partitioning::Monthly,
            single_partition: "all".to_string(),
            key_strategy: KeyStrategy::Scan,
            write_mode: WriteMode::Direct,
            writer_shards: 8,
            writer_queue_depth: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_config_default() {
        let ledger = LedgerConfig::default();
        assert_eq!(ledger.events_root, "events");
        assert_eq!(ledger.users_root, "users");
        assert_eq!(ledger.partitioning, Partitioning::Monthly);
        assert_eq!(ledger.key_strategy, KeyStrategy::Scan);
        assert_eq!(ledger.write_mode, WriteMode::Direct);
        assert_eq!(ledger.writer_shards, 8);
    }
}
