//! Upsert-aggregation engine.
//!
//! Events flow through [`PartitionRouter`] (which partition), [`RecordKeyResolver`]
//! (which record) and [`UpsertEngine`] (create or merge). Reads go straight to
//! [`QueryEngine`].

mod error;
mod partition;
mod query;
mod resolver;
mod upsert;
mod writer;

pub use error::{CoreError, Result, UpstreamError, ValidationError};
pub use partition::{parse_timestamp, PartitionId, PartitionRouter};
pub use query::QueryEngine;
pub use resolver::{composite_key, RecordKeyResolver};
pub use upsert::UpsertEngine;
pub use writer::SingleWriter;

use chrono::{SecondsFormat, Utc};

use crate::storage::path::join;

/// Layout of event partitions under a root node.
#[derive(Debug, Clone)]
pub struct EventPaths {
    root: String,
}

impl EventPaths {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    /// Node whose children are the partitions.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn partition(&self, partition: &PartitionId) -> String {
        join(&[&self.root, partition.as_str()])
    }

    pub fn record(&self, partition: &PartitionId, key: &str) -> String {
        join(&[&self.root, partition.as_str(), key])
    }
}

/// Server-assigned instant, RFC 3339 in UTC with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
