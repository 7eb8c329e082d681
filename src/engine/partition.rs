//! Partition routing.
//!
//! Records are partitioned by the calendar month of the event timestamp, so a
//! pair accumulates one record per month. Routing is a pure function of the
//! timestamp; only a missing timestamp consults the clock.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::ValidationError;
use crate::config::{LedgerConfig, Partitioning};

/// Name of a partition (`YYYY-MM`, or the static name of the single partition).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId(String);

impl PartitionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A partition name as enumerated from the store.
impl From<String> for PartitionId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps event timestamps to partitions.
#[derive(Debug, Clone)]
pub struct PartitionRouter {
    scheme: Partitioning,
    single_partition: String,
}

impl Default for PartitionRouter {
    fn default() -> Self {
        Self::monthly()
    }
}

impl PartitionRouter {
    /// One partition per calendar month.
    pub fn monthly() -> Self {
        Self {
            scheme: Partitioning::Monthly,
            single_partition: String::new(),
        }
    }

    /// Every event routes to `name`.
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            scheme: Partitioning::Single,
            single_partition: name.into(),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        match config.partitioning {
            Partitioning::Monthly => Self::monthly(),
            Partitioning::Single => Self::single(config.single_partition.clone()),
        }
    }

    /// Partition for an event timestamp, or for the current instant when absent.
    ///
    /// A malformed timestamp is an error under every scheme.
    pub fn route_for(&self, timestamp: Option<&str>) -> Result<PartitionId, ValidationError> {
        let at = match timestamp {
            Some(raw) => parse_timestamp(raw)?,
            None => Utc::now(),
        };
        Ok(self.route_instant(at))
    }

    /// Partition containing `at`.
    pub fn route_instant(&self, at: DateTime<Utc>) -> PartitionId {
        match self.scheme {
            Partitioning::Monthly => PartitionId(at.format("%Y-%m").to_string()),
            Partitioning::Single => PartitionId(self.single_partition.clone()),
        }
    }

    /// Partition for the current instant.
    pub fn current(&self) -> PartitionId {
        self.route_instant(Utc::now())
    }

    /// Partition named by an explicit `YYYY-MM` period, or the current one.
    ///
    /// The single-partition scheme validates the period and then ignores it.
    pub fn partition_for_period(
        &self,
        period: Option<&str>,
    ) -> Result<PartitionId, ValidationError> {
        let Some(period) = period else {
            return Ok(self.current());
        };
        let period = period.trim();
        if !is_month_period(period) {
            return Err(ValidationError::MalformedPeriod(period.to_string()));
        }
        match self.scheme {
            Partitioning::Monthly => Ok(PartitionId(period.to_string())),
            Partitioning::Single => Ok(PartitionId(self.single_partition.clone())),
        }
    }
}

fn is_month_period(period: &str) -> bool {
    period.len() == 7
        && NaiveDate::parse_from_str(&format!("{}-01", period), "%Y-%m-%d")
            .is_ok_and(|d| d.format("%Y-%m").to_string() == period)
}

/// Parse an ISO-8601 instant.
///
/// Accepts RFC 3339 (`Z` or `±HH:MM`), a compact `±HHMM` offset, and timestamps
/// with no designator, which are read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| ValidationError::MalformedTimestamp {
            value: raw.to_string(),
            reason: e.to_string(),
        })
}
