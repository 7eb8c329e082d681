//! Wire and storage types.

use serde::{Deserialize, Serialize};

use crate::engine::ValidationError;
use crate::storage::path::is_valid_key;

/// A usage event as submitted by a client.
///
/// Fields default to empty so that a payload missing a field is reported by
/// [`validate`](Self::validate) rather than by the deserializer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageEvent {
    pub user_id: String,
    pub action: String,
    /// ISO-8601 instant at which the client observed the action.
    pub timestamp: String,
    pub client_id: String,
}

impl UsageEvent {
    pub fn new(
        user_id: impl Into<String>,
        action: impl Into<String>,
        timestamp: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            action: action.into(),
            timestamp: timestamp.into(),
            client_id: client_id.into(),
        }
    }

    /// Copy with surrounding whitespace removed from every field.
    ///
    /// Routing, key resolution and the stored record all see this form.
    pub fn normalized(&self) -> Self {
        Self {
            user_id: self.user_id.trim().to_string(),
            action: self.action.trim().to_string(),
            timestamp: self.timestamp.trim().to_string(),
            client_id: self.client_id.trim().to_string(),
        }
    }

    /// Check that every field is present.
    ///
    /// The timestamp format is checked when the event is routed to a partition.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("user_id", &self.user_id)?;
        require("action", &self.action)?;
        require("timestamp", &self.timestamp)?;
        require("client_id", &self.client_id)?;
        Ok(())
    }
}

/// Aggregate of every occurrence of one `(user_id, action)` pair within a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub user_id: String,
    pub action: String,
    /// Client that reported the most recent occurrence.
    #[serde(default)]
    pub client_id: String,
    /// Client-supplied instant of the most recent occurrence.
    pub timestamp: String,
    /// Number of occurrences folded into this record.
    ///
    /// Raw events written before aggregation existed carry no counter and count
    /// as a single occurrence.
    #[serde(default = "single_occurrence")]
    pub usage_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

fn single_occurrence() -> u64 {
    1
}

impl EventRecord {
    /// First occurrence of a pair.
    pub fn first(event: &UsageEvent, now: String) -> Self {
        Self {
            user_id: event.user_id.clone(),
            action: event.action.clone(),
            client_id: event.client_id.clone(),
            timestamp: event.timestamp.clone(),
            usage_count: 1,
            created_at: Some(now),
            last_updated: None,
        }
    }

    /// Fold another occurrence into this record.
    ///
    /// Identity fields and `created_at` are kept; the counter, last-seen data
    /// and `last_updated` move forward.
    pub fn merged_with(&self, event: &UsageEvent, now: String) -> Self {
        Self {
            user_id: self.user_id.clone(),
            action: self.action.clone(),
            client_id: event.client_id.clone(),
            timestamp: event.timestamp.clone(),
            usage_count: self.usage_count.saturating_add(1),
            created_at: self.created_at.clone(),
            last_updated: Some(now),
        }
    }

    /// Whether this record aggregates the given pair.
    pub fn is_for(&self, user_id: &str, action: &str) -> bool {
        self.user_id == user_id && self.action == action
    }
}

/// A user profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    /// Stored as a path segment, so it must be a valid key.
    pub id: String,
    pub name: String,
    pub email: String,
}

impl UserProfile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("id", &self.id)?;
        require("name", &self.name)?;
        require("email", &self.email)?;
        if !is_valid_key(&self.id) {
            return Err(ValidationError::InvalidKey {
                field: "id",
                value: self.id.clone(),
            });
        }
        Ok(())
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}
