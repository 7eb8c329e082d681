//! User profile directory.

use std::sync::Arc;

use tracing::info;

use crate::engine::{Result, UpstreamError, ValidationError};
use crate::model::UserProfile;
use crate::storage::path::{is_valid_key, join};
use crate::storage::TreeStore;

/// Stores profiles at `<root>/<id>`.
pub struct UserDirectory {
    store: Arc<dyn TreeStore>,
    root: String,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn TreeStore>, root: impl Into<String>) -> Self {
        Self {
            store,
            root: root.into(),
        }
    }

    /// Store `profile`, replacing any previous profile with the same id.
    pub async fn register(&self, profile: UserProfile) -> Result<UserProfile> {
        profile.validate()?;
        let path = join(&[&self.root, &profile.id]);
        let value = serde_json::to_value(&profile)
            .map_err(|e| UpstreamError::new("encode user profile", e.into()))?;
        self.store
            .set(&path, value)
            .await
            .map_err(|e| UpstreamError::new(format!("write {}", path), e))?;

        info!(user_id = %profile.id, "Registered user");
        Ok(profile)
    }

    /// Stored profile for `id`. The id must be a single valid key.
    pub async fn lookup(&self, id: &str) -> Result<Option<UserProfile>> {
        if !is_valid_key(id) {
            return Err(ValidationError::InvalidKey {
                field: "id",
                value: id.to_string(),
            }
            .into());
        }
        let path = join(&[&self.root, id]);
        let value = self
            .store
            .get(&path)
            .await
            .map_err(|e| UpstreamError::new(format!("read {}", path), e))?;

        match value {
            None => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                UpstreamError::new(format!("decode {}", path), e.into()).into()
            }),
        }
    }
}
