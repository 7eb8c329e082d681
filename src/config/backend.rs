//! Backend configuration types.

use serde::Deserialize;

/// Backend type discriminator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// In-process tree store. Data does not survive a restart.
    #[default]
    Memory,
    /// Firebase Realtime Database.
    Firebase,
}

/// Backend configuration (discriminated union).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend type discriminator.
    #[serde(rename = "type")]
    pub backend_type: BackendType,
    /// Firebase-specific configuration.
    pub firebase: FirebaseConfig,
}

/// Firebase Realtime Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FirebaseConfig {
    /// Database URL, e.g. `https://<project>-default-rtdb.firebaseio.com`.
    pub database_url: String,
    /// Database secret or ID token, sent as the `auth` query parameter.
    pub auth_token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            auth_token: None,
            timeout_secs: 10,
        }
    }
}

/// Subset of the client SDK configuration object carried in `FIREBASE_CONFIG`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LegacyFirebaseConfig {
    #[serde(rename = "databaseURL")]
    pub database_url: String,
}
