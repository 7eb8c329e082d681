//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod backend;
mod ledger;
mod server;

pub use backend::{BackendConfig, BackendType, FirebaseConfig};
pub use ledger::{KeyStrategy, LedgerConfig, Partitioning, WriteMode};
pub use server::ServerConfig;

use backend::LegacyFirebaseConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "ACTIONTALLY_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "ACTIONTALLY";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "ACTIONTALLY_LOG";
/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV_VAR: &str = "ACTIONTALLY_LOG_FORMAT";
/// Environment variable holding a Firebase client configuration object as JSON.
pub const FIREBASE_CONFIG_ENV_VAR: &str = "FIREBASE_CONFIG";

use serde::Deserialize;

use crate::storage::path::{is_valid_key, segments};

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid FIREBASE_CONFIG: {0}")]
    LegacyFirebase(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Backend configuration.
    pub backend: BackendConfig,
    /// Aggregation engine configuration.
    pub ledger: LedgerConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. `FIREBASE_CONFIG` (if set) selects the Firebase backend and fills in an
    ///    unset database URL
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = config.try_deserialize()?;

        if let Ok(raw) = std::env::var(FIREBASE_CONFIG_ENV_VAR) {
            config.apply_legacy_firebase_config(&raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply a Firebase client configuration object (`{"databaseURL": ...}`).
    ///
    /// Selects the Firebase backend. An explicitly configured database URL wins
    /// over the one in `raw`.
    pub fn apply_legacy_firebase_config(&mut self, raw: &str) -> Result<(), ConfigError> {
        let legacy: LegacyFirebaseConfig = serde_json::from_str(raw)?;
        self.backend.backend_type = BackendType::Firebase;
        if self.backend.firebase.database_url.is_empty() {
            self.backend.firebase.database_url = legacy.database_url;
        }
        Ok(())
    }

    /// Reject combinations that cannot work at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.backend_type == BackendType::Firebase
            && self.backend.firebase.database_url.is_empty()
        {
            return Err(ConfigError::Invalid(
                "backend.firebase.database_url is required for the firebase backend".to_string(),
            ));
        }

        let ledger = &self.ledger;
        for (name, root) in [
            ("events_root", &ledger.events_root),
            ("users_root", &ledger.users_root),
        ] {
            let segs = segments(root);
            if segs.is_empty() || !segs.iter().all(|s| is_valid_key(s)) {
                return Err(ConfigError::Invalid(format!(
                    "ledger.{} {:?} is not a valid path",
                    name, root
                )));
            }
        }
        let events = segments(&ledger.events_root);
        let users = segments(&ledger.users_root);
        if events.starts_with(&users) || users.starts_with(&events) {
            return Err(ConfigError::Invalid(
                "ledger.events_root and ledger.users_root must not contain each other".to_string(),
            ));
        }
        if ledger.partitioning == Partitioning::Single && !is_valid_key(&ledger.single_partition) {
            return Err(ConfigError::Invalid(format!(
                "ledger.single_partition {:?} is not a valid key",
                ledger.single_partition
            )));
        }
        if ledger.write_mode == WriteMode::SingleWriter
            && (ledger.writer_shards == 0 || ledger.writer_queue_depth == 0)
        {
            return Err(ConfigError::Invalid(
                "ledger.writer_shards and ledger.writer_queue_depth must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests;
