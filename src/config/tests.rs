use std::io::Write;

use serial_test::serial;

use super::*;

fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.server.port, 8000);
    assert_eq!(config.backend.backend_type, BackendType::Memory);
    assert_eq!(config.ledger.partitioning, Partitioning::Monthly);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_load_from_file() {
    let file = write_yaml(
        r#"
server:
  port: 9100
backend:
  type: firebase
  firebase:
    database_url: https://demo.firebaseio.com
    auth_token: s3cret
ledger:
  key_strategy: composite
  write_mode: single_writer
  writer_shards: 4
"#,
    );

    let config = Config::load(file.path().to_str()).unwrap();
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.backend.backend_type, BackendType::Firebase);
    assert_eq!(
        config.backend.firebase.database_url,
        "https://demo.firebaseio.com"
    );
    assert_eq!(config.backend.firebase.auth_token.as_deref(), Some("s3cret"));
    assert_eq!(config.ledger.key_strategy, KeyStrategy::Composite);
    assert_eq!(config.ledger.write_mode, WriteMode::SingleWriter);
    assert_eq!(config.ledger.writer_shards, 4);
    // Unset fields keep their defaults.
    assert_eq!(config.ledger.events_root, "events");
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let file = write_yaml("server:\n  port: 9100\n");

    std::env::set_var("ACTIONTALLY__SERVER__PORT", "9200");
    let result = Config::load(file.path().to_str());
    std::env::remove_var("ACTIONTALLY__SERVER__PORT");

    assert_eq!(result.unwrap().server.port, 9200);
}

#[test]
#[serial]
fn test_missing_explicit_file_fails() {
    let result = Config::load(Some("/nonexistent/actiontally.yaml"));
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
#[serial]
fn test_firebase_config_env_selects_firebase() {
    std::env::set_var(
        FIREBASE_CONFIG_ENV_VAR,
        r#"{"apiKey": "k", "databaseURL": "https://legacy.firebaseio.com"}"#,
    );
    let result = Config::load(None);
    std::env::remove_var(FIREBASE_CONFIG_ENV_VAR);

    let config = result.unwrap();
    assert_eq!(config.backend.backend_type, BackendType::Firebase);
    assert_eq!(
        config.backend.firebase.database_url,
        "https://legacy.firebaseio.com"
    );
}

#[test]
fn test_legacy_config_does_not_override_explicit_url() {
    let mut config = Config::default();
    config.backend.firebase.database_url = "https://explicit.firebaseio.com".to_string();
    config
        .apply_legacy_firebase_config(r#"{"databaseURL": "https://legacy.firebaseio.com"}"#)
        .unwrap();
    assert_eq!(config.backend.backend_type, BackendType::Firebase);
    assert_eq!(
        config.backend.firebase.database_url,
        "https://explicit.firebaseio.com"
    );
}

#[test]
fn test_legacy_config_rejects_garbage() {
    let mut config = Config::default();
    let result = config.apply_legacy_firebase_config("not json");
    assert!(matches!(result, Err(ConfigError::LegacyFirebase(_))));
}

#[test]
fn test_validate_firebase_requires_url() {
    let mut config = Config::default();
    config.backend.backend_type = BackendType::Firebase;
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_validate_roots() {
    let mut config = Config::default();
    config.ledger.events_root = "ev.ents".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.ledger.users_root = "/events/".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.ledger.events_root = "app/events".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_nested_roots() {
    let mut config = Config::default();
    config.ledger.events_root = "data".to_string();
    config.ledger.users_root = "data/users".to_string();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    let mut config = Config::default();
    config.ledger.events_root = "/data/events".to_string();
    config.ledger.users_root = "data/".to_string();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

    // Shared name prefix, distinct segments.
    let mut config = Config::default();
    config.ledger.events_root = "data".to_string();
    config.ledger.users_root = "database".to_string();
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_single_writer_shards() {
    let mut config = Config::default();
    config.ledger.write_mode = WriteMode::SingleWriter;
    config.ledger.writer_shards = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_single_partition_name() {
    let mut config = Config::default();
    config.ledger.partitioning = Partitioning::Single;
    config.ledger.single_partition = "a/b".to_string();
    assert!(config.validate().is_err());
}
