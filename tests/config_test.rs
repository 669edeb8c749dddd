use batch_window::{ConfigLoader, ConfigurationError, WindowConfig};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

fn shipped_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/batch-window.toml")
}

#[test]
fn test_shipped_config_matches_defaults() {
    let loaded = ConfigLoader::new()
        .with_file(shipped_config())
        .with_env_overrides(HashMap::new())
        .load()
        .expect("shipped configuration should load");

    let defaults = WindowConfig::new(50, Duration::from_secs(5)).unwrap();
    assert_eq!(loaded, defaults);
}

#[test]
fn test_environment_overrides_shipped_config() {
    let overrides = HashMap::from([
        ("BATCH_WINDOW__SIZE_LIMIT".to_string(), "200".to_string()),
        ("BATCH_WINDOW__TIME_LIMIT_MS".to_string(), "250".to_string()),
    ]);

    let loaded = ConfigLoader::new()
        .with_file(shipped_config())
        .with_env_overrides(overrides)
        .load()
        .unwrap();

    assert_eq!(loaded.size_limit, 200);
    assert_eq!(loaded.time_limit(), Duration::from_millis(250));
    assert_eq!(loaded.channel_capacity, 1024);
}

#[test]
fn test_invalid_override_is_rejected() {
    let overrides = HashMap::from([("BATCH_WINDOW__SIZE_LIMIT".to_string(), "0".to_string())]);

    let result = ConfigLoader::new()
        .with_file(shipped_config())
        .with_env_overrides(overrides)
        .load();

    assert!(matches!(
        result,
        Err(ConfigurationError::InvalidValue { ref field, .. }) if field == "size_limit"
    ));
}

#[test]
fn test_file_without_time_limit_names_missing_field() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "size_limit = 25").unwrap();

    let result = ConfigLoader::new()
        .with_file(file.path())
        .with_env_overrides(HashMap::new())
        .load();

    assert!(matches!(
        result,
        Err(ConfigurationError::MissingRequiredField { ref field, .. }) if field == "time_limit_ms"
    ));
}
