// crates/defruntime/tests/config_test.rs

use defcore::{ConfigError, Kind};
use defruntime::{LoaderConfig, RunMode};
use std::collections::HashMap;
use std::time::Duration;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_defaults() {
    let config = LoaderConfig::from_lookup(|_| None).unwrap();

    assert_eq!(config, LoaderConfig::default());
    assert_eq!(config.engine_prefix, "xiang");
    assert_eq!(config.mode, RunMode::Production);
    assert_eq!(config.watch_debounce(), Duration::from_millis(50));
    assert!(config.validate().is_err());
}

#[test]
fn test_reads_roots_and_mode() {
    let config = LoaderConfig::from_lookup(lookup(&[
        ("DEFS_ENGINE_ROOT", "bin://xiang"),
        ("DEFS_ENGINE_PREFIX", "core"),
        ("DEFS_ROOT_API", "fs:///srv/app/apis"),
        ("DEFS_ROOT_PLUGIN", "/srv/app/plugins"),
        ("DEFS_MODE", "debug"),
        ("DEFS_WATCH_DEBOUNCE_MS", "0"),
        ("BIND_ADDRESS", "127.0.0.1:8080"),
    ]))
    .unwrap();

    assert_eq!(config.engine_root.as_deref(), Some("bin://xiang"));
    assert_eq!(config.engine_prefix, "core");
    assert_eq!(config.app_root(Kind::Api), Some("fs:///srv/app/apis"));
    assert_eq!(config.app_root(Kind::Plugin), Some("/srv/app/plugins"));
    assert_eq!(config.app_root(Kind::Flow), None);
    assert_eq!(config.mode, RunMode::Debug);
    assert!(config.watch_debounce().is_zero());
    assert_eq!(config.bind_address, "127.0.0.1:8080");
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_values_are_rejected() {
    let err = LoaderConfig::from_lookup(lookup(&[("DEFS_MODE", "staging")])).unwrap_err();
    assert_eq!(err, ConfigError::InvalidMode("staging".to_string()));

    let err =
        LoaderConfig::from_lookup(lookup(&[("DEFS_RESTART_DEBOUNCE_MS", "soon")])).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_mode_aliases() {
    assert_eq!("dev".parse::<RunMode>().unwrap(), RunMode::Debug);
    assert_eq!("Development".parse::<RunMode>().unwrap(), RunMode::Debug);
    assert_eq!("prod".parse::<RunMode>().unwrap(), RunMode::Production);
}

#[test]
fn test_from_file_fills_missing_fields() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("defs.json");
    std::fs::write(&path, r#"{"model_root": "./models", "mode": "debug"}"#).unwrap();

    let config = LoaderConfig::from_file(&path).unwrap();
    assert_eq!(config.model_root.as_deref(), Some("./models"));
    assert_eq!(config.mode, RunMode::Debug);
    assert_eq!(config.engine_prefix, "xiang");

    std::fs::write(&path, "not json").unwrap();
    assert!(LoaderConfig::from_file(&path).is_err());
}
