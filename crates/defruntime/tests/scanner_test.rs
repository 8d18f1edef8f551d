// crates/defruntime/tests/scanner_test.rs

use defcore::{ConfigError, Identifier, Kind, LoaderError, Location, NamingMode};
use defruntime::scanner::{read_script, scan, ScanOptions};
use defruntime::MemoryBundle;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn engine_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "models/user.json", r#"{"name": "user"}"#);
    write(dir.path(), "flows/stat/daily.flow.json", r#"{"label": "daily"}"#);
    write(dir.path(), "flows/stat/daily.js", "function main() {}");
    write(dir.path(), "apis/orders.json", r#"{"name": "orders", "paths": []}"#);
    write(dir.path(), "widgets/table.json", r#"{}"#);
    dir
}

#[test]
fn test_engine_scan_routes_by_directory() {
    let dir = engine_tree();
    let naming = NamingMode::engine("xiang");
    let location = Location::Filesystem(dir.path().to_path_buf());

    let records = scan(&location, ScanOptions::engine(&naming), None).unwrap();

    let mut names: Vec<(Kind, String)> = records
        .iter()
        .map(|r| (r.kind, r.name.to_string()))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            (Kind::Model, "xiang.user".to_string()),
            (Kind::Flow, "xiang.stat.daily".to_string()),
            (Kind::Api, "xiang.orders".to_string()),
        ]
    );
}

#[test]
fn test_engine_scan_reads_content() {
    let dir = engine_tree();
    let naming = NamingMode::engine("xiang");
    let location = Location::Filesystem(dir.path().to_path_buf());

    let records = scan(&location, ScanOptions::engine(&naming), None).unwrap();
    let user = records
        .iter()
        .find(|r| r.name == Identifier::new("xiang.user"))
        .expect("user model should be scanned");

    assert_eq!(user.content(), Some(br#"{"name": "user"}"#.as_slice()));
    assert!(user.file_path().is_none());
}

#[test]
fn test_application_scan_uses_full_path() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "user/login.json", r#"{}"#);
    write(dir.path(), "health.json", r#"{}"#);
    write(dir.path(), "notes.txt", "ignored");

    let location = Location::Filesystem(dir.path().to_path_buf());
    let records = scan(&location, ScanOptions::application(Kind::Api), None).unwrap();

    let names: Vec<String> = records.iter().map(|r| r.name.to_string()).collect();
    assert_eq!(names, vec!["health".to_string(), "user.login".to_string()]);
    assert!(records.iter().all(|r| r.kind == Kind::Api));
}

#[test]
fn test_plugins_are_recorded_by_path() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "payment/stripe.so", "\x7fELF");

    let location = Location::Filesystem(dir.path().to_path_buf());
    let records = scan(&location, ScanOptions::application(Kind::Plugin), None).unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name.as_str(), "payment.stripe");
    assert!(records[0].content().is_none());
    assert_eq!(
        records[0].file_path(),
        Some(dir.path().join("payment/stripe.so").as_path())
    );
}

#[test]
fn test_zero_matching_files_is_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "README.md", "nothing to load");

    let location = Location::Filesystem(dir.path().to_path_buf());
    let err = scan(&location, ScanOptions::application(Kind::Model), None).unwrap_err();

    assert!(
        matches!(err, LoaderError::Config(ConfigError::NoDefinitions { .. })),
        "unexpected error: {err}"
    );
}

#[test]
fn test_missing_root_is_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    let location = Location::Filesystem(dir.path().join("does-not-exist"));

    let err = scan(&location, ScanOptions::application(Kind::Flow), None).unwrap_err();
    assert!(matches!(err, LoaderError::Config(ConfigError::MissingRoot(_))));
}

#[test]
fn test_embedded_bundle_scan() {
    let bundle = MemoryBundle::new()
        .with_asset("xiang/models/user.json", r#"{"name": "user"}"#)
        .with_asset("xiang/apis/orders.json", r#"{"name": "orders", "paths": []}"#)
        .with_asset("xiang/data/icon.png", vec![0u8, 1, 2])
        .with_asset("other/models/ignored.json", "{}");
    let naming = NamingMode::engine("xiang");
    let location = Location::parse("bin://xiang").unwrap();

    let records = scan(&location, ScanOptions::engine(&naming), Some(&bundle)).unwrap();

    let names: Vec<String> = records.iter().map(|r| r.name.to_string()).collect();
    assert_eq!(names, vec!["xiang.orders".to_string(), "xiang.user".to_string()]);
}

#[test]
fn test_embedded_root_ignores_surrounding_slashes() {
    let bundle = MemoryBundle::new().with_asset("data/models/user.json", "{}");
    let naming = NamingMode::engine("xiang");

    for location in [
        Location::parse("bin:///data").unwrap(),
        Location::Embedded("/data/".to_string()),
    ] {
        let records = scan(&location, ScanOptions::engine(&naming), Some(&bundle)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, Identifier::new("xiang.user"));
    }
}

#[test]
fn test_embedded_scan_requires_a_bundle() {
    let naming = NamingMode::engine("xiang");
    let location = Location::parse("bin://xiang").unwrap();

    let err = scan(&location, ScanOptions::engine(&naming), None).unwrap_err();
    assert!(matches!(err, LoaderError::Config(ConfigError::NoBundle(_))));
}

#[test]
fn test_embedded_plugins_are_rejected() {
    let bundle = MemoryBundle::new().with_asset("plugins/stripe.so", vec![0u8]);
    let location = Location::parse("bin://plugins").unwrap();

    let err = scan(&location, ScanOptions::application(Kind::Plugin), Some(&bundle)).unwrap_err();
    assert!(matches!(err, LoaderError::Config(ConfigError::EmbeddedPlugins(_))));
}

#[test]
fn test_embedded_root_without_assets_is_missing() {
    let bundle = MemoryBundle::new().with_asset("xiang/models/user.json", "{}");
    let location = Location::parse("bin://nope").unwrap();

    let err = scan(&location, ScanOptions::application(Kind::Model), Some(&bundle)).unwrap_err();
    assert!(matches!(err, LoaderError::Config(ConfigError::MissingRoot(_))));
}

#[test]
fn test_read_script_skips_unknown_engine_directories() {
    let dir = engine_tree();
    let naming = NamingMode::engine("xiang");

    let record = read_script(
        dir.path(),
        &dir.path().join("widgets/table.json"),
        ScanOptions::engine(&naming),
    )
    .unwrap();
    assert!(record.is_none());
}

#[test]
fn test_read_script_reports_missing_file() {
    let dir = TempDir::new().unwrap();

    let err = read_script(
        dir.path(),
        &dir.path().join("gone.json"),
        ScanOptions::application(Kind::Model),
    )
    .unwrap_err();
    assert!(matches!(err, LoaderError::Read { .. }));
}
