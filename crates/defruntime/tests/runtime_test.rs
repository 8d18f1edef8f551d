// crates/defruntime/tests/runtime_test.rs

use async_trait::async_trait;
use defcore::{ConfigError, Identifier, Kind, LoaderError, Registry};
use defruntime::{
    DefinitionRuntime, LoaderConfig, MemoryBundle, RunMode, RuntimeError, ServiceController,
    ServiceError,
};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn engine_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "models/user.json", r#"{"v": 1}"#);
    write(dir.path(), "flows/stat/daily.flow.json", r#"{"label": "daily"}"#);
    write(dir.path(), "apis/orders.json", r#"{"name": "orders", "paths": []}"#);
    dir
}

fn engine_config(root: &Path) -> LoaderConfig {
    LoaderConfig {
        engine_root: Some(format!("fs://{}", root.canonicalize().unwrap().display())),
        watch_debounce_ms: 20,
        restart_debounce_ms: 100,
        ..LoaderConfig::default()
    }
}

#[derive(Default)]
struct RecordingService {
    log: Mutex<Vec<&'static str>>,
}

impl RecordingService {
    fn log(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServiceController for RecordingService {
    async fn stop(&self) -> Result<(), ServiceError> {
        self.log.lock().unwrap().push("stop");
        Ok(())
    }

    async fn start(&self) -> Result<(), ServiceError> {
        self.log.lock().unwrap().push("start");
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("defruntime=debug")
        .try_init();
}

async fn eventually(what: &str, check: impl Fn() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {what}");
}

#[test]
fn test_load_engine_then_application() {
    let engine = engine_tree();
    let app = TempDir::new().unwrap();
    write(app.path(), "user.json", r#"{"app": true}"#);

    let mut config = engine_config(engine.path());
    config.model_root = Some(app.path().display().to_string());
    let mut runtime = DefinitionRuntime::new(config);

    let summary = runtime.load().unwrap();
    assert_eq!(summary.count(Kind::Model), 2);
    assert_eq!(summary.count(Kind::Flow), 1);
    assert_eq!(summary.count(Kind::Api), 1);
    assert_eq!(summary.total(), 4);

    let models = &runtime.registries().models;
    assert_eq!(models.ids().len(), 2);
    assert!(models.exists("xiang.user"));
    assert_eq!(models.get("user").unwrap().json().unwrap()["app"], true);
}

#[test]
fn test_application_roots_are_watched_only_in_debug_mode() {
    let app = TempDir::new().unwrap();
    write(app.path(), "orders.json", r#"{"name": "orders", "paths": []}"#);

    let production = LoaderConfig {
        api_root: Some(app.path().display().to_string()),
        ..LoaderConfig::default()
    };
    let mut runtime = DefinitionRuntime::new(production.clone());
    runtime.load().unwrap();
    assert!(runtime.watch_targets().is_empty());

    let mut runtime = DefinitionRuntime::new(LoaderConfig {
        mode: RunMode::Debug,
        ..production
    });
    runtime.load().unwrap();
    let targets = runtime.watch_targets();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].kind, Kind::Api);
    assert_eq!(targets[0].watch_root, app.path());
}

#[test]
fn test_engine_roots_watch_each_definition_directory() {
    let engine = engine_tree();
    let mut runtime = DefinitionRuntime::new(engine_config(engine.path()));
    runtime.load().unwrap();

    let mut kinds: Vec<Kind> = runtime.watch_targets().iter().map(|t| t.kind).collect();
    kinds.sort();
    assert_eq!(kinds, vec![Kind::Model, Kind::Flow, Kind::Api]);
    for target in runtime.watch_targets() {
        assert!(target.watch_root.ends_with(target.kind.dir_name()));
    }
}

#[test]
fn test_embedded_engine_is_not_watched() {
    let bundle = MemoryBundle::new().with_asset("xiang/models/user.json", "{}");
    let mut runtime = DefinitionRuntime::new(LoaderConfig {
        engine_root: Some("bin://xiang".to_string()),
        ..LoaderConfig::default()
    })
    .with_bundle(Arc::new(bundle));

    let summary = runtime.load().unwrap();
    assert_eq!(summary.total(), 1);
    assert!(runtime.watch_targets().is_empty());
}

#[test]
fn test_startup_errors_are_fatal() {
    let mut runtime = DefinitionRuntime::new(LoaderConfig::default());
    assert!(runtime.load().is_err());

    let mut runtime = DefinitionRuntime::new(LoaderConfig {
        engine_root: Some("s3://bucket".to_string()),
        ..LoaderConfig::default()
    });
    assert!(matches!(
        runtime.load(),
        Err(RuntimeError::Loader(LoaderError::Config(
            ConfigError::UnsupportedScheme { .. }
        )))
    ));

    let engine = engine_tree();
    write(engine.path(), "models/broken.json", "{ nope");
    let mut runtime = DefinitionRuntime::new(engine_config(engine.path()));
    assert!(runtime.load().is_err());
}

#[tokio::test]
async fn test_watching_requires_load() {
    let engine = engine_tree();
    let mut runtime = DefinitionRuntime::new(engine_config(engine.path()));

    assert!(matches!(
        runtime.start_watching(None),
        Err(RuntimeError::NotLoaded)
    ));
}

#[tokio::test]
async fn test_missing_engine_directory_is_skipped() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "models/user.json", "{}");
    let mut runtime = DefinitionRuntime::new(engine_config(dir.path()));
    runtime.load().unwrap();

    let watching = runtime.start_watching(None).unwrap();
    assert_eq!(watching, 1);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_model_edits_and_deletes_reach_the_registry() {
    init_tracing();
    let engine = engine_tree();
    let mut runtime = DefinitionRuntime::new(engine_config(engine.path()));
    runtime.load().unwrap();
    assert_eq!(runtime.start_watching(None).unwrap(), 3);

    let models = runtime.registries().models.clone();
    write(engine.path(), "models/user.json", r#"{"v": 2}"#);
    eventually("model reload", || {
        models
            .get("xiang.user")
            .map(|d| d.json().map(|v| v["v"] == 2).unwrap_or(false))
            .unwrap_or(false)
    })
    .await;

    write(engine.path(), "models/order.json", "{}");
    eventually("model create", || models.exists("xiang.order")).await;

    fs::remove_file(engine.path().join("models/user.json")).unwrap();
    eventually("model removal", || !models.exists("xiang.user")).await;
    assert!(models.exists("xiang.order"));

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_api_edit_restarts_the_service_once() {
    init_tracing();
    let engine = engine_tree();
    let service = Arc::new(RecordingService::default());
    let mut runtime = DefinitionRuntime::new(engine_config(engine.path()));
    runtime.load().unwrap();
    let controller: Arc<dyn ServiceController> = service.clone();
    runtime.start_watching(Some(controller)).unwrap();

    let flows = runtime.registries().flows.clone();
    write(
        engine.path(),
        "apis/orders.json",
        r#"{"name": "orders", "paths": [{"path": "/", "method": "GET", "process": "flows.orders"}]}"#,
    );

    // Unrelated reads keep working while the API reload is in flight
    for _ in 0..20 {
        assert!(flows.get("xiang.stat.daily").is_some());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    eventually("service restart", || service.log().len() >= 2).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(service.log(), vec!["stop", "start"]);

    let orders = runtime.registries().apis.get("xiang.orders").unwrap();
    assert_eq!(orders.json().unwrap()["paths"][0]["process"], "flows.orders");

    runtime.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_definition_directory_keeps_scanned_names() {
    init_tracing();
    let engine = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    write(elsewhere.path(), "models/user.json", r#"{"v": 1}"#);
    std::os::unix::fs::symlink(elsewhere.path().join("models"), engine.path().join("models"))
        .unwrap();

    let mut runtime = DefinitionRuntime::new(engine_config(engine.path()));
    runtime.load().unwrap();
    let models = runtime.registries().models.clone();
    assert_eq!(models.ids(), vec![Identifier::new("xiang.user")]);

    runtime.start_watching(None).unwrap();

    write(elsewhere.path(), "models/user.json", r#"{"v": 2}"#);
    eventually("model reload through symlink", || {
        models
            .get("xiang.user")
            .map(|d| d.json().map(|v| v["v"] == 2).unwrap_or(false))
            .unwrap_or(false)
    })
    .await;
    assert_eq!(models.ids(), vec![Identifier::new("xiang.user")]);

    fs::remove_file(elsewhere.path().join("models/user.json")).unwrap();
    eventually("model removal through symlink", || models.ids().is_empty()).await;

    runtime.shutdown().await;
}
