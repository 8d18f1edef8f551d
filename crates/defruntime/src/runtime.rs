use crate::bundle::AssetBundle;
use crate::config::{LoaderConfig, RunMode};
use crate::dispatcher::ReloadDispatcher;
use crate::registry::in_memory_registries;
use crate::scanner::{scan, ScanOptions};
use crate::service::{RestartCoordinator, RestartHandle, ServiceController};
use crate::watcher::{DirectoryWatcher, WatchFilter, WatcherConfig, WatcherHandle};
use crate::RuntimeError;
use defcore::{EventBus, Kind, Location, NamingMode, Registries, ReloadEvent};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Kinds whose engine directories are watched
const ENGINE_WATCHED_KINDS: [Kind; 3] = [Kind::Flow, Kind::Model, Kind::Api];

/// A (root, kind) pair to watch once the bulk load has finished
#[derive(Debug, Clone)]
pub struct WatchTarget {
    pub kind: Kind,
    pub watch_root: PathBuf,
    pub naming_root: PathBuf,
    pub naming: NamingMode,
}

/// Definition counts from the startup load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: BTreeMap<Kind, usize>,
}

impl LoadSummary {
    pub fn total(&self) -> usize {
        self.loaded.values().sum()
    }

    pub fn count(&self, kind: Kind) -> usize {
        self.loaded.get(&kind).copied().unwrap_or(0)
    }

    fn add(&mut self, kind: Kind) {
        *self.loaded.entry(kind).or_insert(0) += 1;
    }
}

/// Loads definitions at startup and keeps them in sync with disk afterwards
pub struct DefinitionRuntime {
    config: LoaderConfig,
    registries: Registries,
    events: Arc<EventBus>,
    bundle: Option<Arc<dyn AssetBundle>>,
    cancel: CancellationToken,
    loaded: bool,
    targets: Vec<WatchTarget>,
    watchers: Vec<WatcherHandle>,
    restart: Option<(RestartHandle, JoinHandle<()>)>,
}

impl DefinitionRuntime {
    /// Create a runtime backed by fresh in-memory registries
    pub fn new(config: LoaderConfig) -> Self {
        Self::with_registries(config, in_memory_registries())
    }

    /// Create a runtime over registries supplied by the engine
    pub fn with_registries(config: LoaderConfig, registries: Registries) -> Self {
        let events = Arc::new(EventBus::new(config.event_buffer_size.max(1)));

        Self {
            config,
            registries,
            events,
            bundle: None,
            cancel: CancellationToken::new(),
            loaded: false,
            targets: Vec::new(),
            watchers: Vec::new(),
            restart: None,
        }
    }

    /// Embedded assets backing `bin://` locations
    pub fn with_bundle(mut self, bundle: Arc<dyn AssetBundle>) -> Self {
        self.bundle = Some(bundle);
        self
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Targets collected by the bulk load
    pub fn watch_targets(&self) -> &[WatchTarget] {
        &self.targets
    }

    pub fn restart_handle(&self) -> Option<&RestartHandle> {
        self.restart.as_ref().map(|(handle, _)| handle)
    }

    /// Load engine definitions, then application definitions.
    ///
    /// Synchronous and all-or-nothing: any configuration, read or parse error
    /// aborts startup.
    pub fn load(&mut self) -> Result<LoadSummary, RuntimeError> {
        self.config.validate().map_err(defcore::LoaderError::from)?;

        let mut summary = LoadSummary::default();
        if let Some(engine_root) = self.config.engine_root.clone() {
            self.load_engine(&engine_root, &mut summary)?;
        }
        self.load_app(&mut summary)?;

        self.loaded = true;
        info!(
            "Loaded {} definitions ({} models, {} flows, {} apis, {} plugins)",
            summary.total(),
            summary.count(Kind::Model),
            summary.count(Kind::Flow),
            summary.count(Kind::Api),
            summary.count(Kind::Plugin)
        );
        Ok(summary)
    }

    fn load_engine(&mut self, from: &str, summary: &mut LoadSummary) -> Result<(), RuntimeError> {
        let location = Location::parse(from).map_err(defcore::LoaderError::from)?;
        let naming = NamingMode::engine(self.config.engine_prefix.clone());

        let records = scan(
            &location,
            ScanOptions::engine(&naming),
            self.bundle.as_deref(),
        )?;
        for record in &records {
            self.registries
                .for_kind(record.kind)
                .load_record(record)
                .map_err(defcore::LoaderError::from)?;
            self.events
                .emit(ReloadEvent::loaded(record.kind, record.name.clone()));
            summary.add(record.kind);
        }

        if let Location::Filesystem(root) = &location {
            for kind in ENGINE_WATCHED_KINDS {
                self.targets.push(WatchTarget {
                    kind,
                    watch_root: root.join(kind.dir_name()),
                    naming_root: root.clone(),
                    naming: naming.clone(),
                });
            }
        }

        Ok(())
    }

    fn load_app(&mut self, summary: &mut LoadSummary) -> Result<(), RuntimeError> {
        for kind in Kind::ALL {
            let Some(from) = self.config.app_root(kind).map(str::to_string) else {
                continue;
            };
            let location = Location::parse(&from).map_err(defcore::LoaderError::from)?;

            let records = scan(
                &location,
                ScanOptions::application(kind),
                self.bundle.as_deref(),
            )?;
            let registry = self.registries.for_kind(kind);
            for record in &records {
                registry
                    .load_record(record)
                    .map_err(defcore::LoaderError::from)?;
                self.events
                    .emit(ReloadEvent::loaded(kind, record.name.clone()));
                summary.add(kind);
            }

            // Application roots only follow edits while developing
            if let (Location::Filesystem(root), RunMode::Debug) = (&location, self.config.mode) {
                self.targets.push(WatchTarget {
                    kind,
                    watch_root: root.clone(),
                    naming_root: root.clone(),
                    naming: NamingMode::Application,
                });
            }
        }

        Ok(())
    }

    /// Start one watcher per collected target.
    ///
    /// With a service controller, API changes restart the listener through a
    /// single coalescing coordinator.
    pub fn start_watching(
        &mut self,
        service: Option<Arc<dyn ServiceController>>,
    ) -> Result<usize, RuntimeError> {
        if !self.loaded {
            return Err(RuntimeError::NotLoaded);
        }

        if let Some(controller) = service {
            if self.restart.is_none() {
                self.restart = Some(RestartCoordinator::spawn(
                    controller,
                    self.config.restart_debounce(),
                    self.events.clone(),
                    self.cancel.child_token(),
                ));
            }
        }

        let watcher_config = WatcherConfig {
            debounce: self.config.watch_debounce(),
            ..WatcherConfig::default()
        };

        for target in std::mem::take(&mut self.targets) {
            let watch_root = match target.watch_root.canonicalize() {
                Ok(root) => root,
                Err(e) => {
                    warn!(
                        "Not watching {} definitions in {}: {}",
                        target.kind,
                        target.watch_root.display(),
                        e
                    );
                    continue;
                }
            };
            // Named from the configured root, exactly as the bulk scan did
            let mut dispatcher = ReloadDispatcher::new(
                target.kind,
                target.naming_root.clone(),
                target.naming.clone(),
                self.registries.for_kind(target.kind).clone(),
                self.events.clone(),
            )
            .with_rebase(watch_root.clone(), target.watch_root.clone());
            if target.kind == Kind::Api {
                if let Some((restart, _)) = &self.restart {
                    dispatcher = dispatcher.with_restart(restart.clone());
                }
            }

            let handle = DirectoryWatcher::spawn(
                watch_root,
                WatchFilter::for_kind(target.kind),
                Arc::new(dispatcher),
                watcher_config.clone(),
                self.cancel.child_token(),
            )?;
            self.watchers.push(handle);
        }

        Ok(self.watchers.len())
    }

    /// Token cancelled by [`shutdown`](Self::shutdown); child tokens stop every task
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop every watcher and the restart coordinator and wait for them
    pub async fn shutdown(self) {
        self.cancel.cancel();

        let watchers = self.watchers.len();
        futures::future::join_all(self.watchers.into_iter().map(WatcherHandle::join)).await;

        if let Some((_, task)) = self.restart {
            if let Err(e) = task.await {
                warn!("Restart coordinator ended abnormally: {}", e);
            }
        }

        info!("Definition runtime stopped ({} watchers)", watchers);
    }
}
