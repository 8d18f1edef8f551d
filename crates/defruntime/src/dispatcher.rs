use crate::scanner::{read_script, ScanOptions};
use crate::service::RestartHandle;
use crate::watcher::{WatchEvent, WatchHandler};
use defcore::{naming, EventBus, Identifier, Kind, NamingMode, Registry, ReloadEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a dispatched event did to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Loaded(Identifier),
    Removed(Identifier),
    /// Removal of an identifier that was never registered
    Absent(Identifier),
    /// The file does not belong to this dispatcher's kind
    Skipped,
    /// Read, parse or registry failure; the registry is unchanged
    Failed(String),
}

/// Applies watch events for one kind of definition to its registry
pub struct ReloadDispatcher {
    kind: Kind,
    naming_root: PathBuf,
    naming: NamingMode,
    registry: Arc<dyn Registry>,
    events: Arc<EventBus>,
    restart: Option<RestartHandle>,
    /// (root the watcher reports under, root the scanner named from)
    rebase: Option<(PathBuf, PathBuf)>,
}

impl ReloadDispatcher {
    pub fn new(
        kind: Kind,
        naming_root: impl Into<PathBuf>,
        naming: NamingMode,
        registry: Arc<dyn Registry>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            kind,
            naming_root: naming_root.into(),
            naming,
            registry,
            events,
            restart: None,
            rebase: None,
        }
    }

    /// Request a listener restart after every event (API definitions)
    pub fn with_restart(mut self, restart: RestartHandle) -> Self {
        self.restart = Some(restart);
        self
    }

    /// Map event paths reported under `observed` back onto `logical`.
    ///
    /// The watcher sees resolved paths when a watched directory is a symlink,
    /// while the bulk scan names files from the path as configured.
    pub fn with_rebase(
        mut self,
        observed: impl Into<PathBuf>,
        logical: impl Into<PathBuf>,
    ) -> Self {
        self.rebase = Some((observed.into(), logical.into()));
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Identifier a path is registered under
    pub fn identifier(&self, path: &Path) -> Identifier {
        let path = self.logical_path(path);
        naming::identifier(&self.naming_root, &path, &self.naming).id
    }

    fn logical_path(&self, path: &Path) -> PathBuf {
        match &self.rebase {
            Some((observed, logical)) => match path.strip_prefix(observed) {
                Ok(rest) => logical.join(rest),
                Err(_) => path.to_path_buf(),
            },
            None => path.to_path_buf(),
        }
    }

    pub fn dispatch(&self, event: &WatchEvent) -> ReloadOutcome {
        let path = self.logical_path(&event.path);
        // Removing a companion script leaves its definition on disk
        let outcome = if event.op.is_upsert() || path.is_file() {
            self.reload(&path)
        } else {
            self.remove(&path)
        };

        if let Some(restart) = &self.restart {
            restart.request();
        }

        outcome
    }

    fn reload(&self, path: &Path) -> ReloadOutcome {
        let options = ScanOptions {
            suffix: self.kind.suffix(),
            kind: Some(self.kind),
            naming: &self.naming,
        };

        let record = match read_script(&self.naming_root, path, options) {
            Ok(Some(record)) => record,
            Ok(None) => return ReloadOutcome::Skipped,
            Err(e) => return self.fail(path, e.to_string()),
        };

        if let Err(e) = self.registry.load_record(&record) {
            return self.fail(path, e.to_string());
        }

        info!("Reloaded {} {}", self.kind, record.name);
        self.events.emit(ReloadEvent::loaded(self.kind, record.name.clone()));
        ReloadOutcome::Loaded(record.name)
    }

    fn remove(&self, path: &Path) -> ReloadOutcome {
        let id = naming::identifier(&self.naming_root, path, &self.naming).id;

        if self.registry.delete(id.as_str()) {
            info!("Removed {} {}", self.kind, id);
            self.events.emit(ReloadEvent::removed(self.kind, id.clone()));
            ReloadOutcome::Removed(id)
        } else {
            debug!("{} {} was not registered", self.kind, id);
            ReloadOutcome::Absent(id)
        }
    }

    fn fail(&self, path: &Path, error: String) -> ReloadOutcome {
        warn!("Failed to reload {} {}: {}", self.kind, path.display(), error);
        self.events.emit(ReloadEvent::failed(self.kind, path, &error));
        ReloadOutcome::Failed(error)
    }
}

impl WatchHandler for ReloadDispatcher {
    fn handle(&self, event: WatchEvent) {
        debug!("{} event {} {}", self.kind, event.op, event.path.display());
        self.dispatch(&event);
    }
}
