//! Directory watcher - observes a definition root and feeds a handler.
//!
//! notify's sync callback forwards raw events into a tokio channel. The watch
//! task classifies them into [`WatchOp`]s, filters them by suffix, debounces
//! them per path and queues the survivors for a separate dispatch task, so a
//! slow reload never stops the watcher from observing further changes.
//!
//! Both tasks run until the watcher's `CancellationToken` fires. Pending
//! events are flushed to the handler before the tasks exit.

use defcore::naming::{companion_definition, has_suffix};
use defcore::Kind;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Classified filesystem change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchOp {
    Write,
    Create,
    Remove,
    Rename,
}

impl WatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchOp::Write => "write",
            WatchOp::Create => "create",
            WatchOp::Remove => "remove",
            WatchOp::Rename => "rename",
        }
    }

    /// Write and create (re)load a definition; remove and rename drop it
    pub fn is_upsert(&self) -> bool {
        matches!(self, WatchOp::Write | WatchOp::Create)
    }
}

impl fmt::Display for WatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub op: WatchOp,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new(op: WatchOp, path: impl Into<PathBuf>) -> Self {
        Self {
            op,
            path: path.into(),
        }
    }
}

/// Receives accepted watch events, one call per event, in order per root
pub trait WatchHandler: Send + Sync + 'static {
    fn handle(&self, event: WatchEvent);
}

impl<F> WatchHandler for F
where
    F: Fn(WatchEvent) + Send + Sync + 'static,
{
    fn handle(&self, event: WatchEvent) {
        self(event)
    }
}

/// Which paths a watcher passes on to its handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchFilter {
    pub suffix: String,
    /// Translate companion scripts (`x.js`) to their definition (`x.flow.json`)
    pub companions: bool,
}

impl WatchFilter {
    pub fn for_kind(kind: Kind) -> Self {
        Self {
            suffix: kind.suffix().to_string(),
            companions: kind == Kind::Flow,
        }
    }

    /// Path the event should be reported under, or `None` to drop it
    pub fn accept(&self, path: &Path) -> Option<PathBuf> {
        if self.companions {
            if let Some(definition) = companion_definition(path) {
                return Some(definition);
            }
        }

        has_suffix(path, &self.suffix).then(|| path.to_path_buf())
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet period before a path's pending change is handed over
    pub debounce: Duration,
    /// Poll interval for platforms without native notifications
    pub poll_interval: Duration,
    pub channel_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(50),
            poll_interval: Duration::from_secs(2),
            channel_capacity: 256,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {0}")]
    Init(#[source] notify::Error),

    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Translate one raw notify event into watch events.
///
/// Renames are split into the old path (`Rename`, the definition goes away)
/// and the new path (`Create`, it is loaded under its new name). Directory,
/// metadata and access events are dropped.
pub fn classify(event: &Event) -> Vec<WatchEvent> {
    let single = |op: WatchOp| -> Vec<WatchEvent> {
        event
            .paths
            .iter()
            .filter(|path| op == WatchOp::Remove || op == WatchOp::Rename || !path.is_dir())
            .map(|path| WatchEvent::new(op, path.clone()))
            .collect()
    };

    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => single(WatchOp::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => single(WatchOp::Rename),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => single(WatchOp::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() >= 2 => {
            let mut events = vec![WatchEvent::new(WatchOp::Rename, event.paths[0].clone())];
            if !event.paths[1].is_dir() {
                events.push(WatchEvent::new(WatchOp::Create, event.paths[1].clone()));
            }
            events
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter(|path| !path.is_dir())
            .map(|path| {
                let op = if path.exists() {
                    WatchOp::Create
                } else {
                    WatchOp::Rename
                };
                WatchEvent::new(op, path.clone())
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => single(WatchOp::Write),
        EventKind::Remove(_) => single(WatchOp::Remove),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// A change waiting out the debounce window
#[derive(Debug)]
struct PendingChange {
    op: WatchOp,
    last_event: Instant,
}

impl PendingChange {
    fn new(op: WatchOp) -> Self {
        Self {
            op,
            last_event: Instant::now(),
        }
    }

    fn update(&mut self, op: WatchOp) {
        self.last_event = Instant::now();

        self.op = match (self.op, op) {
            // Still a new file
            (WatchOp::Create, WatchOp::Write) => WatchOp::Create,
            // Replaced in place (editors saving through a temp file)
            (WatchOp::Remove | WatchOp::Rename, WatchOp::Create | WatchOp::Write) => WatchOp::Write,
            (_, latest) => latest,
        };
    }
}

/// Handle to a running watcher
pub struct WatcherHandle {
    pub id: Uuid,
    pub root: PathBuf,
    watch: JoinHandle<()>,
    dispatch: JoinHandle<()>,
}

impl WatcherHandle {
    /// Wait for both tasks to finish (after cancellation)
    pub async fn join(self) {
        if let Err(e) = self.watch.await {
            warn!("Watch task for {} ended abnormally: {}", self.root.display(), e);
        }
        if let Err(e) = self.dispatch.await {
            warn!("Dispatch task for {} ended abnormally: {}", self.root.display(), e);
        }
    }
}

/// Watches one root for one kind of definition
pub struct DirectoryWatcher {
    id: Uuid,
    root: PathBuf,
    filter: WatchFilter,
    config: WatcherConfig,
    cancel: CancellationToken,
    // Must stay alive for notifications to keep flowing
    _watcher: RecommendedWatcher,
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    dispatch_tx: mpsc::UnboundedSender<WatchEvent>,
}

impl DirectoryWatcher {
    /// Start observing `root` immediately and spawn the watch and dispatch tasks
    pub fn spawn(
        root: impl Into<PathBuf>,
        filter: WatchFilter,
        handler: Arc<dyn WatchHandler>,
        config: WatcherConfig,
        cancel: CancellationToken,
    ) -> Result<WatcherHandle, WatchError> {
        let root = root.into();
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let watcher = Self::new(root.clone(), filter, config, cancel, dispatch_tx)?;
        let id = watcher.id;

        let dispatch = tokio::spawn(dispatch_loop(id, dispatch_rx, handler));
        let watch = tokio::spawn(watcher.run());

        Ok(WatcherHandle {
            id,
            root,
            watch,
            dispatch,
        })
    }

    fn new(
        root: PathBuf,
        filter: WatchFilter,
        config: WatcherConfig,
        cancel: CancellationToken,
        dispatch_tx: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Self, WatchError> {
        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                // Runs on notify's thread; drops the event once the task is gone
                let _ = event_tx.blocking_send(res);
            },
            Config::default().with_poll_interval(config.poll_interval),
        )
        .map_err(WatchError::Init)?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Watch {
                path: root.clone(),
                source,
            })?;

        let id = Uuid::new_v4();
        info!("Watching {} for {} files ({})", root.display(), filter.suffix, id);

        Ok(Self {
            id,
            root,
            filter,
            config,
            cancel,
            _watcher: watcher,
            event_rx,
            dispatch_tx,
        })
    }

    async fn run(mut self) {
        let mut pending: HashMap<PathBuf, PendingChange> = HashMap::new();
        let tick = self.config.debounce.max(Duration::from_millis(10));
        let mut debounce_interval = tokio::time::interval(tick);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Watcher {} cancelled", self.id);
                    break;
                }

                event = self.event_rx.recv() => {
                    match event {
                        Some(Ok(event)) => {
                            self.process_event(&mut pending, &event);
                            if self.config.debounce.is_zero() {
                                self.flush_all(&mut pending);
                            }
                        }
                        Some(Err(e)) => warn!("Watcher error on {}: {}", self.root.display(), e),
                        None => {
                            debug!("Watcher {} channel closed", self.id);
                            break;
                        }
                    }
                }

                _ = debounce_interval.tick() => {
                    self.flush_settled(&mut pending);
                }
            }
        }

        if !pending.is_empty() {
            debug!("Flushing {} pending changes on shutdown", pending.len());
            self.flush_all(&mut pending);
        }

        info!("Stopped watching {}", self.root.display());
    }

    fn process_event(&self, pending: &mut HashMap<PathBuf, PendingChange>, event: &Event) {
        for change in classify(event) {
            let Some(path) = self.filter.accept(&change.path) else {
                trace!("Ignoring {} on {}", change.op, change.path.display());
                continue;
            };

            trace!("{} {}", change.op, path.display());
            match pending.get_mut(&path) {
                Some(existing) => existing.update(change.op),
                None => {
                    pending.insert(path, PendingChange::new(change.op));
                }
            }
        }
    }

    fn flush_settled(&self, pending: &mut HashMap<PathBuf, PendingChange>) {
        let now = Instant::now();
        let debounce = self.config.debounce;

        let mut settled: Vec<(PathBuf, Instant)> = pending
            .iter()
            .filter(|(_, change)| now.duration_since(change.last_event) >= debounce)
            .map(|(path, change)| (path.clone(), change.last_event))
            .collect();
        settled.sort_by_key(|(_, last_event)| *last_event);

        for (path, _) in settled {
            if let Some(change) = pending.remove(&path) {
                self.send(path, change);
            }
        }
    }

    fn flush_all(&self, pending: &mut HashMap<PathBuf, PendingChange>) {
        let mut changes: Vec<(PathBuf, PendingChange)> = pending.drain().collect();
        changes.sort_by_key(|(_, change)| change.last_event);

        for (path, change) in changes {
            self.send(path, change);
        }
    }

    fn send(&self, path: PathBuf, change: PendingChange) {
        if self.dispatch_tx.send(WatchEvent::new(change.op, path)).is_err() {
            warn!("Dispatch task for {} is gone; dropping event", self.root.display());
        }
    }
}

async fn dispatch_loop(
    id: Uuid,
    mut rx: mpsc::UnboundedReceiver<WatchEvent>,
    handler: Arc<dyn WatchHandler>,
) {
    while let Some(event) = rx.recv().await {
        let handler = handler.clone();
        let label = format!("{} {}", event.op, event.path.display());

        // Handlers do blocking file I/O; a panic only loses this one event
        if let Err(e) = tokio::task::spawn_blocking(move || handler.handle(event)).await {
            warn!("Handler for {} failed: {}", label, e);
        }
    }

    debug!("Dispatcher for watcher {} stopped", id);
}
