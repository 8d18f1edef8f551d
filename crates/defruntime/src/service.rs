use async_trait::async_trait;
use defcore::{EventBus, ReloadEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid route table: {0}")]
    Routes(String),

    #[error("Service error: {0}")]
    Other(String),
}

/// The network listener serving API routes.
///
/// Route tables are only built when a listener is constructed, so API
/// definition changes are applied by stopping and starting it again.
#[async_trait]
pub trait ServiceController: Send + Sync {
    /// Shut down the active listener; returns once it has drained
    async fn stop(&self) -> Result<(), ServiceError>;

    /// Build a fresh listener from the current registries and begin serving
    async fn start(&self) -> Result<(), ServiceError>;

    /// Start again only once the stop has completed
    async fn restart(&self) -> Result<(), ServiceError> {
        self.stop().await?;
        self.start().await
    }
}

/// Cloneable handle for requesting a listener restart
#[derive(Clone)]
pub struct RestartHandle {
    tx: mpsc::Sender<()>,
    requested: Arc<AtomicU64>,
}

impl RestartHandle {
    /// Ask for a restart without waiting for it.
    ///
    /// Returns false if the request was folded into one already queued.
    pub fn request(&self) -> bool {
        self.requested.fetch_add(1, Ordering::Relaxed);
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("Restart already pending; coalescing request");
                false
            }
            Err(TrySendError::Closed(())) => {
                warn!("Restart coordinator has stopped; ignoring request");
                false
            }
        }
    }

    /// Total requests made through any clone of this handle
    pub fn requested(&self) -> u64 {
        self.requested.load(Ordering::Relaxed)
    }
}

/// Serializes stop/start cycles of a [`ServiceController`].
///
/// Requests land in a single-slot channel: while one is queued further
/// requests are coalesced into it, and the coordinator waits out `debounce`
/// before each cycle so a burst of edits produces one restart. A single task
/// runs the cycles, so two listeners are never bound at the same time.
pub struct RestartCoordinator;

impl RestartCoordinator {
    pub fn spawn(
        controller: Arc<dyn ServiceController>,
        debounce: Duration,
        events: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> (RestartHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(1);
        let handle = RestartHandle {
            tx,
            requested: Arc::new(AtomicU64::new(0)),
        };

        let task = tokio::spawn(run(controller, rx, debounce, events, cancel));
        (handle, task)
    }
}

async fn run(
    controller: Arc<dyn ServiceController>,
    mut rx: mpsc::Receiver<()>,
    debounce: Duration,
    events: Arc<EventBus>,
    cancel: CancellationToken,
) {
    let mut generation: u64 = 0;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            request = rx.recv() => {
                if request.is_none() {
                    break;
                }
            }
        }

        if !debounce.is_zero() {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(debounce) => {}
            }
        }

        // Anything that arrived during the quiet period rides along
        while rx.try_recv().is_ok() {}

        generation += 1;
        info!("Restarting service (generation {})", generation);

        if let Err(e) = controller.stop().await {
            warn!("Service did not stop cleanly: {}", e);
        }
        events.emit(ReloadEvent::service_stopped(generation));

        match controller.start().await {
            Ok(()) => {
                info!("Service restarted (generation {})", generation);
                events.emit(ReloadEvent::service_started(generation));
            }
            Err(e) => error!("Service failed to start: {}", e),
        }
    }

    debug!("Restart coordinator stopped after {} restarts", generation);
}
