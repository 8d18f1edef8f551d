use crate::{Identifier, Kind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Events emitted while definitions are loaded, replaced and removed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReloadEvent {
    Loaded {
        kind: Kind,
        id: Identifier,
        timestamp: DateTime<Utc>,
    },
    Removed {
        kind: Kind,
        id: Identifier,
        timestamp: DateTime<Utc>,
    },
    Failed {
        kind: Kind,
        path: PathBuf,
        error: String,
        timestamp: DateTime<Utc>,
    },
    ServiceStopped {
        generation: u64,
        timestamp: DateTime<Utc>,
    },
    ServiceStarted {
        generation: u64,
        timestamp: DateTime<Utc>,
    },
}

impl ReloadEvent {
    pub fn loaded(kind: Kind, id: Identifier) -> Self {
        ReloadEvent::Loaded {
            kind,
            id,
            timestamp: Utc::now(),
        }
    }

    pub fn removed(kind: Kind, id: Identifier) -> Self {
        ReloadEvent::Removed {
            kind,
            id,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(kind: Kind, path: impl Into<PathBuf>, error: impl ToString) -> Self {
        ReloadEvent::Failed {
            kind,
            path: path.into(),
            error: error.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn service_stopped(generation: u64) -> Self {
        ReloadEvent::ServiceStopped {
            generation,
            timestamp: Utc::now(),
        }
    }

    pub fn service_started(generation: u64) -> Self {
        ReloadEvent::ServiceStarted {
            generation,
            timestamp: Utc::now(),
        }
    }
}

/// Process-wide reload event bus
pub struct EventBus {
    sender: broadcast::Sender<ReloadEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn emit(&self, event: ReloadEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
