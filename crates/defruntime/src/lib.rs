//! Definition loading runtime
//!
//! This crate scans definition roots into registries at startup, then keeps
//! the registries in sync with on-disk edits: one watcher per watched root and
//! kind, a reload dispatcher per kind, and a restart coordinator for the
//! listener serving API routes.

mod builtin;
mod bundle;
mod config;
mod dispatcher;
mod registry;
mod runtime;
pub mod scanner;
mod service;
pub mod watcher;

pub use builtin::{builtin_bundle, BUILTIN};
pub use bundle::{AssetBundle, MemoryBundle, StaticBundle};
pub use config::{LoaderConfig, RunMode};
pub use dispatcher::{ReloadDispatcher, ReloadOutcome};
pub use registry::{in_memory_registries, DefinitionRegistry};
pub use runtime::{DefinitionRuntime, LoadSummary, WatchTarget};
pub use service::{RestartCoordinator, RestartHandle, ServiceController, ServiceError};
pub use watcher::{
    DirectoryWatcher, WatchError, WatchEvent, WatchFilter, WatchHandler, WatchOp, WatcherConfig,
    WatcherHandle,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Loader(#[from] defcore::LoaderError),

    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("Definitions must be loaded before watching starts")]
    NotLoaded,
}
