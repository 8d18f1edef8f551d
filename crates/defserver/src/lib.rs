//! HTTP listener for loaded API definitions
//!
//! Mounts every API definition as actix routes, exposes the registries and
//! the reload event stream, and implements [`defruntime::ServiceController`]
//! so API edits rebuild the route table.

mod handlers;
mod routes;
mod service;

pub use routes::{MountedRoute, RouteTable};
pub use service::ActixService;

use defcore::{EventBus, Registries};
use std::sync::Arc;

/// Application state shared across handlers of one listener
pub struct AppState {
    pub registries: Registries,
    pub events: Arc<EventBus>,
    /// How many listeners have been started, this one included
    pub generation: u64,
}
