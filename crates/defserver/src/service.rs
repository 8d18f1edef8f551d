// crates/defserver/src/service.rs

use crate::handlers::{get_definition, health_check, list_registries, websocket_events};
use crate::routes::RouteTable;
use crate::AppState;
use actix_cors::Cors;
use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpServer};
use async_trait::async_trait;
use defcore::{EventBus, Registries};
use defruntime::{ServiceController, ServiceError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Seconds a stopping listener gets to finish in-flight requests
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

struct Listener {
    handle: ServerHandle,
    task: JoinHandle<std::io::Result<()>>,
}

/// Actix listener serving the mounted API routes.
///
/// Every `start` snapshots the API registry into a fresh [`RouteTable`];
/// `stop` drains the running listener before returning, so the address is
/// free again for the next `start`.
pub struct ActixService {
    address: String,
    registries: Registries,
    events: Arc<EventBus>,
    workers: Option<usize>,
    generation: AtomicU64,
    listener: Mutex<Option<Listener>>,
}

impl ActixService {
    pub fn new(address: impl Into<String>, registries: Registries, events: Arc<EventBus>) -> Self {
        Self {
            address: address.into(),
            registries,
            events,
            workers: None,
            generation: AtomicU64::new(0),
            listener: Mutex::new(None),
        }
    }

    /// Fix the worker count instead of one per core
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers.max(1));
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn is_running(&self) -> bool {
        self.listener.lock().await.is_some()
    }
}

#[async_trait]
impl ServiceController for ActixService {
    async fn stop(&self) -> Result<(), ServiceError> {
        let Some(listener) = self.listener.lock().await.take() else {
            return Ok(());
        };

        info!("Stopping listener on {}", self.address);
        listener.handle.stop(true).await;

        match listener.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ServiceError::Other(e.to_string())),
            Err(e) => Err(ServiceError::Other(format!("listener task failed: {}", e))),
        }
    }

    async fn start(&self) -> Result<(), ServiceError> {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return Err(ServiceError::Other(format!(
                "a listener is already running on {}",
                self.address
            )));
        }

        let table = Arc::new(RouteTable::build(self.registries.apis.as_ref()));
        if table.is_empty() {
            warn!("No API routes to mount");
        }
        let route_count = table.len();

        let state = web::Data::new(AppState {
            registries: self.registries.clone(),
            events: self.events.clone(),
            generation: self.generation.fetch_add(1, Ordering::Relaxed) + 1,
        });

        let mut server = HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);
            let table = table.clone();

            App::new()
                .app_data(state.clone())
                .wrap(cors)
                .wrap(actix_web::middleware::Logger::default())
                .service(health_check)
                .service(list_registries)
                .service(get_definition)
                .service(websocket_events)
                .configure(move |cfg| table.configure(cfg))
        })
        .disable_signals()
        .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS);
        if let Some(workers) = self.workers {
            server = server.workers(workers);
        }

        let server = server
            .bind(&self.address)
            .map_err(|source| ServiceError::Bind {
                address: self.address.clone(),
                source,
            })?
            .run();

        let handle = server.handle();
        let task = tokio::spawn(server);
        *listener = Some(Listener { handle, task });

        info!("🌐 Listening on http://{} ({} API routes)", self.address, route_count);
        Ok(())
    }
}
