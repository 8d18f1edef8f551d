// crates/defserver/src/routes.rs

use actix_web::http::Method;
use actix_web::{web, HttpRequest, HttpResponse};
use defcore::{ApiDefinition, Identifier, Registry};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// One API path mounted on the listener
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MountedRoute {
    pub api: Identifier,
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,
    pub path: String,
    pub process: String,
    pub guard: Option<String>,
}

fn serialize_method<S: serde::Serializer>(method: &Method, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(method.as_str())
}

/// Routes built from a snapshot of the API registry.
///
/// Built once per listener; a changed API definition only becomes visible
/// after the listener is restarted.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<MountedRoute>,
}

impl RouteTable {
    pub fn build(apis: &dyn Registry) -> Self {
        let mut routes = Vec::new();
        let mut seen = HashSet::new();

        for id in apis.ids() {
            let Some(definition) = apis.get(id.as_str()) else {
                // Removed between listing and reading
                continue;
            };
            let Some(value) = definition.json() else {
                continue;
            };
            let api = match ApiDefinition::from_json(value) {
                Ok(api) => api,
                Err(e) => {
                    warn!("Skipping API {}: {}", id, e);
                    continue;
                }
            };

            for entry in &api.paths {
                let method = match Method::from_bytes(entry.method().as_bytes()) {
                    Ok(method) => method,
                    Err(_) => {
                        warn!("Skipping {} {} in API {}: bad method", entry.method, entry.path, id);
                        continue;
                    }
                };
                let path = entry.route(&api.group);

                if !seen.insert((method.clone(), path.clone())) {
                    warn!("{} {} is already mounted; ignoring the copy in API {}", method, path, id);
                    continue;
                }

                debug!("Mounting {} {} -> {}", method, path, entry.process);
                routes.push(MountedRoute {
                    api: id.clone(),
                    method,
                    path,
                    process: entry.process.clone(),
                    guard: entry.guard.clone().or_else(|| api.guard.clone()),
                });
            }
        }

        Self { routes }
    }

    pub fn routes(&self) -> &[MountedRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Register every route on an actix service config
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        for route in &self.routes {
            let mounted = Arc::new(route.clone());
            cfg.route(
                &route.path,
                web::method(route.method.clone()).to(move |req: HttpRequest| {
                    let mounted = mounted.clone();
                    async move { resolve(&mounted, &req) }
                }),
            );
        }
    }
}

/// Describe the process a request resolved to; running it belongs to the engine
fn resolve(route: &MountedRoute, req: &HttpRequest) -> HttpResponse {
    let params: BTreeMap<&str, &str> = req.match_info().iter().collect();

    HttpResponse::Ok().json(serde_json::json!({
        "api": route.api,
        "process": route.process,
        "guard": route.guard,
        "params": params,
        "query": req.query_string(),
    }))
}
