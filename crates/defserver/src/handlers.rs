// crates/defserver/src/handlers.rs

use crate::AppState;
use actix_web::{get, web, HttpResponse, Responder, Result as ActixResult};
use actix_ws::Message;
use defcore::Kind;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Health check endpoint
#[get("/health")]
pub async fn health_check(data: web::Data<AppState>) -> impl Responder {
    let definitions: serde_json::Map<String, serde_json::Value> = data
        .registries
        .counts()
        .into_iter()
        .map(|(kind, count)| (kind.dir_name().to_string(), serde_json::json!(count)))
        .collect();

    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "defserver",
        "generation": data.generation,
        "definitions": definitions,
    }))
}

/// Identifiers currently registered, per kind
#[get("/__defs/registries")]
pub async fn list_registries(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let listing: serde_json::Map<String, serde_json::Value> = Kind::ALL
        .iter()
        .map(|kind| {
            let ids = data.registries.for_kind(*kind).ids();
            (kind.dir_name().to_string(), serde_json::json!(ids))
        })
        .collect();

    Ok(HttpResponse::Ok().json(listing))
}

/// A single loaded definition
#[get("/__defs/registries/{kind}/{id}")]
pub async fn get_definition(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ActixResult<impl Responder> {
    let (kind, id) = path.into_inner();

    let Some(kind) = Kind::from_dir_name(&kind) else {
        return Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("Unknown definition kind {}", kind),
        }));
    };

    match data.registries.for_kind(kind).get(&id) {
        Some(definition) => Ok(HttpResponse::Ok().json(definition.as_ref())),
        None => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("{} {} not found", kind, id),
        })),
    }
}

/// WebSocket endpoint streaming reload events
#[get("/__defs/events")]
pub async fn websocket_events(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    info!("WebSocket client connected");

    let mut events = data.events.subscribe();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if let Ok(json) = serde_json::to_string(&event) {
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(RecvError::Lagged(missed)) => {
                            warn!("WebSocket client fell behind; {} events dropped", missed);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("WebSocket client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}
