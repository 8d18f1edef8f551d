// crates/defserver/tests/service_test.rs

use defcore::{EventBus, Identifier, Registry};
use defruntime::{in_memory_registries, ServiceController, ServiceError};
use defserver::ActixService;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn free_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}

async fn get(address: &str, path: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(address).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, address
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    let status = response
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

fn load_api(registry: &dyn Registry, id: &str, process: &str) {
    let body = serde_json::json!({
        "name": id,
        "group": "orders",
        "paths": [{"path": "/", "method": "GET", "process": process}]
    });
    registry
        .load(&Identifier::new(id), body.to_string().as_bytes())
        .unwrap();
}

#[actix_web::test]
async fn test_restart_picks_up_changed_routes() {
    let registries = in_memory_registries();
    load_api(registries.apis.as_ref(), "orders", "models.order.List");
    let address = free_address();
    let service = ActixService::new(address.clone(), registries.clone(), Arc::new(EventBus::default()))
        .with_workers(1);

    service.start().await.unwrap();
    let (status, body) = get(&address, "/api/orders").await;
    assert_eq!(status, 200);
    assert!(body.contains("models.order.List"));

    // The running listener keeps its snapshot
    load_api(registries.apis.as_ref(), "orders", "flows.orders.list");
    let (_, body) = get(&address, "/api/orders").await;
    assert!(body.contains("models.order.List"));

    service.stop().await.unwrap();
    service.start().await.unwrap();

    let (status, body) = get(&address, "/api/orders").await;
    assert_eq!(status, 200);
    assert!(body.contains("flows.orders.list"));

    let (status, body) = get(&address, "/health").await;
    assert_eq!(status, 200);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["generation"], 2);
    assert_eq!(health["definitions"]["apis"], 1);

    service.stop().await.unwrap();
    assert!(!service.is_running().await);
}

#[actix_web::test]
async fn test_registries_listing() {
    let registries = in_memory_registries();
    load_api(registries.apis.as_ref(), "orders", "models.order.List");
    registries
        .models
        .load(&Identifier::new("xiang.user"), br#"{"table": "users"}"#)
        .unwrap();
    let address = free_address();
    let service = ActixService::new(address.clone(), registries, Arc::new(EventBus::default()))
        .with_workers(1);
    service.start().await.unwrap();

    let (status, body) = get(&address, "/__defs/registries").await;
    assert_eq!(status, 200);
    let listing: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(listing["models"], serde_json::json!(["xiang.user"]));
    assert_eq!(listing["apis"], serde_json::json!(["orders"]));
    assert_eq!(listing["flows"], serde_json::json!([]));

    let (status, body) = get(&address, "/__defs/registries/models/xiang.user").await;
    assert_eq!(status, 200);
    assert!(body.contains("users"));

    let (status, _) = get(&address, "/__defs/registries/models/nobody").await;
    assert_eq!(status, 404);
    let (status, _) = get(&address, "/__defs/registries/widgets/x").await;
    assert_eq!(status, 404);

    service.stop().await.unwrap();
}

#[actix_web::test]
async fn test_start_reports_bind_failure() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = occupied.local_addr().unwrap().to_string();
    let service = ActixService::new(
        address.clone(),
        in_memory_registries(),
        Arc::new(EventBus::default()),
    );

    let err = service.start().await.unwrap_err();
    assert!(matches!(err, ServiceError::Bind { address: ref a, .. } if a == &address));
    assert!(!service.is_running().await);
}

#[actix_web::test]
async fn test_double_start_is_rejected_and_stop_is_idempotent() {
    let address = free_address();
    let service = ActixService::new(address, in_memory_registries(), Arc::new(EventBus::default()))
        .with_workers(1);

    service.stop().await.unwrap();
    service.start().await.unwrap();
    assert!(matches!(service.start().await, Err(ServiceError::Other(_))));

    service.stop().await.unwrap();
    service.stop().await.unwrap();
}
