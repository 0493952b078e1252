//! Handler tests for the admin email endpoints
//!
//! These run against in-memory storage and the mock transport, so they
//! exercise routing, (de)serialization and status codes without Docker.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain_notifications::*;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For oneshot()

async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn supervisor(last: &str, plant: &str) -> DirectoryUser {
    DirectoryUser {
        first_name: "Pat".into(),
        last_name: last.into(),
        email: format!("{}@plant.local", last.to_lowercase()),
        plant: plant.into(),
        is_admin: false,
        is_supervisor: true,
        has_credentials: true,
    }
}

fn app_with(transport: MockSmtpTransport) -> (Router, Arc<NotificationService>) {
    let directory = InMemoryUserDirectory::new(vec![supervisor("Nguyen", "Dallas")]);
    let service = Arc::new(
        NotificationService::new(
            Repositories::in_memory(directory),
            Arc::new(transport),
            ProcessorSettings::default(),
        )
        .unwrap(),
    );
    (handlers::router(service.clone()), service)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_get_config_returns_defaults_without_secret() {
    let (app, _) = app_with(MockSmtpTransport::new());

    let response = app
        .oneshot(empty_request("GET", "/admin/email/config"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["server"], "smtp.office365.com");
    assert_eq!(body["port"], 587);
    assert_eq!(body["has_secret"], false);
    assert!(body.get("auth_secret").is_none());
}

#[tokio::test]
async fn test_put_config_stores_snapshot() {
    let (app, service) = app_with(MockSmtpTransport::new());

    let response = app
        .oneshot(json_request(
            "PUT",
            "/admin/email/config",
            json!({
                "server": "smtp.plant.local",
                "port": 25,
                "auth_principal": "alerts@plant.local",
                "auth_secret": "s3cret",
                "auth_mode": "none",
                "use_auth": false,
                "timeout_seconds": 10,
                "max_retries": 5
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let view: TransportConfigView = json_body(response.into_body()).await;
    assert_eq!(view.server, "smtp.plant.local");
    assert!(view.has_secret);

    let stored = service.load_config().await;
    assert_eq!(stored.port, 25);
    assert_eq!(stored.auth_mode, AuthMode::None);
    assert_eq!(stored.max_retries, 5);
}

#[tokio::test]
async fn test_put_config_rejects_zero_port() {
    let (app, service) = app_with(MockSmtpTransport::new());

    let response = app
        .oneshot(json_request(
            "PUT",
            "/admin/email/config",
            json!({
                "server": "smtp.plant.local",
                "port": 0,
                "auth_principal": "alerts@plant.local",
                "timeout_seconds": 10,
                "max_retries": 3
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert_eq!(service.load_config().await, TransportConfig::default());
}

#[tokio::test]
async fn test_put_config_rejects_oversized_timeout() {
    let (app, service) = app_with(MockSmtpTransport::new());

    let response = app
        .oneshot(json_request(
            "PUT",
            "/admin/email/config",
            json!({
                "server": "smtp.plant.local",
                "port": 587,
                "auth_principal": "alerts@plant.local",
                "timeout_seconds": u64::MAX / 2,
                "max_retries": 3
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert_eq!(service.load_config().await, TransportConfig::default());
    assert_eq!(service.process_queue().await.errors, 0);
}

#[tokio::test]
async fn test_test_connection_reports_reachability() {
    let (app, _) = app_with(MockSmtpTransport::new().with_reachable(false));

    let response = app
        .oneshot(empty_request("POST", "/admin/email/test-connection"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let check: handlers::ConnectionCheck = json_body(response.into_body()).await;
    assert!(!check.ok);
}

#[tokio::test]
async fn test_process_then_status() {
    let transport = MockSmtpTransport::new();
    let (app, service) = app_with(transport.clone());

    let payload = ReportPayload {
        report_id: Some(9),
        plant: Some("Dallas".into()),
        ..ReportPayload::default()
    };
    let queued = service
        .notify_report(NotificationKind::NewReport, &payload)
        .await;
    assert_eq!(queued.queued, 1);

    let response = app
        .clone()
        .oneshot(empty_request("POST", "/admin/email/process"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome: BatchOutcome = json_body(response.into_body()).await;
    assert_eq!(outcome.sent_count, 1);
    assert!(!outcome.skipped);

    let response = app
        .oneshot(empty_request("GET", "/admin/email/status?limit=5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status: QueueStatus = json_body(response.into_body()).await;
    assert_eq!(status.sent_count, 1);
    assert_eq!(status.pending_count, 0);
    assert_eq!(status.recent_entries.len(), 1);
    assert_eq!(status.recent_entries[0].recipient_address, "nguyen@plant.local");
    assert!(transport.was_sent_to("nguyen@plant.local").await);
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app_with(MockSmtpTransport::new());

    let response = app
        .oneshot(empty_request("GET", "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["status"], "healthy");
}
