use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::error::NotificationResult;
use crate::models::{BatchOutcome, QueueStatus, TransportConfig, TransportConfigView};
use crate::queue::DEFAULT_RECENT_LIMIT;
use crate::service::NotificationService;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionCheck {
    pub ok: bool,
}

/// Admin endpoints plus `/health`.
pub fn router(service: Arc<NotificationService>) -> Router {
    Router::new()
        .route("/admin/email/config", get(get_config).put(put_config))
        .route("/admin/email/test-connection", post(test_connection))
        .route("/admin/email/process", post(process_queue))
        .route("/admin/email/status", get(queue_status))
        .route("/health", get(health))
        .with_state(service)
}

/// Current transport configuration, secret redacted
async fn get_config(State(service): State<Arc<NotificationService>>) -> Json<TransportConfigView> {
    Json(service.config_view().await)
}

/// Save a new configuration snapshot
async fn put_config(
    State(service): State<Arc<NotificationService>>,
    Json(config): Json<TransportConfig>,
) -> NotificationResult<Json<TransportConfigView>> {
    let view = service.update_config(config).await?;
    Ok(Json(view))
}

async fn test_connection(State(service): State<Arc<NotificationService>>) -> Json<ConnectionCheck> {
    Json(ConnectionCheck {
        ok: service.test_connection().await,
    })
}

/// Run one batch now
async fn process_queue(State(service): State<Arc<NotificationService>>) -> Json<BatchOutcome> {
    Json(service.process_queue().await)
}

async fn queue_status(
    State(service): State<Arc<NotificationService>>,
    Query(query): Query<StatusQuery>,
) -> NotificationResult<Json<QueueStatus>> {
    let status = service
        .queue_status(query.limit.unwrap_or(DEFAULT_RECENT_LIMIT))
        .await?;
    Ok(Json(status))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "email-processor",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
