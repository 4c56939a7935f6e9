//! HTTP ingress: a health endpoint and the notification webhook.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::model::{NotificationEvent, NotificationKind, ProcessOutcome};
use crate::relay::Relay;

pub fn router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook/notification", post(webhook))
        .with_state(relay)
}

/// Liveness probe; answers healthy unconditionally.
async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    office_id: i64,
    notification_type: String,
    #[serde(default)]
    data: Value,
}

/// Webhook ingress. Success (including a suppressed notification) maps
/// to 200; every failure maps to 500 with the error message in the body.
async fn webhook(
    State(relay): State<Arc<Relay>>,
    Json(body): Json<WebhookBody>,
) -> (StatusCode, Json<Value>) {
    info!(
        office_id = body.office_id,
        kind = %body.notification_type,
        "received webhook notification"
    );

    let event = NotificationEvent::new(
        body.office_id,
        NotificationKind::parse(&body.notification_type),
        body.data,
    );

    match relay.process(&event).await {
        Ok(ProcessOutcome::Sent { .. }) | Ok(ProcessOutcome::Suppressed) => (
            StatusCode::OK,
            Json(json!({ "message": "Notification processed successfully" })),
        ),
        Err(err) => {
            error!(?err, "webhook notification failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
        }
    }
}
