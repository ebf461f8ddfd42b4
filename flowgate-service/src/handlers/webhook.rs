use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::server::AppState;

/// Path of the webhook verification and notification endpoint.
pub const WEBHOOK_PATH: &str = "/webhook";

/// Query parameters of the platform's webhook verification handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Answers the platform's webhook verification handshake.
///
/// The platform sends a GET with `hub.mode=subscribe`, the verify token
/// configured for this endpoint and a challenge string; echoing the
/// challenge as plain text confirms ownership. Any other combination is
/// rejected with 403.
#[utoipa::path(
    get,
    path = "/webhook",
    tag = "webhook",
    responses(
        (status = 200, description = "Challenge echoed back", content_type = "text/plain"),
        (status = 403, description = "Verification token mismatch")
    )
)]
#[instrument(level = "info", skip_all, fields(path = WEBHOOK_PATH))]
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    let subscribe = params.mode.as_deref() == Some("subscribe");
    let token_matches = params.verify_token.as_deref() == Some(state.webhook_verify_token.as_str());
    if subscribe && token_matches {
        info!(
            target = "flowgate-service",
            event = "webhook_verified",
            "Webhook verified successfully"
        );
        params.challenge.unwrap_or_default().into_response()
    } else {
        warn!(
            target = "flowgate-service",
            event = "webhook_verification_failed",
            "Webhook verification failed"
        );
        StatusCode::FORBIDDEN.into_response()
    }
}

/// Acknowledges message and status notifications.
///
/// Distinct from the encrypted flow endpoint: notifications arrive as plain
/// JSON and only need an acknowledgement. Incoming messages are logged by
/// sender so operators can trace deliveries.
#[utoipa::path(
    post,
    path = "/webhook",
    tag = "webhook",
    responses(
        (status = 200, description = "Notification acknowledged", body = Value)
    )
)]
#[instrument(level = "info", skip_all, fields(path = WEBHOOK_PATH))]
pub async fn webhook_notification(Json(body): Json<Value>) -> Json<Value> {
    let messages = body
        .pointer("/entry/0/changes/0/value/messages")
        .and_then(Value::as_array);
    if let Some(messages) = messages {
        for message in messages {
            info!(
                target = "flowgate-service",
                event = "message_received",
                from = message.get("from").and_then(serde_json::Value::as_str).unwrap_or("<unknown>"),
                message_type = message.get("type").and_then(serde_json::Value::as_str).unwrap_or("<unknown>"),
                "New message notification"
            );
        }
    }
    Json(json!({ "status": "ok" }))
}
