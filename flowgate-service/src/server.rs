use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use flowgate_crypto::RsaKeyPairManager;
use flowgate_flows::FlowHandler;
use serde_json::json;
use tokio::{net::TcpListener, signal, sync::watch::Sender};
use tracing::info;
use utoipa::OpenApi;

use crate::{
    handlers::{
        flow_exchange::{flow_exchange_handler, FLOW_EXCHANGE_PATH},
        webhook::{verify_webhook, webhook_notification, WEBHOOK_PATH},
    },
    middleware::signature_verification_middleware,
};

const HEALTH_PATH: &str = "/health";

/// OpenAPI documentation for the flow endpoint
#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        root,
        crate::handlers::flow_exchange::flow_exchange_handler,
        crate::handlers::webhook::verify_webhook,
        crate::handlers::webhook::webhook_notification
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "flow-exchange", description = "Encrypted flow data exchange endpoint"),
        (name = "webhook", description = "Webhook verification and notifications")
    )
)]
pub struct OpenApiDoc;

/// Shared state of the flow endpoint.
///
/// Everything in here is immutable after startup and shared across request
/// tasks by cloning cheap handles; no component mutates it post-load, so no
/// locking is involved. Per-request cryptographic material (symmetric key,
/// nonce, decrypted payload) never lives here.
#[derive(Clone)]
pub struct AppState {
    /// App secret shared with the platform, keyed into the HMAC signature
    /// check. Loaded once from the environment.
    pub app_secret: Arc<Vec<u8>>,

    /// The endpoint's RSA private key, decrypted from its
    /// passphrase-protected PEM exactly once at startup and never re-read
    /// from disk per request.
    pub key_manager: Arc<RsaKeyPairManager>,

    /// Business-logic collaborator deciding which screen to show next.
    /// A trait object so tests can substitute a double that skips real
    /// screen logic.
    pub flow_handler: Arc<dyn FlowHandler>,

    /// Token expected in the platform's webhook verification handshake.
    pub webhook_verify_token: Arc<String>,
}

/// Creates the router for the flow endpoint.
///
/// The signature-verification layer wraps only the encrypted flow-exchange
/// route: webhook verification and health checks are unauthenticated by
/// design (the platform performs the verification handshake before it has
/// any signing secret exchange with this endpoint).
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route(FLOW_EXCHANGE_PATH, post(flow_exchange_handler).get(root))
        .layer(from_fn_with_state(
            app_state.clone(),
            signature_verification_middleware,
        ))
        .route(WEBHOOK_PATH, get(verify_webhook).post(webhook_notification))
        .route(HEALTH_PATH, get(health))
        .with_state(app_state)
}

/// Starts and runs the HTTP server with graceful shutdown handling.
///
/// Serves until a Ctrl+C signal arrives, then signals the rest of the
/// application over the watch channel.
///
/// # Errors
/// Returns an error if the server fails while running or the shutdown
/// signal cannot be sent.
pub async fn run_server(
    app_state: AppState,
    tcp_listener: TcpListener,
    shutdown_sender: Sender<bool>,
) -> anyhow::Result<()> {
    let app = create_router(app_state);
    let shutdown_signal = async {
        signal::ctrl_c()
            .await
            .expect("Failed to parse Ctrl+C signal");
        info!("Shutting down server...");
    };
    let server =
        axum::serve(tcp_listener, app.into_make_service()).with_graceful_shutdown(shutdown_signal);
    server.await?;

    shutdown_sender.send(true)?;

    Ok(())
}

/// Serves the informational root page.
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "Service banner", content_type = "text/plain")
    )
)]
pub async fn root() -> &'static str {
    "Flow endpoint gateway is running"
}

/// Handles the health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = Value)
    )
)]
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "service": "flowgate" }))
}
