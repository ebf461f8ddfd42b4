use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use flowgate_crypto::verify_signature;
use tracing::{error, instrument};

use crate::{error::FlowServiceError, server::AppState};

/// Upper bound on the body size accepted for signature verification.
const MAX_BODY_SIZE: usize = 1024 * 1024; // 1MB

/// Header carrying the platform's HMAC-SHA256 signature of the body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Middleware authenticating every flow-exchange request.
///
/// Reads the raw body and verifies the `x-hub-signature-256` header against
/// the shared app secret before anything downstream parses a single byte:
/// an unauthenticated body must not influence any observable behavior beyond
/// the rejection itself, so this layer runs strictly ahead of envelope
/// decoding and decryption. The verified bytes are reassembled into the
/// request for the handler.
///
/// # Errors
/// Returns [`FlowServiceError::Unauthorized`] (HTTP 401) when the header is
/// missing or malformed, when the body cannot be read, or when the digest
/// does not match.
#[instrument(level = "trace", skip_all)]
pub async fn signature_verification_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, FlowServiceError> {
    // The platform only signs POST deliveries; the informational GET on
    // the same path carries no signature header.
    if req.method() != Method::POST {
        return Ok(next.run(req).await);
    }

    let (req_parts, req_body) = req.into_parts();

    let signature_header = req_parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let body_bytes = axum::body::to_bytes(req_body, MAX_BODY_SIZE)
        .await
        .map_err(|_| {
            error!(
                target = "flowgate-service",
                event = "body_read_failed",
                "Failed to read request body for signature verification"
            );
            FlowServiceError::Unauthorized
        })?;

    if !verify_signature(&body_bytes, signature_header, &state.app_secret) {
        error!(
            target = "flowgate-service",
            event = "signature_mismatch",
            "Request signature did not match"
        );
        return Err(FlowServiceError::Unauthorized);
    }

    let req = Request::from_parts(req_parts, Body::from(body_bytes));
    Ok(next.run(req).await)
}
