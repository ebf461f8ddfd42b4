use axum::{body::Bytes, extract::State, response::IntoResponse, response::Response};
use flowgate_crypto::{decrypt_request, encode_response, encrypt_response, EncryptedEnvelope};
use flowgate_flows::FlowRequest;
use tracing::{info, instrument};

use crate::{error::FlowServiceError, server::AppState};

/// Path of the encrypted flow data exchange endpoint.
pub const FLOW_EXCHANGE_PATH: &str = "/";

/// Handles one encrypted flow exchange.
///
/// Runs the post-authentication stages of the request lifecycle: envelope
/// decode, hybrid decryption, the business-logic collaborator, response
/// encryption and wire encoding. The middleware has already authenticated
/// the raw body, so by the time this handler sees it the request is in the
/// `Authenticated` state.
///
/// The symmetric key recovered from the envelope lives on this handler's
/// stack for the duration of the call and is dropped with it; nothing is
/// retained across requests.
///
/// # Errors
/// * 421 when the envelope cannot be decoded or decrypted (the platform's
///   signal to re-fetch the endpoint public key)
/// * 500 when the decrypted payload is malformed, the collaborator fails,
///   or response encryption fails after validation
#[utoipa::path(
    post,
    path = "/",
    tag = "flow-exchange",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Encrypted response payload, base64 over ciphertext and tag", content_type = "text/plain"),
        (status = 401, description = "Request signature verification failed"),
        (status = 421, description = "Envelope could not be decrypted; platform should refresh the public key"),
        (status = 500, description = "Business logic or internal failure")
    )
)]
#[instrument(level = "info", skip_all, fields(path = FLOW_EXCHANGE_PATH))]
pub async fn flow_exchange_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, FlowServiceError> {
    let envelope = EncryptedEnvelope::from_json_bytes(&body)?;
    let decrypted = decrypt_request(&envelope, &state.key_manager)?;

    let request: FlowRequest =
        serde_json::from_value(decrypted.body).map_err(|_| FlowServiceError::MalformedPayload)?;
    info!(
        target = "flowgate-service",
        event = "flow_request_decrypted",
        action = request.action.as_str(),
        screen = request.screen.as_deref().unwrap_or("<none>"),
        "Decrypted flow request"
    );

    let response_payload = state.flow_handler.next_screen(&request).await?;

    let (ciphertext, auth_tag) = encrypt_response(
        &response_payload,
        &decrypted.aes_key,
        &decrypted.initial_vector,
    )?;
    Ok(encode_response(&ciphertext, &auth_tag).into_response())
}
