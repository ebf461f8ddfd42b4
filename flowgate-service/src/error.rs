use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use flowgate_crypto::{EnvelopeError, HybridError};
use flowgate_flows::FlowError;
use thiserror::Error;

/// Terminal failure states of the request lifecycle.
///
/// Every error produced on the request path is converted into one of these
/// variants at the handler boundary and mapped to a status code. The
/// response body is always empty: no stack trace, plaintext fragment or key
/// material ever leaves the process in a response.
#[derive(Debug, Error)]
pub enum FlowServiceError {
    /// Signature missing, malformed or mismatching.
    #[error("Request signature verification failed")]
    Unauthorized,

    /// Envelope fields missing, not base64, or carrying a wrong-size IV.
    #[error("Malformed encrypted envelope: `{0}`")]
    MalformedEnvelope(#[from] EnvelopeError),

    /// RSA-OAEP unwrap of the symmetric key failed.
    #[error("Failed to recover the symmetric key")]
    KeyRecovery,

    /// AEAD tag mismatch while decrypting the request body.
    #[error("Failed to decrypt the request body")]
    BodyDecryption,

    /// The body decrypted but its plaintext is not the expected JSON.
    #[error("Decrypted payload is malformed")]
    MalformedPayload,

    /// The business-logic collaborator failed.
    #[error("Flow handler failed: `{0}`")]
    BusinessLogic(#[from] FlowError),

    /// Encryption-side failure after the request was already validated.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<HybridError> for FlowServiceError {
    fn from(error: HybridError) -> Self {
        match error {
            HybridError::KeyRecovery(_) => Self::KeyRecovery,
            HybridError::BodyDecryptionFailed => Self::BodyDecryption,
            HybridError::MalformedPayload(_) => Self::MalformedPayload,
            HybridError::SerializationFailed(_) | HybridError::EncryptionFailed => {
                Self::Internal("response encryption failed".to_owned())
            }
        }
    }
}

impl FlowServiceError {
    /// Returns the externally visible status code for this failure.
    ///
    /// Key-recovery and body-decryption failures map to the same 421 so a
    /// caller cannot distinguish "wrong key" from "tampered body" and use the
    /// endpoint as a decryption oracle. 421 tells the platform to re-fetch
    /// the public key it holds for this endpoint.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MalformedEnvelope(_) | Self::KeyRecovery | Self::BodyDecryption => {
                StatusCode::MISDIRECTED_REQUEST
            }
            Self::MalformedPayload | Self::BusinessLogic(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::MalformedEnvelope(_) => "malformed_envelope",
            Self::KeyRecovery => "key_recovery_error",
            Self::BodyDecryption => "body_decryption_error",
            Self::MalformedPayload => "malformed_payload",
            Self::BusinessLogic(_) => "business_logic_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for FlowServiceError {
    fn into_response(self) -> Response {
        tracing::error!(
            target = "flowgate-service",
            event = "request_failed",
            kind = self.kind(),
            status = self.status_code().as_u16(),
            "Request failed: {self}"
        );
        self.status_code().into_response()
    }
}
