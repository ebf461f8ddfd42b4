//! Business logic behind the encrypted flow endpoint.
//!
//! The gateway hands every decrypted request to a [`FlowHandler`] and
//! encrypts whatever JSON it returns. Handlers are pure with respect to
//! cryptography: they never see keys, nonces or ciphertext, which keeps them
//! trivially testable without exercising the crypto path.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod contact;

pub use contact::ContactFlow;

/// Flow data API version used when the request does not carry one.
pub const DEFAULT_FLOW_VERSION: &str = "3.0";

type Result<T> = std::result::Result<T, FlowError>;

/// Action requested by the platform for this exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FlowAction {
    /// Health check; the platform sends these periodically.
    Ping,
    /// First request of a flow session, asks for the initial screen.
    Init,
    /// The user submitted a screen; carries the form data.
    DataExchange,
    /// Anything this endpoint does not recognize.
    Other(String),
}

impl Default for FlowAction {
    /// A payload without an `action` field behaves like an unrecognized
    /// action: the handler reports it in-band rather than rejecting the
    /// request outright.
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for FlowAction {
    fn from(action: String) -> Self {
        match action.as_str() {
            "ping" => Self::Ping,
            "INIT" => Self::Init,
            "data_exchange" => Self::DataExchange,
            _ => Self::Other(action),
        }
    }
}

impl FlowAction {
    /// The wire spelling of this action, for logging and error payloads.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ping => "ping",
            Self::Init => "INIT",
            Self::DataExchange => "data_exchange",
            Self::Other(action) => action,
        }
    }
}

/// A decrypted flow request, as handed to a [`FlowHandler`].
///
/// Deserialized from the plaintext JSON recovered by the gateway. Ownership
/// of the decrypted content passes to the handler here; the gateway keeps no
/// copy beyond the request cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowRequest {
    /// Flow data API version, defaulted when absent.
    #[serde(default = "default_version")]
    pub version: String,
    /// The requested action; defaults to [`FlowAction::Other`] with an
    /// empty name when the payload carries none.
    #[serde(default)]
    pub action: FlowAction,
    /// The screen the user submitted from, absent for `ping` and `INIT`.
    #[serde(default)]
    pub screen: Option<String>,
    /// Form data submitted with the screen.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Opaque token identifying this flow session.
    #[serde(default)]
    pub flow_token: Option<String>,
}

fn default_version() -> String {
    DEFAULT_FLOW_VERSION.to_owned()
}

impl FlowRequest {
    /// Returns the string value of a form field, if present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }
}

/// Strategy deciding which screen to show next.
///
/// One implementation per flow type; the gateway holds it behind a trait
/// object so tests can substitute a double that skips real screen logic.
#[async_trait]
pub trait FlowHandler: Send + Sync {
    /// Produces the response payload for one decrypted request.
    ///
    /// The returned JSON is encrypted verbatim by the gateway. In-band
    /// problems (unknown screen, invalid form input) should be reported
    /// inside the payload so the user sees them on the device; an `Err` is
    /// reserved for genuine handler failures and surfaces to the platform as
    /// an internal server error.
    ///
    /// # Errors
    /// Returns [`FlowError`] when the handler itself fails.
    async fn next_screen(&self, request: &FlowRequest) -> Result<Value>;
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Flow handler failed: {0}")]
    Internal(String),
}
