//! Outbound WhatsApp Cloud API client.
//!
//! Sends messages through the Graph API on behalf of the business number:
//! plain text messages and flow messages carrying the interactive flow
//! call-to-action. Inbound traffic never goes through this crate; it is
//! handled by the service's webhook and flow endpoints.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

/// Graph API version the client targets.
pub const DEFAULT_API_VERSION: &str = "v21.0";

const GRAPH_BASE_URL: &str = "https://graph.facebook.com";
const REQUEST_TIMEOUT_SECS: u64 = 30;

type Result<T> = std::result::Result<T, WhatsAppClientError>;

/// Client for the WhatsApp Cloud API.
pub struct WhatsAppClient {
    client: Client,
    access_token: String,
    phone_number_id: String,
    api_version: String,
}

impl WhatsAppClient {
    /// Creates a client for the given business phone number.
    ///
    /// # Errors
    /// Returns [`WhatsAppClientError::ClientBuild`] if the underlying HTTP
    /// client cannot be constructed.
    pub fn new(
        access_token: String,
        phone_number_id: String,
        api_version: Option<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(WhatsAppClientError::ClientBuild)?;
        Ok(Self {
            client,
            access_token,
            phone_number_id,
            api_version: api_version.unwrap_or_else(|| DEFAULT_API_VERSION.to_owned()),
        })
    }

    /// Sends a plain text message.
    ///
    /// # Arguments
    /// * `to` - Recipient phone number in international format, digits only
    /// * `text` - Message body
    /// * `preview_url` - Whether the device should render a URL preview
    ///
    /// # Errors
    /// Returns [`WhatsAppClientError`] if the request fails or the Graph API
    /// responds with a non-success status.
    pub async fn send_text_message(
        &self,
        to: &str,
        text: &str,
        preview_url: bool,
    ) -> Result<Value> {
        self.post_message(text_message_payload(to, text, preview_url))
            .await
    }

    /// Sends an interactive flow message that opens the given flow on the
    /// recipient's device.
    ///
    /// # Errors
    /// Returns [`WhatsAppClientError`] if the request fails or the Graph API
    /// responds with a non-success status.
    pub async fn send_flow_message(
        &self,
        to: &str,
        flow: &FlowMessage<'_>,
    ) -> Result<Value> {
        self.post_message(flow_message_payload(to, flow)).await
    }

    async fn post_message(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{GRAPH_BASE_URL}/{}/{}/messages",
            self.api_version, self.phone_number_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WhatsAppClientError::ApiError {
                status: status.as_u16(),
            });
        }
        let body = response.json::<Value>().await?;
        info!(
            target = "flowgate-client",
            event = "message_sent",
            message_type = payload["type"].as_str().unwrap_or("unknown"),
            "Message accepted by the Cloud API"
        );
        Ok(body)
    }
}

fn text_message_payload(to: &str, text: &str, preview_url: bool) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "text",
        "text": {
            "preview_url": preview_url,
            "body": text,
        },
    })
}

fn flow_message_payload(to: &str, flow: &FlowMessage<'_>) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "interactive",
        "interactive": {
            "type": "flow",
            "header": { "type": "text", "text": flow.header_text },
            "body": { "text": flow.body_text },
            "footer": { "text": flow.footer_text },
            "action": {
                "name": "flow",
                "parameters": {
                    "flow_message_version": "3",
                    "flow_id": flow.flow_id,
                    "flow_token": flow.flow_token,
                    "flow_cta": flow.cta_text,
                    "flow_action": "navigate",
                    "flow_action_payload": { "screen": flow.initial_screen },
                },
            },
        },
    })
}

/// Parameters of an outbound flow message.
#[derive(Debug, Clone)]
pub struct FlowMessage<'a> {
    /// WhatsApp flow ID to open.
    pub flow_id: &'a str,
    /// Unique token identifying this flow session; echoed back to the flow
    /// endpoint in every encrypted request.
    pub flow_token: &'a str,
    /// Header shown above the message body.
    pub header_text: &'a str,
    /// Message body.
    pub body_text: &'a str,
    /// Footer shown below the message body.
    pub footer_text: &'a str,
    /// Call-to-action button label.
    pub cta_text: &'a str,
    /// Screen the flow opens on.
    pub initial_screen: &'a str,
}

#[derive(Debug, Error)]
pub enum WhatsAppClientError {
    #[error("Failed to build HTTP client, with error: `{0}`")]
    ClientBuild(reqwest::Error),
    #[error("Request to the Cloud API failed, with error: `{0}`")]
    Request(#[from] reqwest::Error),
    #[error("Cloud API returned status {status}")]
    ApiError { status: u16 },
}
