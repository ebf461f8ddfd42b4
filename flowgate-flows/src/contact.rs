use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{FlowAction, FlowError, FlowHandler, FlowRequest};

const WELCOME_SCREEN: &str = "WELCOME";
const DETAILS_SCREEN: &str = "DETAILS";
const SUCCESS_SCREEN: &str = "SUCCESS";

type Result<T> = std::result::Result<T, FlowError>;

/// Contact-capture flow: WELCOME → DETAILS → SUCCESS.
///
/// The default flow shipped with the endpoint. WELCOME greets the user and
/// collects a name, DETAILS collects and validates contact information, and
/// SUCCESS terminates the session with the completion payload the platform
/// expects.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContactFlow;

#[async_trait]
impl FlowHandler for ContactFlow {
    async fn next_screen(&self, request: &FlowRequest) -> Result<Value> {
        match &request.action {
            FlowAction::Ping => Ok(json!({
                "version": &request.version,
                "data": { "status": "active" },
            })),
            FlowAction::Init => Ok(json!({
                "version": &request.version,
                "screen": WELCOME_SCREEN,
                "data": {
                    "welcome_message": "Welcome to our service!",
                    "flow_token": &request.flow_token,
                },
            })),
            FlowAction::DataExchange => self.handle_data_exchange(request),
            FlowAction::Other(action) => {
                warn!(
                    target = "flowgate-flows",
                    event = "unknown_action",
                    action = action.as_str(),
                    "Unknown action received"
                );
                Ok(json!({
                    "version": &request.version,
                    "data": { "error": format!("Unknown action: {action}") },
                }))
            }
        }
    }
}

impl ContactFlow {
    fn handle_data_exchange(&self, request: &FlowRequest) -> Result<Value> {
        match request.screen.as_deref() {
            Some(WELCOME_SCREEN) => Ok(json!({
                "version": &request.version,
                "screen": DETAILS_SCREEN,
                "data": {
                    "user_name": request.field("name").unwrap_or("User"),
                    "message": "Please provide more details",
                },
            })),
            Some(DETAILS_SCREEN) => self.handle_details(request),
            Some(SUCCESS_SCREEN) => Ok(json!({
                "version": &request.version,
                "data": {
                    "extension_message_response": {
                        "params": { "flow_token": &request.flow_token },
                    },
                },
            })),
            screen => {
                warn!(
                    target = "flowgate-flows",
                    event = "unknown_screen",
                    screen = screen.unwrap_or("<none>"),
                    "Unknown screen received"
                );
                Ok(json!({
                    "version": &request.version,
                    "data": {
                        "error": format!("Unknown screen: {}", screen.unwrap_or("<none>")),
                    },
                }))
            }
        }
    }

    fn handle_details(&self, request: &FlowRequest) -> Result<Value> {
        let name = request.field("name").unwrap_or("User");
        let email = request.field("email").unwrap_or_default();
        let phone = request.field("phone").unwrap_or_default();

        let mut validation_errors = Vec::new();
        if !is_valid_email(email) {
            validation_errors.push("Invalid email address");
        }
        if !is_valid_phone(phone) {
            validation_errors.push("Invalid phone number");
        }
        if !validation_errors.is_empty() {
            // Send the user back to the same screen with the problems listed.
            return Ok(json!({
                "version": &request.version,
                "screen": DETAILS_SCREEN,
                "data": { "errors": validation_errors },
            }));
        }

        info!(
            target = "flowgate-flows",
            event = "details_submitted",
            flow_token = request.flow_token.as_deref().unwrap_or("<none>"),
            "User details submitted"
        );

        Ok(json!({
            "version": &request.version,
            "screen": SUCCESS_SCREEN,
            "data": {
                "success": true,
                "message": format!("Thank you, {name}!"),
                "confirmation_id": &request.flow_token,
            },
        }))
    }
}

fn is_valid_email(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| {
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
                .expect("email regex is valid")
        })
        .is_match(email)
}

/// E.164-style check: optional `+`, up to 15 digits, no leading zero.
fn is_valid_phone(phone: &str) -> bool {
    static PHONE_RE: OnceLock<Regex> = OnceLock::new();
    PHONE_RE
        .get_or_init(|| Regex::new(r"^\+?[1-9]\d{1,14}$").expect("phone regex is valid"))
        .is_match(phone)
}
