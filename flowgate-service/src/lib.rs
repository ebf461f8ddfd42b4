//! HTTP surface of the encrypted flow endpoint.
//!
//! The request lifecycle runs `Received → Authenticated → Decrypted →
//! Processed → Encrypted → Sent`: the signature middleware authenticates the
//! raw body before anything parses it, the flow-exchange handler drives
//! decryption, the business-logic collaborator and response encryption, and
//! every failure short-circuits into exactly one status-coded response.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;
