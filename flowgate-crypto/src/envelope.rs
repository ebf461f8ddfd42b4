use base64::{prelude::BASE64_STANDARD, Engine};
use serde::Deserialize;
use thiserror::Error;

/// AES-GCM nonce size, fixed by the platform at 96 bits.
pub const NONCE_SIZE: usize = 12;
/// AES-GCM authentication tag size, fixed by the platform at 128 bits.
pub const TAG_SIZE: usize = 16;

type Result<T> = std::result::Result<T, EnvelopeError>;

/// Wire representation of the envelope, as the platform sends it: three
/// base64 strings inside a JSON object.
#[derive(Debug, Deserialize)]
struct WireEnvelope {
    encrypted_aes_key: String,
    encrypted_flow_data: String,
    initial_vector: String,
}

/// A decoded hybrid envelope.
///
/// `encrypted_flow_data` still carries the authentication tag in its trailing
/// [`TAG_SIZE`] bytes; splitting it off is the decryptor's job. The IV length
/// is enforced here, at the trust boundary, so every later consumer can rely
/// on a fixed-size array.
#[derive(Debug, Clone)]
pub struct EncryptedEnvelope {
    /// The one-time AES-128 key, wrapped under the endpoint's RSA public key.
    pub encrypted_aes_key: Vec<u8>,
    /// Ciphertext of the request body followed by the 16-byte GCM tag.
    pub encrypted_flow_data: Vec<u8>,
    /// The request nonce. The response is encrypted under its bitwise
    /// complement, never under this value itself.
    pub initial_vector: [u8; NONCE_SIZE],
}

impl EncryptedEnvelope {
    /// Decodes an envelope from the raw JSON request body.
    ///
    /// # Errors
    /// Returns [`EnvelopeError`] if the body is not valid JSON, if any of the
    /// three fields is absent or not valid base64, or if the decoded IV is
    /// not exactly [`NONCE_SIZE`] bytes. An undersized or oversized IV is
    /// rejected outright, never truncated or padded.
    pub fn from_json_bytes(raw_body: &[u8]) -> Result<Self> {
        let wire: WireEnvelope = serde_json::from_slice(raw_body)?;
        let encrypted_aes_key = decode_field("encrypted_aes_key", &wire.encrypted_aes_key)?;
        let encrypted_flow_data = decode_field("encrypted_flow_data", &wire.encrypted_flow_data)?;
        let initial_vector = decode_field("initial_vector", &wire.initial_vector)?;
        let initial_vector_len = initial_vector.len();
        let initial_vector: [u8; NONCE_SIZE] = initial_vector
            .try_into()
            .map_err(|_| EnvelopeError::InvalidNonceLength(initial_vector_len))?;
        Ok(Self {
            encrypted_aes_key,
            encrypted_flow_data,
            initial_vector,
        })
    }
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>> {
    BASE64_STANDARD
        .decode(value)
        .map_err(|source| EnvelopeError::InvalidBase64 { field, source })
}

/// Encodes the final response body: base64 over ciphertext followed by the
/// authentication tag.
///
/// Tag-last matches the platform's reference decryption, which strips the
/// trailing 16 bytes before feeding the remainder to the cipher. The returned
/// string is the entire HTTP response body, sent as plain text rather than
/// wrapped in JSON.
#[must_use]
pub fn encode_response(ciphertext: &[u8], auth_tag: &[u8; TAG_SIZE]) -> String {
    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(auth_tag);
    BASE64_STANDARD.encode(combined)
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Failed to parse envelope JSON: `{0}`")]
    MalformedJson(#[from] serde_json::Error),
    #[error("Field `{field}` is not valid base64")]
    InvalidBase64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("Initial vector must be {NONCE_SIZE} bytes, got {0}")]
    InvalidNonceLength(usize),
}
