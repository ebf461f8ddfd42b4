#![allow(clippy::module_name_repetitions)]

//! Cryptographic core of the flow endpoint gateway.
//!
//! Every inbound request from the messaging platform arrives as a hybrid
//! envelope: an RSA-OAEP wrapped AES-128 key, an AES-128-GCM encrypted body
//! and a 96-bit initialization vector, all base64 encoded. The response is
//! encrypted under the same one-time symmetric key with the bitwise
//! complement of the request IV, which prevents nonce reuse between the two
//! directions.

pub mod envelope;
pub mod hybrid;
pub mod key_management;
pub mod signature;

pub use envelope::{encode_response, EncryptedEnvelope, EnvelopeError, NONCE_SIZE, TAG_SIZE};
pub use hybrid::{
    decrypt_request, encrypt_response, flip_initial_vector, DecryptedRequest, HybridError,
};
pub use key_management::{
    wrap_symmetric_key, KeyManagementError, RsaKeyPairManager, RSA_KEY_BITS, SYMMETRIC_KEY_SIZE,
};
pub use signature::verify_signature;
