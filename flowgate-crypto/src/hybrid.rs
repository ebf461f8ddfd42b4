use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes128Gcm, Key, Nonce, Tag,
};
use serde_json::Value;
use thiserror::Error;

use crate::{
    envelope::{EncryptedEnvelope, NONCE_SIZE, TAG_SIZE},
    key_management::{KeyManagementError, RsaKeyPairManager, SYMMETRIC_KEY_SIZE},
};

type Result<T> = std::result::Result<T, HybridError>;

/// Outcome of decrypting one envelope.
///
/// The symmetric key and IV are threaded through to the response encryption:
/// the key is derived once per request by the platform and cannot be
/// recovered on the response path. Both live only for the current
/// request/response cycle.
pub struct DecryptedRequest {
    /// The decrypted request body, parsed as JSON.
    pub body: Value,
    /// The one-time AES-128 key recovered from the envelope.
    pub aes_key: [u8; SYMMETRIC_KEY_SIZE],
    /// The request IV; the response is encrypted under its complement.
    pub initial_vector: [u8; NONCE_SIZE],
}

/// Decrypts a hybrid envelope into the request JSON plus the symmetric
/// material needed for the response.
///
/// Three steps, each with its own failure mode:
/// 1. RSA-OAEP unwrap of the AES key → [`HybridError::KeyRecovery`]
/// 2. AES-128-GCM decryption of the body, where the trailing [`TAG_SIZE`]
///    bytes of `encrypted_flow_data` are the tag and the request IV is the
///    nonce, with no additional authenticated data →
///    [`HybridError::BodyDecryptionFailed`]
/// 3. UTF-8 JSON parse of the plaintext → [`HybridError::MalformedPayload`]
///
/// # Errors
/// Returns the error of whichever step fails first.
pub fn decrypt_request(
    envelope: &EncryptedEnvelope,
    key_manager: &RsaKeyPairManager,
) -> Result<DecryptedRequest> {
    let aes_key = key_manager.unwrap_symmetric_key(&envelope.encrypted_aes_key)?;

    if envelope.encrypted_flow_data.len() < TAG_SIZE {
        return Err(HybridError::BodyDecryptionFailed);
    }
    let (ciphertext, auth_tag) = envelope
        .encrypted_flow_data
        .split_at(envelope.encrypted_flow_data.len() - TAG_SIZE);

    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(&aes_key));
    let mut plaintext = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&envelope.initial_vector),
            b"",
            &mut plaintext,
            Tag::from_slice(auth_tag),
        )
        .map_err(|_| HybridError::BodyDecryptionFailed)?;

    let body = serde_json::from_slice(&plaintext).map_err(HybridError::MalformedPayload)?;
    Ok(DecryptedRequest {
        body,
        aes_key,
        initial_vector: envelope.initial_vector,
    })
}

/// Derives the response nonce: the bitwise complement of every byte of the
/// request IV, most significant bit included.
///
/// The flip is the protocol's anti-replay measure against reusing the exact
/// request nonce under the same key, and it is deterministic: the same
/// request IV always yields the same response nonce.
#[must_use]
pub fn flip_initial_vector(initial_vector: &[u8; NONCE_SIZE]) -> [u8; NONCE_SIZE] {
    let mut flipped = [0u8; NONCE_SIZE];
    for (flipped_byte, byte) in flipped.iter_mut().zip(initial_vector) {
        *flipped_byte = !byte;
    }
    flipped
}

/// Encrypts the business-logic response under the request's symmetric key.
///
/// The response JSON is compact-serialized, then encrypted with
/// AES-128-GCM under the flipped request IV, with no additional
/// authenticated data. Ciphertext and the 16-byte tag are returned
/// separately; [`crate::envelope::encode_response`] concatenates them
/// tag-last for the wire.
///
/// # Errors
/// Returns [`HybridError::SerializationFailed`] if the response cannot be
/// serialized, or [`HybridError::EncryptionFailed`] if the cipher rejects
/// the input. Both are internal-class failures: the inputs were already
/// validated on the request path.
pub fn encrypt_response(
    response: &Value,
    aes_key: &[u8; SYMMETRIC_KEY_SIZE],
    request_iv: &[u8; NONCE_SIZE],
) -> Result<(Vec<u8>, [u8; TAG_SIZE])> {
    let mut buffer = serde_json::to_vec(response).map_err(HybridError::SerializationFailed)?;
    let flipped_iv = flip_initial_vector(request_iv);
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(aes_key));
    let auth_tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&flipped_iv), b"", &mut buffer)
        .map_err(|_| HybridError::EncryptionFailed)?;
    Ok((buffer, auth_tag.into()))
}

#[derive(Debug, Error)]
pub enum HybridError {
    #[error(transparent)]
    KeyRecovery(#[from] KeyManagementError),
    #[error("Failed to decrypt the request body")]
    BodyDecryptionFailed,
    #[error("Decrypted payload is not valid JSON: `{0}`")]
    MalformedPayload(serde_json::Error),
    #[error("Failed to serialize the response payload: `{0}`")]
    SerializationFailed(serde_json::Error),
    #[error("Failed to encrypt the response payload")]
    EncryptionFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::encode_response;
    use crate::key_management::wrap_symmetric_key;
    use base64::{prelude::BASE64_STANDARD, Engine};
    use serde_json::json;

    const TEST_KEY: [u8; SYMMETRIC_KEY_SIZE] = [0u8; SYMMETRIC_KEY_SIZE];
    const TEST_IV: [u8; NONCE_SIZE] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

    /// Builds an envelope the way the platform does: wrap the key, encrypt
    /// the plaintext with the request IV, append the tag.
    fn platform_envelope(
        key_manager: &RsaKeyPairManager,
        request_body: &Value,
        aes_key: &[u8; SYMMETRIC_KEY_SIZE],
        iv: &[u8; NONCE_SIZE],
    ) -> EncryptedEnvelope {
        let wrapped = wrap_symmetric_key(&key_manager.public_key(), aes_key).unwrap();
        let mut flow_data = serde_json::to_vec(request_body).unwrap();
        let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(aes_key));
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(iv), b"", &mut flow_data)
            .unwrap();
        flow_data.extend_from_slice(&tag);
        EncryptedEnvelope {
            encrypted_aes_key: wrapped,
            encrypted_flow_data: flow_data,
            initial_vector: *iv,
        }
    }

    #[test]
    fn flips_every_byte_of_the_iv() {
        let flipped = flip_initial_vector(&TEST_IV);
        assert_eq!(
            flipped,
            [0xFF, 0xFE, 0xFD, 0xFC, 0xFB, 0xFA, 0xF9, 0xF8, 0xF7, 0xF6, 0xF5, 0xF4]
        );
        // The flip must be deterministic, not randomized.
        assert_eq!(flipped, flip_initial_vector(&TEST_IV));
    }

    #[test]
    fn round_trips_through_full_hybrid_path() {
        let key_manager = RsaKeyPairManager::generate().unwrap();
        let request_body = json!({"action": "data_exchange", "screen": "WELCOME", "data": {"name": "Ada"}});
        let envelope = platform_envelope(&key_manager, &request_body, &TEST_KEY, &TEST_IV);

        let decrypted = decrypt_request(&envelope, &key_manager).unwrap();
        assert_eq!(decrypted.body, request_body);
        assert_eq!(decrypted.aes_key, TEST_KEY);
        assert_eq!(decrypted.initial_vector, TEST_IV);
    }

    #[test]
    fn response_matches_golden_vector() {
        // Zero key, sequential IV, `{"action":"ping"}` plaintext. Pins the
        // cipher wiring, the IV flip and the tag-last encoding bit-exactly.
        let response = json!({"action": "ping"});
        let (ciphertext, tag) = encrypt_response(&response, &TEST_KEY, &TEST_IV).unwrap();
        assert_eq!(
            encode_response(&ciphertext, &tag),
            "USRpoX2urMQ7zT9nWKuJfPV3zB/BLTqUi19eG7iM6T6M"
        );
    }

    #[test]
    fn platform_can_decrypt_our_response() {
        let response = json!({"screen": "SUCCESS", "data": {"ok": true}});
        let (ciphertext, tag) = encrypt_response(&response, &TEST_KEY, &TEST_IV).unwrap();

        // The platform decrypts with the flipped IV.
        let combined = BASE64_STANDARD
            .decode(encode_response(&ciphertext, &tag))
            .unwrap();
        let (body, wire_tag) = combined.split_at(combined.len() - TAG_SIZE);
        let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(&TEST_KEY));
        let mut plaintext = body.to_vec();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&flip_initial_vector(&TEST_IV)),
                b"",
                &mut plaintext,
                Tag::from_slice(wire_tag),
            )
            .unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&plaintext).unwrap(), response);
    }

    #[test]
    fn detects_any_tampered_ciphertext_bit() {
        let key_manager = RsaKeyPairManager::generate().unwrap();
        let request_body = json!({"action": "ping"});
        let envelope = platform_envelope(&key_manager, &request_body, &TEST_KEY, &TEST_IV);

        for byte_index in 0..envelope.encrypted_flow_data.len() {
            let mut tampered = envelope.clone();
            tampered.encrypted_flow_data[byte_index] ^= 0x01;
            assert!(
                matches!(
                    decrypt_request(&tampered, &key_manager),
                    Err(HybridError::BodyDecryptionFailed)
                ),
                "tampered byte {byte_index} went undetected"
            );
        }
    }

    #[test]
    fn rejects_flow_data_shorter_than_tag() {
        let key_manager = RsaKeyPairManager::generate().unwrap();
        let request_body = json!({"action": "ping"});
        let mut envelope = platform_envelope(&key_manager, &request_body, &TEST_KEY, &TEST_IV);
        envelope.encrypted_flow_data.truncate(TAG_SIZE - 1);
        assert!(matches!(
            decrypt_request(&envelope, &key_manager),
            Err(HybridError::BodyDecryptionFailed)
        ));
    }

    #[test]
    fn rejects_non_json_plaintext() {
        let key_manager = RsaKeyPairManager::generate().unwrap();
        let wrapped = wrap_symmetric_key(&key_manager.public_key(), &TEST_KEY).unwrap();
        let mut flow_data = b"not json at all".to_vec();
        let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(&TEST_KEY));
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&TEST_IV), b"", &mut flow_data)
            .unwrap();
        flow_data.extend_from_slice(&tag);
        let envelope = EncryptedEnvelope {
            encrypted_aes_key: wrapped,
            encrypted_flow_data: flow_data,
            initial_vector: TEST_IV,
        };
        assert!(matches!(
            decrypt_request(&envelope, &key_manager),
            Err(HybridError::MalformedPayload(_))
        ));
    }

    #[test]
    fn wrong_key_surfaces_as_key_recovery() {
        let key_manager = RsaKeyPairManager::generate().unwrap();
        let other_manager = RsaKeyPairManager::generate().unwrap();
        let request_body = json!({"action": "ping"});
        let envelope = platform_envelope(&other_manager, &request_body, &TEST_KEY, &TEST_IV);
        assert!(matches!(
            decrypt_request(&envelope, &key_manager),
            Err(HybridError::KeyRecovery(_))
        ));
    }
}
