use rand::rngs::OsRng;
use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    Oaep, RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;
use thiserror::Error;

/// Symmetric key size the platform wraps inside the envelope (AES-128).
pub const SYMMETRIC_KEY_SIZE: usize = 16;
/// Modulus size the platform expects for the endpoint key pair.
pub const RSA_KEY_BITS: usize = 2048;

type Result<T> = std::result::Result<T, KeyManagementError>;

/// Holds the endpoint's long-lived RSA private key.
///
/// The key is decrypted from its passphrase-protected PEM exactly once at
/// process start and held immutably for the process lifetime; request tasks
/// share it behind an `Arc` and never mutate it, so no locking is required.
pub struct RsaKeyPairManager {
    private_key: RsaPrivateKey,
}

impl RsaKeyPairManager {
    /// Loads the private key from PEM.
    ///
    /// With a non-empty passphrase the PEM must be an encrypted PKCS#8
    /// document; with an empty passphrase both plain PKCS#8 and PKCS#1
    /// encodings are accepted.
    ///
    /// # Errors
    /// Returns [`KeyManagementError::InvalidPrivateKey`] if the PEM cannot be
    /// parsed or the passphrase does not decrypt it. The variant carries no
    /// detail on purpose: the PEM text and passphrase must not reach logs.
    pub fn from_pem(private_pem: &str, passphrase: &str) -> Result<Self> {
        let private_key = if passphrase.is_empty() {
            RsaPrivateKey::from_pkcs8_pem(private_pem)
                .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_pem))
                .map_err(|_| KeyManagementError::InvalidPrivateKey)?
        } else {
            RsaPrivateKey::from_pkcs8_encrypted_pem(private_pem, passphrase.as_bytes())
                .map_err(|_| KeyManagementError::InvalidPrivateKey)?
        };
        Ok(Self { private_key })
    }

    /// Generates a fresh RSA-2048 key pair.
    ///
    /// Used by the key generation tool and by tests; the server itself only
    /// ever loads an existing key.
    ///
    /// # Errors
    /// Returns [`KeyManagementError::KeyGenerationFailed`] if the underlying
    /// prime generation fails.
    pub fn generate() -> Result<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(KeyManagementError::KeyGenerationFailed)?;
        Ok(Self { private_key })
    }

    /// Returns the public counterpart of the held private key.
    #[must_use]
    pub fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey::from(&self.private_key)
    }

    /// Serializes the public key as an SPKI PEM, the format the platform
    /// accepts for upload.
    ///
    /// # Errors
    /// Returns an error if DER/PEM serialization fails.
    pub fn public_key_pem(&self) -> Result<String> {
        Ok(self.public_key().to_public_key_pem(LineEnding::LF)?)
    }

    /// Serializes the private key as a passphrase-encrypted PKCS#8 PEM.
    ///
    /// # Errors
    /// Returns an error if key encryption or serialization fails.
    pub fn private_key_encrypted_pem(&self, passphrase: &str) -> Result<String> {
        let pem = self
            .private_key
            .to_pkcs8_encrypted_pem(&mut OsRng, passphrase.as_bytes(), LineEnding::LF)?;
        Ok(pem.to_string())
    }

    /// Unwraps the one-time symmetric key from the envelope.
    ///
    /// Decrypts `wrapped_key` under RSA-OAEP with SHA-256 as both the digest
    /// and the MGF1 hash, then checks the result is exactly
    /// [`SYMMETRIC_KEY_SIZE`] bytes.
    ///
    /// # Errors
    /// Returns [`KeyManagementError::KeyRecoveryFailed`] on any failure.
    /// Padding failures and length mismatches are deliberately collapsed into
    /// the single variant so the caller cannot expose a padding oracle.
    pub fn unwrap_symmetric_key(&self, wrapped_key: &[u8]) -> Result<[u8; SYMMETRIC_KEY_SIZE]> {
        let key_bytes = self
            .private_key
            .decrypt(Oaep::new::<Sha256>(), wrapped_key)
            .map_err(|_| KeyManagementError::KeyRecoveryFailed)?;
        key_bytes
            .try_into()
            .map_err(|_| KeyManagementError::KeyRecoveryFailed)
    }
}

/// Wraps a symmetric key under the endpoint's public key, the way the
/// platform does before each request.
///
/// The server never calls this on the request path; it exists for the key
/// exchange performed by the platform and for exercising the full round trip
/// in tests.
///
/// # Errors
/// Returns [`KeyManagementError::KeyWrapFailed`] if OAEP encryption fails.
pub fn wrap_symmetric_key(
    public_key: &RsaPublicKey,
    symmetric_key: &[u8; SYMMETRIC_KEY_SIZE],
) -> Result<Vec<u8>> {
    public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), symmetric_key)
        .map_err(KeyManagementError::KeyWrapFailed)
}

#[derive(Debug, Error)]
pub enum KeyManagementError {
    #[error("Failed to load RSA private key from PEM")]
    InvalidPrivateKey,
    #[error("Failed to recover the wrapped symmetric key")]
    KeyRecoveryFailed,
    #[error("Failed to generate RSA key pair, with error: `{0}`")]
    KeyGenerationFailed(rsa::Error),
    #[error("Failed to wrap symmetric key, with error: `{0}`")]
    KeyWrapFailed(rsa::Error),
    #[error("Failed to serialize private key, with error: `{0}`")]
    PrivateKeyPem(#[from] rsa::pkcs8::Error),
    #[error("Failed to serialize public key, with error: `{0}`")]
    PublicKeyPem(#[from] rsa::pkcs8::spki::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_what_the_platform_wraps() {
        let manager = RsaKeyPairManager::generate().unwrap();
        let symmetric_key = [0x42u8; SYMMETRIC_KEY_SIZE];
        let wrapped = wrap_symmetric_key(&manager.public_key(), &symmetric_key).unwrap();
        assert_eq!(manager.unwrap_symmetric_key(&wrapped).unwrap(), symmetric_key);
    }

    #[test]
    fn rejects_tampered_wrapped_key() {
        let manager = RsaKeyPairManager::generate().unwrap();
        let symmetric_key = [0x42u8; SYMMETRIC_KEY_SIZE];
        let mut wrapped = wrap_symmetric_key(&manager.public_key(), &symmetric_key).unwrap();
        wrapped[0] ^= 0x01;
        assert!(matches!(
            manager.unwrap_symmetric_key(&wrapped),
            Err(KeyManagementError::KeyRecoveryFailed)
        ));
    }

    #[test]
    fn rejects_wrapped_key_of_wrong_length() {
        let manager = RsaKeyPairManager::generate().unwrap();
        // A 32-byte payload OAEP-decrypts fine but is not an AES-128 key.
        let oversized = [0x42u8; 32];
        let wrapped = manager
            .public_key()
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &oversized[..])
            .unwrap();
        assert!(matches!(
            manager.unwrap_symmetric_key(&wrapped),
            Err(KeyManagementError::KeyRecoveryFailed)
        ));
    }

    #[test]
    fn round_trips_encrypted_pem() {
        let manager = RsaKeyPairManager::generate().unwrap();
        let pem = manager.private_key_encrypted_pem("correct horse").unwrap();
        let reloaded = RsaKeyPairManager::from_pem(&pem, "correct horse").unwrap();
        assert_eq!(
            reloaded.public_key_pem().unwrap(),
            manager.public_key_pem().unwrap()
        );
        assert!(matches!(
            RsaKeyPairManager::from_pem(&pem, "wrong passphrase"),
            Err(KeyManagementError::InvalidPrivateKey)
        ));
    }
}
