use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix the platform prepends to the hex digest in the
/// `x-hub-signature-256` header.
const SIGNATURE_PREFIX: &str = "sha256=";

/// Verifies the platform signature over the raw request body.
///
/// The platform signs every webhook delivery with HMAC-SHA256 over the exact,
/// unparsed body bytes, keyed with the app secret shared at endpoint setup.
/// The digest arrives hex encoded in the `x-hub-signature-256` header, with a
/// `sha256=` prefix.
///
/// The comparison is performed in constant time via [`Mac::verify_slice`], so
/// a mismatching digest leaks no timing information about how many bytes
/// matched.
///
/// # Arguments
/// * `raw_body` - The raw request body, before any parsing
/// * `signature_header` - The full `x-hub-signature-256` header value
/// * `shared_secret` - The app secret shared with the platform
///
/// # Returns
/// `true` if the signature is valid. Malformed headers, invalid hex and
/// digest mismatches all return `false`; this function never errors, so the
/// caller has a single rejection path for unauthenticated requests.
#[must_use]
pub fn verify_signature(raw_body: &[u8], signature_header: &str, shared_secret: &[u8]) -> bool {
    let Some(hex_digest) = signature_header.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected_digest) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(shared_secret) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&expected_digest).is_ok()
}
