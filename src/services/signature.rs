//! Webhook signature handling
//!
//! GitHub signs every delivery with HMAC-SHA256 over the raw request body and
//! sends the digest as `X-Hub-Signature-256: sha256=<hex>`.

use hmac::{digest::InvalidLength, Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Extract the raw MAC bytes from a `sha256=<hex>` header value.
///
/// The value must split on `sha256=` into exactly two parts with an empty
/// first part, and the remainder must be non-empty, even-length hex.
pub fn parse_signature_header(value: &str) -> Option<Vec<u8>> {
    let mut parts = value.split(SIGNATURE_PREFIX);

    if parts.next() != Some("") {
        return None;
    }
    let digest = parts.next()?;
    if parts.next().is_some() || digest.is_empty() {
        return None;
    }

    hex::decode(digest).ok()
}

/// Verify `mac` against HMAC-SHA256(`key`, `message`) in constant time.
pub fn verify_signature(message: &[u8], mac: &[u8], key: &[u8]) -> bool {
    match HookVerifier::new(key) {
        Ok(verifier) => verifier.verify(message, mac),
        Err(_) => false,
    }
}

/// Pre-keyed verifier built once at startup and shared by every request
#[derive(Clone)]
pub struct HookVerifier {
    keyed: HmacSha256,
}

impl HookVerifier {
    pub fn new(secret: &[u8]) -> Result<Self, InvalidLength> {
        let keyed = HmacSha256::new_from_slice(secret)?;
        Ok(Self { keyed })
    }

    pub fn verify(&self, message: &[u8], mac: &[u8]) -> bool {
        let mut hasher = self.keyed.clone();
        hasher.update(message);
        hasher.verify_slice(mac).is_ok()
    }
}

impl std::fmt::Debug for HookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookVerifier").finish_non_exhaustive()
    }
}
