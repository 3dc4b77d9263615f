//! `X-Hub-Signature-256` validation for Meta webhooks

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Hex HMAC-SHA256 of `body` keyed with the app secret, `sha256=` prefixed
pub fn sign_payload(app_secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes()).ok()?;
    mac.update(body);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Check a `sha256=<hex>` header value against the raw request body
pub fn verify_payload_signature(app_secret: &str, body: &[u8], header: &str) -> bool {
    let Some(provided) = header.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}
