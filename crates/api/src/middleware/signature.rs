//! HMAC-SHA256 request signatures for the ingest endpoint.
//!
//! The gateway bridge signs the raw request body with the shared ingest secret
//! and sends `X-Signature-256: sha256=<hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the `sha256=<hex>` signature of `body`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, ApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(format!("Invalid ingest secret: {}", e)))?;
    mac.update(body);
    Ok(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Check a signature header against the body. Comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> Result<(), ApiError> {
    let header =
        header.ok_or_else(|| ApiError::Unauthorized(format!("Missing {}", SIGNATURE_HEADER)))?;
    let expected = header
        .strip_prefix(SIGNATURE_PREFIX)
        .and_then(|h| hex::decode(h).ok())
        .ok_or_else(|| ApiError::Unauthorized("Malformed signature".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(format!("Invalid ingest secret: {}", e)))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| ApiError::Unauthorized("Signature mismatch".to_string()))
}
