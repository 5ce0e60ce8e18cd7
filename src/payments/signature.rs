//! Provider signing schemes
//!
//! Pure functions that reproduce each gateway's canonical string and digest.
//! The same function signs outbound requests and recomputes the expected value
//! for inbound notifications.
//!
//! | provider | primitive | canonical input |
//! |----------|-----------|-----------------|
//! | Midtrans | SHA-512, hex | `order_id + status_code + gross_amount + server_key` |
//! | DOKU     | HMAC-SHA-256, base64 | `Client-Id`, `Request-Id`, `Request-Timestamp`, `Request-Target`, `Digest` lines |
//! | Tripay   | HMAC-SHA-256, hex | `merchant_code + merchant_ref + amount` (checkout), raw body (callback) |

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const DOKU_SIGNATURE_PREFIX: &str = "HMACSHA256=";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing signature field '{field}'")]
    Missing { field: String },

    #[error("malformed signature: {reason}")]
    Malformed { reason: String },

    #[error("{provider} signature does not match")]
    Mismatch { provider: String },
}

impl SignatureError {
    pub fn missing(field: impl Into<String>) -> Self {
        SignatureError::Missing {
            field: field.into(),
        }
    }

    fn mismatch(provider: &str) -> Self {
        SignatureError::Mismatch {
            provider: provider.to_string(),
        }
    }
}

/// Compare two strings without short-circuiting on the first differing byte
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn hmac_sha256(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

// ---------------------------------------------------------------------------
// Midtrans
// ---------------------------------------------------------------------------

pub fn midtrans_signature(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_midtrans_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
    supplied: &str,
) -> Result<(), SignatureError> {
    if supplied.trim().is_empty() {
        return Err(SignatureError::missing("signature_key"));
    }

    let expected = midtrans_signature(order_id, status_code, gross_amount, server_key);
    if constant_time_eq(&expected, &supplied.trim().to_ascii_lowercase()) {
        Ok(())
    } else {
        Err(SignatureError::mismatch("midtrans"))
    }
}

// ---------------------------------------------------------------------------
// DOKU
// ---------------------------------------------------------------------------

/// Header values covered by a DOKU signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DokuSignatureComponents<'a> {
    pub client_id: &'a str,
    pub request_id: &'a str,
    pub request_timestamp: &'a str,
    pub request_target: &'a str,
    /// Base64 SHA-256 of the body; absent for body-less requests
    pub digest: Option<&'a str>,
}

impl DokuSignatureComponents<'_> {
    fn canonical(&self) -> String {
        let mut block = format!(
            "Client-Id:{}\nRequest-Id:{}\nRequest-Timestamp:{}\nRequest-Target:{}",
            self.client_id, self.request_id, self.request_timestamp, self.request_target
        );
        if let Some(digest) = self.digest {
            block.push_str("\nDigest:");
            block.push_str(digest);
        }
        block
    }
}

pub fn doku_digest(body: &[u8]) -> String {
    BASE64.encode(Sha256::digest(body))
}

/// Value for the `Signature` header, prefix included
pub fn doku_signature(components: &DokuSignatureComponents<'_>, secret_key: &str) -> String {
    let mut mac = hmac_sha256(secret_key);
    mac.update(components.canonical().as_bytes());
    format!("{}{}", DOKU_SIGNATURE_PREFIX, BASE64.encode(mac.finalize().into_bytes()))
}

pub fn verify_doku_signature(
    components: &DokuSignatureComponents<'_>,
    secret_key: &str,
    supplied: &str,
) -> Result<(), SignatureError> {
    let encoded = supplied
        .trim()
        .strip_prefix(DOKU_SIGNATURE_PREFIX)
        .ok_or_else(|| SignatureError::Malformed {
            reason: format!("expected '{}' prefix", DOKU_SIGNATURE_PREFIX),
        })?;
    let raw = BASE64.decode(encoded).map_err(|e| SignatureError::Malformed {
        reason: format!("invalid base64: {}", e),
    })?;

    let mut mac = hmac_sha256(secret_key);
    mac.update(components.canonical().as_bytes());
    mac.verify_slice(&raw)
        .map_err(|_| SignatureError::mismatch("doku"))
}

// ---------------------------------------------------------------------------
// Tripay
// ---------------------------------------------------------------------------

/// `signature` field of a closed-payment transaction request
pub fn tripay_checkout_signature(merchant_code: &str, merchant_ref: &str, amount: i64, private_key: &str) -> String {
    let mut mac = hmac_sha256(private_key);
    mac.update(merchant_code.as_bytes());
    mac.update(merchant_ref.as_bytes());
    mac.update(amount.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Expected `X-Callback-Signature` for a raw callback body
pub fn tripay_callback_signature(body: &[u8], private_key: &str) -> String {
    let mut mac = hmac_sha256(private_key);
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_tripay_callback(body: &[u8], private_key: &str, supplied: &str) -> Result<(), SignatureError> {
    let raw = hex::decode(supplied.trim()).map_err(|e| SignatureError::Malformed {
        reason: format!("invalid hex: {}", e),
    })?;

    let mut mac = hmac_sha256(private_key);
    mac.update(body);
    mac.verify_slice(&raw)
        .map_err(|_| SignatureError::mismatch("tripay"))
}
