//! HMAC-SHA256 signatures
//!
//! Razorpay signs payment confirmations over `order_id|payment_id` with the
//! API key secret, and webhook bodies over the raw bytes with the webhook
//! secret. Both are lowercase hex.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Message signed for a payment confirmation
pub fn payment_message(gateway_order_ref: &str, gateway_payment_ref: &str) -> String {
    format!("{gateway_order_ref}|{gateway_payment_ref}")
}

/// Hex HMAC of `payload`
pub fn sign(secret: &str, payload: &[u8]) -> String {
    // HMAC accepts keys of any length
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature
pub fn verify(secret: &str, payload: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Check a payment confirmation signature
pub fn verify_payment(
    secret: &str,
    gateway_order_ref: &str,
    gateway_payment_ref: &str,
    signature: &str,
) -> bool {
    verify(
        secret,
        payment_message(gateway_order_ref, gateway_payment_ref).as_bytes(),
        signature,
    )
}
