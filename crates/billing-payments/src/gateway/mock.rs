//! Mock Payment Gateway
//!
//! For testing and local development. Mints sequential order ids and signs
//! confirmations with a local secret, the way the real gateway would.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::{GatewayOrder, PaymentGateway};
use crate::error::{GatewayError, Result};
use crate::signature;

const MOCK_SECRET: &str = "mock_key_secret";

/// In-process gateway
pub struct MockGateway {
    secret: String,
    next_order: AtomicU64,
    down: AtomicBool,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self::with_secret(MOCK_SECRET)
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            next_order: AtomicU64::new(1),
            down: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `create_order` fail
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Signature the payer's browser would receive for this payment
    pub fn sign(&self, gateway_order_ref: &str, gateway_payment_ref: &str) -> String {
        signature::sign(
            &self.secret,
            signature::payment_message(gateway_order_ref, gateway_payment_ref).as_bytes(),
        )
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<GatewayOrder> {
        if self.down.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("mock gateway is down".into()));
        }

        let n = self.next_order.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayOrder {
            id: format!("order_mock{n:06}"),
            amount: amount_minor,
            currency: currency.to_string(),
            receipt: Some(receipt.to_string()),
        })
    }

    fn verify_payment_signature(
        &self,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
        signature: &str,
    ) -> bool {
        signature::verify_payment(&self.secret, gateway_order_ref, gateway_payment_ref, signature)
    }

    fn public_key(&self) -> Option<&str> {
        Some("rzp_test_mock")
    }

    fn name(&self) -> &str {
        "mock"
    }
}
