//! Payment Gateway Integration
//!
//! Abstractions and implementations for payment gateways.

mod mock;
mod razorpay;

pub use mock::MockGateway;
pub use razorpay::RazorpayGateway;

use async_trait::async_trait;
use billing_core::{BillingError, Result as BillingResult};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An order minted on the gateway side
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    /// Gateway order reference
    pub id: String,

    /// Minor units (paise)
    pub amount: i64,

    pub currency: String,

    #[serde(default)]
    pub receipt: Option<String>,
}

/// Payment gateway trait
///
/// Implement this for each gateway: Razorpay, a test double, etc.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Mint a remote order the payer will pay against
    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<GatewayOrder>;

    /// Check the signature the gateway attached to a payment confirmation
    fn verify_payment_signature(
        &self,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
        signature: &str,
    ) -> bool;

    /// Public key the browser checkout needs, if any
    fn public_key(&self) -> Option<&str> {
        None
    }

    /// Gateway name, recorded on each Transaction
    fn name(&self) -> &str;
}

/// Convert a major-unit amount to integer minor units
///
/// Amounts finer than one paisa are rejected rather than rounded.
pub fn to_minor_units(amount: Decimal) -> BillingResult<i64> {
    let minor = amount * Decimal::ONE_HUNDRED;
    if !minor.fract().is_zero() {
        return Err(BillingError::InvalidArgument(format!(
            "Amount {amount} has more than two decimal places"
        )));
    }
    minor
        .to_i64()
        .ok_or_else(|| BillingError::InvalidArgument(format!("Amount {amount} is out of range")))
}

/// Convert integer minor units back to a major-unit amount
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(dec!(944)).unwrap(), 94_400);
        assert_eq!(to_minor_units(dec!(179.82)).unwrap(), 17_982);
        assert_eq!(from_minor_units(94_400), dec!(944));
    }

    #[test]
    fn test_sub_paisa_rejected() {
        let err = to_minor_units(dec!(10.005)).unwrap_err();
        assert!(matches!(err, BillingError::InvalidArgument(_)));
    }
}
