//! Payment transactions
//!
//! One record per gateway order. The gateway order reference is the natural
//! key: every later lookup (client verification, webhook) goes through it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{InvoiceId, TransactionId, UserId};
use crate::model::LineItem;

/// Transaction lifecycle
///
/// `Pending -> Success` and `Pending -> Failed`. A gateway order whose first
/// attempt failed can still be captured by a retry, so `Failed -> Success`
/// is accepted too. `Success` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// How the payment was initiated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutProtocol {
    /// Unpaid invoice created at checkout, payment order follows
    InvoiceFirst,

    /// Payment order created from the cart, invoice synthesized on capture
    PaymentFirst,
}

/// Context captured when the payment order was opened
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMetadata {
    /// Payer, when known
    #[serde(default)]
    pub user_id: Option<UserId>,

    /// Receipt string sent to the gateway
    pub receipt: String,

    pub protocol: CheckoutProtocol,

    /// Cart snapshot for payment-first checkouts
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl TransactionMetadata {
    /// First domain name among the captured items
    pub fn domain_name(&self) -> Option<&str> {
        self.items
            .iter()
            .find_map(|item| item.config.domain())
            .map(|d| d.domain.as_str())
    }
}

/// A payment attempt against the gateway
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,

    /// Linked invoice, set at creation (invoice-first) or at settlement
    pub invoice_id: Option<InvoiceId>,

    /// Gateway name, e.g. "razorpay"
    pub gateway: String,

    /// Major units
    pub amount: Decimal,

    pub currency: String,

    /// Gateway order reference, unique
    pub gateway_order_ref: String,

    /// Gateway payment reference, set on success
    pub gateway_payment_ref: Option<String>,

    pub status: TransactionStatus,

    pub metadata: TransactionMetadata,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn pending(
        gateway: impl Into<String>,
        gateway_order_ref: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        invoice_id: Option<InvoiceId>,
        metadata: TransactionMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            invoice_id,
            gateway: gateway.into(),
            amount,
            currency: currency.into(),
            gateway_order_ref: gateway_order_ref.into(),
            gateway_payment_ref: None,
            status: TransactionStatus::Pending,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub const fn is_settled(&self) -> bool {
        self.status.is_settled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DomainConfig, ItemConfig};
    use rust_decimal_macros::dec;

    #[test]
    fn test_metadata_domain_name() {
        let metadata = TransactionMetadata {
            user_id: None,
            receipt: "rcpt_1".into(),
            protocol: CheckoutProtocol::PaymentFirst,
            items: vec![
                LineItem {
                    product_id: None,
                    name: "Hosting".into(),
                    unit_price: dec!(800),
                    quantity: 1,
                    config: ItemConfig::default(),
                },
                LineItem {
                    product_id: None,
                    name: "Domain".into(),
                    unit_price: dec!(999),
                    quantity: 1,
                    config: ItemConfig::Domain(DomainConfig::new("shop.in", 1)),
                },
            ],
        };
        assert_eq!(metadata.domain_name(), Some("shop.in"));
    }

    #[test]
    fn test_new_transaction_is_pending() {
        let metadata = TransactionMetadata {
            user_id: Some(UserId::new("u1")),
            receipt: "invoice_x".into(),
            protocol: CheckoutProtocol::InvoiceFirst,
            items: Vec::new(),
        };
        let txn = Transaction::pending("mock", "order_1", dec!(944), "INR", None, metadata);
        assert_eq!(txn.status, TransactionStatus::Pending);
        assert!(!txn.is_settled());
        assert!(txn.gateway_payment_ref.is_none());
    }
}
