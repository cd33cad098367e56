//! Checkout Orchestrator
//!
//! Two entry protocols share one settlement routine:
//!
//! - **Invoice-first**: [`CheckoutOrchestrator::checkout`] turns the cart
//!   into an unpaid invoice and a pending order,
//!   [`CheckoutOrchestrator::create_invoice_payment`] opens a gateway order
//!   for that invoice and [`CheckoutOrchestrator::verify_payment`] settles it.
//! - **Payment-first**: [`CheckoutOrchestrator::create_payment_order`] opens
//!   a gateway order straight from the cart and
//!   [`CheckoutOrchestrator::verify_and_complete`] creates the paid invoice
//!   and order once the payment is confirmed.
//!
//! Signature checks and input validation happen before any record changes.

use billing_core::{
    BillingConfig, BillingDetails, BillingError, CartStore, CheckoutProtocol, CheckoutSummary, Invoice,
    InvoiceFactory, InvoiceId, InvoiceStatus, LineItem, Order, OrderFactory, Repositories, Result,
    StatusChange, Transaction, TransactionMetadata, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::gateway::{PaymentGateway, from_minor_units, to_minor_units};
use crate::ledger::TransactionLedger;
use crate::settlement::{FulfillmentMode, SettleContext, Settlement, Settler};

/// Result of an invoice-first checkout
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckoutResult {
    pub invoice: Invoice,
    pub order: Order,
}

/// A gateway order the payer can pay against
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    /// Gateway order reference
    pub id: String,

    /// Minor units, as the browser checkout expects
    pub amount: i64,

    pub currency: String,
    pub receipt: String,
    pub gateway: String,

    /// Public gateway key for the browser checkout
    pub key: Option<String>,

    pub invoice_id: Option<InvoiceId>,
}

/// Signed confirmation returned by the gateway to the payer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    #[serde(alias = "razorpay_order_id", alias = "orderId")]
    pub gateway_order_ref: String,

    #[serde(alias = "razorpay_payment_id", alias = "paymentId")]
    pub gateway_payment_ref: String,

    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

/// Outcome of a verification call
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub transaction: Transaction,
    pub invoice: Option<Invoice>,
    pub order: Option<Order>,

    /// True when this call re-delivered an already-settled payment
    pub replayed: bool,
}

impl PaymentOutcome {
    fn from_settlement(settlement: Settlement, replayed: bool) -> Self {
        Self {
            transaction: settlement.transaction,
            invoice: settlement.invoice,
            order: settlement.order,
            replayed,
        }
    }
}

pub struct CheckoutOrchestrator {
    config: BillingConfig,
    repos: Repositories,
    carts: Arc<CartStore>,
    invoices: InvoiceFactory,
    gateway: Arc<dyn PaymentGateway>,
    ledger: Arc<TransactionLedger>,
    settler: Arc<Settler>,
}

impl CheckoutOrchestrator {
    pub fn new(
        config: BillingConfig,
        repos: Repositories,
        carts: Arc<CartStore>,
        gateway: Arc<dyn PaymentGateway>,
        ledger: Arc<TransactionLedger>,
        settler: Arc<Settler>,
    ) -> Self {
        Self {
            invoices: InvoiceFactory::from_config(&config),
            config,
            repos,
            carts,
            gateway,
            ledger,
            settler,
        }
    }

    /// Totals preview of the user's cart
    pub async fn summary(&self, user_id: &UserId) -> Result<CheckoutSummary> {
        self.carts.summary(user_id).await
    }

    /// Invoice-first: convert the cart into an unpaid invoice and pending order
    pub async fn checkout(&self, user_id: &UserId, billing: Option<BillingDetails>) -> Result<CheckoutResult> {
        let cart = self.carts.get(user_id).await?;
        if cart.is_empty() {
            return Err(BillingError::InvalidArgument("Cart is empty".into()));
        }

        let client = self.repos.clients.get_or_create(user_id).await?;
        if let Some(details) = &billing {
            self.repos.clients.update_billing(user_id, details).await?;
        }

        let invoice = self.invoices.from_cart(client.id, &cart)?;
        let order = OrderFactory::pending(client.id, invoice.id, &cart.line_items());

        self.repos.invoices.insert(&invoice).await?;
        self.repos.orders.insert(&order).await?;

        tracing::info!(
            user_id = %user_id,
            invoice_id = %invoice.id,
            order_id = %order.id,
            total = %invoice.total,
            "Checkout created invoice and order"
        );

        if let Err(e) = self.carts.clear(user_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to clear cart after checkout");
        }

        Ok(CheckoutResult { invoice, order })
    }

    /// Invoice-first: open a gateway order for an unpaid invoice
    pub async fn create_invoice_payment(
        &self,
        user_id: &UserId,
        invoice_id: InvoiceId,
        amount: Decimal,
    ) -> Result<PaymentOrder> {
        let amount_minor = self.validate_amount(amount)?;

        let invoice = self
            .repos
            .invoices
            .get(&invoice_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Invoice", invoice_id))?;

        let client = self.repos.clients.find_by_user(user_id).await?;
        if client.is_none_or(|c| c.id != invoice.client_id) {
            return Err(BillingError::not_found("Invoice", invoice_id));
        }
        if invoice.status != InvoiceStatus::Unpaid {
            return Err(BillingError::Conflict(format!(
                "Invoice {invoice_id} is {:?}",
                invoice.status
            )));
        }
        if amount != invoice.total {
            return Err(BillingError::InvalidArgument(format!(
                "Amount {amount} does not match invoice total {}",
                invoice.total
            )));
        }

        let receipt = format!("invoice_{}", invoice.id.simple());
        let metadata = TransactionMetadata {
            user_id: Some(user_id.clone()),
            receipt,
            protocol: CheckoutProtocol::InvoiceFirst,
            items: Vec::new(),
        };
        self.open(amount, amount_minor, Some(invoice.id), metadata).await
    }

    /// Payment-first: open a gateway order for the given items, or the cart
    pub async fn create_payment_order(
        &self,
        user_id: &UserId,
        amount: Decimal,
        items: Option<Vec<LineItem>>,
    ) -> Result<PaymentOrder> {
        let amount_minor = self.validate_amount(amount)?;

        let items = match items {
            Some(items) if !items.is_empty() => items,
            _ => self.carts.get(user_id).await?.line_items(),
        };
        let subtotal = validated_subtotal(&items)?;
        let expected = subtotal + billing_core::cart::tax_for(subtotal, self.config.tax_rate);
        if !items.is_empty() && expected != amount {
            tracing::warn!(user_id = %user_id, %amount, %expected, "Payment amount differs from item total");
        }

        let metadata = TransactionMetadata {
            user_id: Some(user_id.clone()),
            receipt: format!("rcpt_{}", Uuid::new_v4().simple()),
            protocol: CheckoutProtocol::PaymentFirst,
            items,
        };
        self.open(amount, amount_minor, None, metadata).await
    }

    /// Settle a confirmed payment against its existing records
    pub async fn verify_payment(&self, user_id: &UserId, confirmation: &PaymentConfirmation) -> Result<PaymentOutcome> {
        self.confirm(user_id, confirmation, SettleContext::default()).await
    }

    /// Payment-first: settle and build the paid invoice and order from `items`
    pub async fn verify_and_complete(
        &self,
        user_id: &UserId,
        confirmation: &PaymentConfirmation,
        items: Vec<LineItem>,
        billing: BillingDetails,
    ) -> Result<PaymentOutcome> {
        validated_subtotal(&items)?;
        let ctx = SettleContext {
            items: (!items.is_empty()).then_some(items),
            billing,
            ..SettleContext::default()
        };
        self.confirm(user_id, confirmation, ctx).await
    }

    async fn confirm(
        &self,
        user_id: &UserId,
        confirmation: &PaymentConfirmation,
        ctx: SettleContext,
    ) -> Result<PaymentOutcome> {
        let order_ref = confirmation.gateway_order_ref.as_str();

        if !self.gateway.verify_payment_signature(
            order_ref,
            &confirmation.gateway_payment_ref,
            &confirmation.signature,
        ) {
            tracing::warn!(gateway_order = %order_ref, user_id = %user_id, "Payment signature mismatch");
            return Err(BillingError::InvalidSignature(format!(
                "Signature does not match gateway order {order_ref}"
            )));
        }

        let txn = self.ledger.find(order_ref).await?;
        if let Some(owner) = &txn.metadata.user_id {
            if owner != user_id {
                return Err(BillingError::InvalidArgument(format!(
                    "Gateway order {order_ref} belongs to another user"
                )));
            }
        }

        match self.ledger.settle_exact(order_ref, &confirmation.gateway_payment_ref).await? {
            StatusChange::Applied(txn) => {
                let settlement = self.settler.finalize(txn, ctx, FulfillmentMode::Deferred).await;
                Ok(PaymentOutcome::from_settlement(settlement, false))
            }
            StatusChange::Unchanged(txn) => {
                let settlement = self.settler.recover(txn).await;
                Ok(PaymentOutcome::from_settlement(settlement, true))
            }
        }
    }

    async fn open(
        &self,
        amount: Decimal,
        amount_minor: i64,
        invoice_id: Option<InvoiceId>,
        metadata: TransactionMetadata,
    ) -> Result<PaymentOrder> {
        let order = self
            .gateway
            .create_order(amount_minor, &self.config.currency, &metadata.receipt)
            .await
            .map_err(|e| {
                tracing::error!(
                    gateway = self.gateway.name(),
                    receipt = %metadata.receipt,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Gateway order creation failed"
                );
                BillingError::from(e)
            })?;

        if order.amount != amount_minor {
            tracing::warn!(
                gateway_order = %order.id,
                requested = amount_minor,
                returned = order.amount,
                "Gateway returned a different amount"
            );
        }

        let receipt = metadata.receipt.clone();
        let txn = self
            .ledger
            .open(self.gateway.name(), &order, from_minor_units(order.amount), invoice_id, metadata)
            .await?;

        Ok(PaymentOrder {
            id: txn.gateway_order_ref,
            amount: order.amount,
            currency: order.currency,
            receipt,
            gateway: txn.gateway,
            key: self.gateway.public_key().map(str::to_string),
            invoice_id,
        })
    }

    fn validate_amount(&self, amount: Decimal) -> Result<i64> {
        if amount <= Decimal::ZERO {
            return Err(BillingError::InvalidArgument("Amount must be greater than zero".into()));
        }
        if amount > self.config.max_transaction_amount {
            return Err(BillingError::InvalidArgument(format!(
                "Amount exceeds the maximum of {} per transaction",
                self.config.max_transaction_amount
            )));
        }
        to_minor_units(amount)
    }
}

/// Bounds-check client-supplied items and total them
fn validated_subtotal(items: &[LineItem]) -> Result<Decimal> {
    for item in items {
        item.validate()?;
    }
    billing_core::model::subtotal_of(items)
}
