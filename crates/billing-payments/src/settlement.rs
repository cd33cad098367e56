//! Payment settlement
//!
//! The single "finalize payment" routine shared by client verification
//! (both checkout protocols) and the webhook. It runs only for the caller
//! whose conditional settle was `Applied`, so each step below executes once
//! per gateway order:
//!
//! 1. invoice: flip the linked invoice to paid, or synthesize a paid one
//! 2. order: find the order of that invoice, or create a pending one
//! 3. cart: clear the payer's cart (payment-first checkouts)
//! 4. fulfillment: register domains, or complete orders that have none
//!
//! Money has already been captured when this runs, so no step raises an
//! error to the payer. Failures are logged at `error!` with the gateway
//! order and the routine returns whatever records exist.

use billing_core::{
    BillingDetails, CartStore, CheckoutProtocol, Invoice, InvoiceFactory, InvoiceStatus, LineItem,
    Order, OrderFactory, OrderStatus, Repositories, Result, StatusChange, Transaction, UserId,
};
use billing_fulfillment::{FulfillmentDispatcher, FulfillmentJob, FulfillmentWorker};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use crate::ledger::TransactionLedger;

/// How domain registration is run after settlement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FulfillmentMode {
    /// Queue and return immediately (client-driven verification)
    Deferred,

    /// Register before returning (webhook)
    Inline,
}

/// Records touched by a payment confirmation
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub transaction: Transaction,
    pub invoice: Option<Invoice>,
    pub order: Option<Order>,
}

/// Inputs beyond the settled transaction
#[derive(Clone, Debug, Default)]
pub struct SettleContext {
    /// Items supplied with the confirmation, overriding the snapshot
    pub items: Option<Vec<LineItem>>,

    /// Payer details for registrar contacts
    pub billing: BillingDetails,

    /// Amount the gateway reported as captured, when it differs from the order
    pub captured: Option<Decimal>,
}

pub struct Settler {
    repos: Repositories,
    carts: Arc<CartStore>,
    invoices: InvoiceFactory,
    ledger: Arc<TransactionLedger>,
    dispatcher: FulfillmentDispatcher,
    worker: Arc<FulfillmentWorker>,
}

impl Settler {
    pub fn new(
        repos: Repositories,
        carts: Arc<CartStore>,
        invoices: InvoiceFactory,
        ledger: Arc<TransactionLedger>,
        dispatcher: FulfillmentDispatcher,
        worker: Arc<FulfillmentWorker>,
    ) -> Self {
        Self {
            repos,
            carts,
            invoices,
            ledger,
            dispatcher,
            worker,
        }
    }

    /// Finalize a transaction this caller just moved to success
    pub async fn finalize(&self, txn: Transaction, ctx: SettleContext, mode: FulfillmentMode) -> Settlement {
        let order_ref = txn.gateway_order_ref.clone();

        let invoice = match self.settle_invoice(&txn, &ctx).await {
            Ok(invoice) => invoice,
            Err(e) => {
                tracing::error!(
                    gateway_order = %order_ref,
                    transaction_id = %txn.id,
                    amount = %txn.amount,
                    domain = txn.metadata.domain_name().unwrap_or("-"),
                    error = %e,
                    "Payment captured but invoice could not be recorded"
                );
                return self.recover(txn).await;
            }
        };

        let order = match self.settle_order(&txn, &invoice, ctx.items.as_deref()).await {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(
                    gateway_order = %order_ref,
                    invoice_id = %invoice.id,
                    client_id = %invoice.client_id,
                    domain = txn.metadata.domain_name().unwrap_or("-"),
                    error = %e,
                    "Payment captured but order could not be recorded"
                );
                return Settlement {
                    transaction: self.refreshed(txn).await,
                    invoice: Some(invoice),
                    order: None,
                };
            }
        };

        self.clear_cart(&txn).await;
        let order = self.fulfill(&txn, order, ctx.billing, mode).await;

        Settlement {
            transaction: self.refreshed(txn).await,
            invoice: Some(invoice),
            order: Some(order),
        }
    }

    /// Current records for an already-settled transaction, without mutating
    pub async fn recover(&self, txn: Transaction) -> Settlement {
        let txn = self.refreshed(txn).await;

        let invoice = match txn.invoice_id {
            Some(id) => self.repos.invoices.get(&id).await.unwrap_or_else(|e| {
                tracing::warn!(invoice_id = %id, error = %e, "Invoice lookup failed");
                None
            }),
            None => None,
        };
        let order = match &invoice {
            Some(invoice) => self
                .repos
                .orders
                .find_by_invoice(&invoice.id)
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(invoice_id = %invoice.id, error = %e, "Order lookup failed");
                    None
                }),
            None => None,
        };

        Settlement {
            transaction: txn,
            invoice,
            order,
        }
    }

    async fn settle_invoice(&self, txn: &Transaction, ctx: &SettleContext) -> Result<Invoice> {
        let captured = ctx.captured.unwrap_or(txn.amount);

        if let Some(invoice_id) = txn.invoice_id {
            let change = self
                .repos
                .invoices
                .transition(&invoice_id, InvoiceStatus::Unpaid, InvoiceStatus::Paid)
                .await?;
            match &change {
                StatusChange::Applied(_) => {
                    tracing::info!(invoice_id = %invoice_id, gateway_order = %txn.gateway_order_ref, "Invoice paid");
                }
                StatusChange::Unchanged(invoice) if invoice.is_paid() => self.report_double_capture(txn, invoice).await,
                StatusChange::Unchanged(invoice) => tracing::error!(
                    invoice_id = %invoice_id,
                    status = ?invoice.status,
                    gateway_order = %txn.gateway_order_ref,
                    gateway_payment = txn.gateway_payment_ref.as_deref().unwrap_or("-"),
                    "Payment captured against an invoice that cannot be paid"
                ),
            }

            let invoice = change.into_inner();
            if captured != invoice.total {
                tracing::error!(
                    invoice_id = %invoice.id,
                    gateway_order = %txn.gateway_order_ref,
                    %captured,
                    invoice_total = %invoice.total,
                    "Captured amount differs from invoice total"
                );
            }
            return Ok(invoice);
        }

        let owner = payer(txn);
        let client = self.repos.clients.get_or_create(&owner).await?;
        let items = ctx.items.as_deref().unwrap_or(txn.metadata.items.as_slice());
        let invoice = self.invoices.paid(client.id, items, captured)?;

        self.repos.invoices.insert(&invoice).await?;
        self.ledger.link_invoice(&txn.gateway_order_ref, invoice.id).await?;

        tracing::info!(
            invoice_id = %invoice.id,
            client_id = %client.id,
            total = %invoice.total,
            gateway_order = %txn.gateway_order_ref,
            "Paid invoice created"
        );
        Ok(invoice)
    }

    async fn report_double_capture(&self, txn: &Transaction, invoice: &Invoice) {
        let earlier = match self.ledger.for_invoice(&invoice.id).await {
            Ok(transactions) => transactions
                .into_iter()
                .filter(|other| other.gateway_order_ref != txn.gateway_order_ref && other.is_settled())
                .filter_map(|other| other.gateway_payment_ref)
                .collect::<Vec<_>>(),
            Err(e) => {
                tracing::warn!(invoice_id = %invoice.id, error = %e, "Transaction lookup for invoice failed");
                Vec::new()
            }
        };

        tracing::error!(
            invoice_id = %invoice.id,
            gateway_order = %txn.gateway_order_ref,
            gateway_payment = txn.gateway_payment_ref.as_deref().unwrap_or("-"),
            earlier_payments = ?earlier,
            amount = %txn.amount,
            "Invoice already paid by another payment, captured twice"
        );
    }

    async fn settle_order(&self, txn: &Transaction, invoice: &Invoice, items: Option<&[LineItem]>) -> Result<Order> {
        if let Some(order) = self.repos.orders.find_by_invoice(&invoice.id).await? {
            return Ok(order);
        }

        let items = items.unwrap_or(txn.metadata.items.as_slice());
        let order = OrderFactory::pending(invoice.client_id, invoice.id, items);
        self.repos.orders.insert(&order).await?;

        tracing::info!(order_id = %order.id, invoice_id = %invoice.id, "Order created");
        Ok(order)
    }

    async fn clear_cart(&self, txn: &Transaction) {
        if txn.metadata.protocol != CheckoutProtocol::PaymentFirst {
            return;
        }
        let Some(user_id) = &txn.metadata.user_id else {
            return;
        };

        if let Err(e) = self.carts.clear(user_id).await {
            tracing::warn!(user_id = %user_id, gateway_order = %txn.gateway_order_ref, error = %e, "Failed to clear cart after payment");
        }
    }

    async fn fulfill(&self, txn: &Transaction, order: Order, billing: BillingDetails, mode: FulfillmentMode) -> Order {
        if order.status != OrderStatus::Pending {
            return order;
        }

        if !order.has_domain_items() {
            return match self
                .repos
                .orders
                .transition(&order.id, OrderStatus::Pending, OrderStatus::Completed)
                .await
            {
                Ok(StatusChange::Applied(order)) => {
                    tracing::info!(order_id = %order.id, "Order completed, nothing to provision");
                    order
                }
                Ok(StatusChange::Unchanged(order)) => order,
                Err(e) => {
                    tracing::error!(order_id = %order.id, error = %e, "Failed to complete order");
                    order
                }
            };
        }

        let job = FulfillmentJob::for_order(&order, billing).with_gateway_order(&txn.gateway_order_ref);
        match mode {
            FulfillmentMode::Deferred => {
                self.dispatcher.dispatch(job);
                order
            }
            FulfillmentMode::Inline => {
                self.worker.fulfill(&job).await;
                match self.repos.orders.get(&order.id).await {
                    Ok(Some(current)) => current,
                    _ => order,
                }
            }
        }
    }

    async fn refreshed(&self, txn: Transaction) -> Transaction {
        match self.ledger.lookup(&txn.gateway_order_ref).await {
            Ok(Some(current)) => current,
            _ => txn,
        }
    }
}

fn payer(txn: &Transaction) -> UserId {
    txn.metadata.user_id.clone().unwrap_or_else(|| {
        tracing::warn!(gateway_order = %txn.gateway_order_ref, "Payment has no known payer");
        UserId::unattributed(&txn.gateway_order_ref)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayOrder;
    use crate::testkit::{Harness, domain_item};
    use billing_core::{TransactionMetadata, TransactionStatus};
    use billing_fulfillment::MockRegistrar;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_registrar_failure_is_isolated_per_domain() {
        let h = Harness::with_registrar(MockRegistrar::new().failing_on("broken.com")).await;
        let user = UserId::new("u1");
        let payment = h
            .services
            .checkout
            .create_payment_order(
                &user,
                dec!(1888),
                Some(vec![domain_item("broken.com"), domain_item("fine.com")]),
            )
            .await
            .unwrap();

        let txn = h.services.ledger.settle(&payment.id, "pay_1").await.unwrap().into_inner();
        let settlement = h
            .services
            .settler
            .finalize(txn, SettleContext::default(), FulfillmentMode::Inline)
            .await;

        let invoice = settlement.invoice.unwrap();
        assert_eq!(invoice.total, dec!(1888));
        assert!(invoice.is_paid());

        let order = settlement.order.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        let domains = &h.services.repos.domains;
        assert!(domains.exists_by_name("fine.com").await.unwrap());
        assert!(!domains.exists_by_name("broken.com").await.unwrap());
        assert_eq!(h.registrar.purchases().await.len(), 2);

        // the failed name is free again for a manual retry
        assert!(domains.claim("broken.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_payment_without_payer_gets_unattributed_client() {
        let h = Harness::new().await;
        let order = GatewayOrder {
            id: "order_orphan".into(),
            amount: 50_000,
            currency: "INR".into(),
            receipt: None,
        };
        let metadata = TransactionMetadata {
            user_id: None,
            receipt: "rcpt_orphan".into(),
            protocol: CheckoutProtocol::PaymentFirst,
            items: Vec::new(),
        };
        h.services
            .ledger
            .open("mock", &order, dec!(500), None, metadata)
            .await
            .unwrap();

        let txn = h.services.ledger.settle("order_orphan", "pay_1").await.unwrap().into_inner();
        let settlement = h
            .services
            .settler
            .finalize(txn, SettleContext::default(), FulfillmentMode::Deferred)
            .await;

        let invoice = settlement.invoice.unwrap();
        assert_eq!(invoice.total, dec!(500));
        assert_eq!(invoice.lines.len(), 1);
        assert_eq!(settlement.order.unwrap().status, OrderStatus::Completed);
        assert_eq!(settlement.transaction.invoice_id, Some(invoice.id));

        let owner = UserId::unattributed("order_orphan");
        assert!(h.services.repos.clients.find_by_user(&owner).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_recover_reads_without_mutating() {
        let h = Harness::new().await;
        let user = UserId::new("u1");
        let payment = h
            .services
            .checkout
            .create_payment_order(&user, dec!(944), Some(vec![domain_item("calm.org")]))
            .await
            .unwrap();

        let txn = h.services.ledger.find(&payment.id).await.unwrap();
        let settlement = h.services.settler.recover(txn).await;

        assert_eq!(settlement.transaction.status, TransactionStatus::Pending);
        assert!(settlement.invoice.is_none());
        assert!(settlement.order.is_none());
        assert!(h.services.repos.clients.find_by_user(&user).await.unwrap().is_none());
    }
}
