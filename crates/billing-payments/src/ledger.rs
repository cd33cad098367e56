//! Transaction Ledger
//!
//! Lifecycle of each payment attempt, keyed by gateway order reference.
//! The settle operations are conditional: of two callers racing to settle
//! the same gateway order, exactly one sees `Applied`.

use billing_core::{
    BillingError, InvoiceId, Result, StatusChange, Transaction, TransactionMetadata,
    TransactionRepository,
};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::gateway::GatewayOrder;

pub struct TransactionLedger {
    transactions: Arc<dyn TransactionRepository>,
}

impl TransactionLedger {
    pub fn new(transactions: Arc<dyn TransactionRepository>) -> Self {
        Self { transactions }
    }

    /// Record a pending transaction for a freshly minted gateway order
    pub async fn open(
        &self,
        gateway: &str,
        order: &GatewayOrder,
        amount: Decimal,
        invoice_id: Option<InvoiceId>,
        metadata: TransactionMetadata,
    ) -> Result<Transaction> {
        let txn = Transaction::pending(gateway, &order.id, amount, &order.currency, invoice_id, metadata);
        self.transactions.insert(&txn).await?;

        tracing::info!(
            transaction_id = %txn.id,
            gateway_order = %txn.gateway_order_ref,
            amount = %txn.amount,
            invoice_id = ?txn.invoice_id,
            "Transaction opened"
        );
        Ok(txn)
    }

    pub async fn find(&self, gateway_order_ref: &str) -> Result<Transaction> {
        self.transactions
            .find_by_gateway_order(gateway_order_ref)
            .await?
            .ok_or_else(|| BillingError::not_found("Transaction for gateway order", gateway_order_ref))
    }

    pub async fn lookup(&self, gateway_order_ref: &str) -> Result<Option<Transaction>> {
        self.transactions.find_by_gateway_order(gateway_order_ref).await
    }

    /// Settle, treating any earlier success as a replay
    pub async fn settle(
        &self,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
    ) -> Result<StatusChange<Transaction>> {
        let change = self
            .transactions
            .mark_success(gateway_order_ref, gateway_payment_ref)
            .await?;

        match &change {
            StatusChange::Applied(txn) => tracing::info!(
                transaction_id = %txn.id,
                gateway_order = %gateway_order_ref,
                gateway_payment = %gateway_payment_ref,
                "Transaction settled"
            ),
            StatusChange::Unchanged(txn) => tracing::warn!(
                transaction_id = %txn.id,
                gateway_order = %gateway_order_ref,
                "Transaction already settled, treating as replay"
            ),
        }
        Ok(change)
    }

    /// Settle, accepting a replay only for the same payment reference
    ///
    /// A different payment reference against a settled order is a
    /// `Conflict`; nothing is mutated in that case.
    pub async fn settle_exact(
        &self,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
    ) -> Result<StatusChange<Transaction>> {
        let change = self.settle(gateway_order_ref, gateway_payment_ref).await?;

        if let StatusChange::Unchanged(txn) = &change {
            if txn.gateway_payment_ref.as_deref() != Some(gateway_payment_ref) {
                tracing::warn!(
                    gateway_order = %gateway_order_ref,
                    stored = txn.gateway_payment_ref.as_deref().unwrap_or("-"),
                    incoming = %gateway_payment_ref,
                    "Settled transaction confirmed with a different payment"
                );
                return Err(BillingError::Conflict(format!(
                    "Gateway order {gateway_order_ref} was already paid by another payment"
                )));
            }
        }
        Ok(change)
    }

    pub async fn link_invoice(&self, gateway_order_ref: &str, invoice_id: InvoiceId) -> Result<Transaction> {
        self.transactions.link_invoice(gateway_order_ref, invoice_id).await
    }

    pub async fn for_invoice(&self, invoice_id: &InvoiceId) -> Result<Vec<Transaction>> {
        self.transactions.list_by_invoice(invoice_id).await
    }

    /// Mark a pending attempt failed
    pub async fn fail(&self, gateway_order_ref: &str) -> Result<StatusChange<Transaction>> {
        let change = self.transactions.mark_failed(gateway_order_ref).await?;
        if change.applied() {
            tracing::info!(gateway_order = %gateway_order_ref, "Transaction failed");
        }
        Ok(change)
    }
}
