//! Invoices
//!
//! An invoice is an itemized bill. Its total always equals the sum of its
//! lines, and `Paid` is terminal.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, tax_for};
use crate::config::BillingConfig;
use crate::error::{BillingError, Result};
use crate::ids::{ClientId, InvoiceId};
use crate::model::{LineItem, checked_sum};

/// Invoice lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
    Cancelled,
}

/// One billed line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub desc: String,
    pub amount: Decimal,
}

impl InvoiceLine {
    pub fn new(desc: impl Into<String>, amount: Decimal) -> Self {
        Self {
            desc: desc.into(),
            amount,
        }
    }
}

/// Itemized bill issued to a client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: InvoiceId,
    pub client_id: ClientId,
    pub lines: Vec<InvoiceLine>,
    pub total: Decimal,
    pub status: InvoiceStatus,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn lines_total(&self) -> Decimal {
        self.lines.iter().map(|line| line.amount).sum()
    }

    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }
}

/// Builds invoices with consistent tax lines and due dates
#[derive(Clone, Debug)]
pub struct InvoiceFactory {
    tax_rate: Decimal,
    due_days: i64,
}

impl InvoiceFactory {
    pub const fn new(tax_rate: Decimal, due_days: i64) -> Self {
        Self { tax_rate, due_days }
    }

    pub fn from_config(config: &BillingConfig) -> Self {
        Self::new(config.tax_rate, config.invoice_due_days)
    }

    /// Unpaid invoice for the current cart contents
    pub fn from_cart(&self, client_id: ClientId, cart: &Cart) -> Result<Invoice> {
        if cart.is_empty() {
            return Err(BillingError::InvalidArgument("Cart is empty".into()));
        }

        let mut lines = cart
            .items
            .iter()
            .map(|item| Ok(InvoiceLine::new(item_desc(&LineItem::from(item)), item.line_total()?)))
            .collect::<Result<Vec<_>>>()?;
        lines.push(InvoiceLine::new(self.tax_label(), cart.tax));

        self.build(client_id, lines, InvoiceStatus::Unpaid)
    }

    /// Paid invoice for a captured payment
    ///
    /// The tax line is whatever balances the lines against `captured`, so the
    /// invoice total always matches the money actually received.
    pub fn paid(&self, client_id: ClientId, items: &[LineItem], captured: Decimal) -> Result<Invoice> {
        let mut lines = items
            .iter()
            .map(|item| Ok(InvoiceLine::new(item_desc(item), item.amount()?)))
            .collect::<Result<Vec<_>>>()?;

        let subtotal = sum_lines(&lines)?;
        let balance = captured
            .checked_sub(subtotal)
            .ok_or_else(|| BillingError::InvalidArgument("Invoice balance overflows".into()))?;
        let expected_tax = tax_for(subtotal, self.tax_rate);

        if items.is_empty() {
            lines.push(InvoiceLine::new("Payment", captured));
        } else if balance != Decimal::ZERO || expected_tax != Decimal::ZERO {
            if balance != expected_tax {
                tracing::warn!(
                    %captured,
                    %subtotal,
                    %expected_tax,
                    %balance,
                    "Captured amount differs from cart total, recording adjustment"
                );
            }
            lines.push(InvoiceLine::new(self.tax_label(), balance));
        }

        self.build(client_id, lines, InvoiceStatus::Paid)
    }

    fn build(&self, client_id: ClientId, lines: Vec<InvoiceLine>, status: InvoiceStatus) -> Result<Invoice> {
        let now = Utc::now();
        let total = sum_lines(&lines)?;
        Ok(Invoice {
            id: InvoiceId::new(),
            client_id,
            lines,
            total,
            status,
            due_date: now + Duration::days(self.due_days),
            created_at: now,
            updated_at: now,
        })
    }

    fn tax_label(&self) -> String {
        format!("GST ({}%)", (self.tax_rate * Decimal::ONE_HUNDRED).normalize())
    }
}

fn sum_lines(lines: &[InvoiceLine]) -> Result<Decimal> {
    lines.iter().try_fold(Decimal::ZERO, |acc, line| checked_sum(acc, line.amount))
}

fn item_desc(item: &LineItem) -> String {
    let name = item.config.domain().map_or_else(
        || item.name.clone(),
        |d| format!("{} - {}", item.name, d.domain),
    );
    if item.quantity > 1 {
        format!("{name} x{}", item.quantity)
    } else {
        name
    }
}
