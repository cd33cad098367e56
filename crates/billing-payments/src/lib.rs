//! # billing-payments
//!
//! Payment side of the billing pipeline: gateway adapters, the transaction
//! ledger, the two checkout protocols and the webhook reconciler.
//!
//! ## Settlement paths
//!
//! ```text
//! browser ──verify──▶ CheckoutOrchestrator ─┐
//!                                           ├─▶ TransactionLedger::settle ──Applied──▶ Settler::finalize
//! gateway ──webhook─▶ WebhookReconciler ────┘                            └─Unchanged─▶ replay, no side effects
//! ```
//!
//! Both ingress paths may carry the same captured payment. The ledger's
//! conditional settle decides which one runs the side effects.

pub mod checkout;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod services;
pub mod settlement;
pub mod signature;
pub mod webhook;

#[cfg(test)]
mod testkit;

pub use checkout::{CheckoutOrchestrator, CheckoutResult, PaymentConfirmation, PaymentOrder, PaymentOutcome};
pub use config::RazorpayConfig;
pub use error::GatewayError;
pub use gateway::{GatewayOrder, MockGateway, PaymentGateway, RazorpayGateway};
pub use ledger::TransactionLedger;
pub use services::{Adapters, BillingServices};
pub use settlement::{FulfillmentMode, SettleContext, Settlement, Settler};
pub use webhook::{SIGNATURE_HEADER, WebhookOutcome, WebhookReconciler};
