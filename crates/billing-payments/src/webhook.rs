//! Razorpay Webhook Handling
//!
//! Server-to-server ingress for the same "payment captured" fact the client
//! verification reports. Either path may arrive first; whichever settles the
//! transaction runs the settlement, the other is a replay.
//!
//! Once the signature checks out the reconciler never fails: every
//! downstream problem is logged and acknowledged, so the gateway does not
//! keep redelivering an event for a payment that was legitimate.

use billing_core::{BillingError, Environment, Result, StatusChange, TransactionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::gateway::from_minor_units;
use crate::ledger::TransactionLedger;
use crate::settlement::{FulfillmentMode, SettleContext, Settler};
use crate::signature;

/// Header carrying the body signature
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    event: String,
    #[serde(default)]
    payload: Option<EventPayload>,
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    #[serde(default)]
    payment: Option<EntityWrapper>,
}

#[derive(Debug, Deserialize)]
struct EntityWrapper {
    entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    amount: Option<i64>,
}

/// What the reconciler did with an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// This delivery settled the payment
    Settled { transaction_id: TransactionId },

    /// Already settled by an earlier delivery or client verification
    Replayed { transaction_id: TransactionId },

    /// Pending transaction marked failed
    Failed { gateway_order: String },

    /// No transaction matches the gateway order
    Unmatched { gateway_order: String },

    /// Event type not handled, or payload unusable
    Ignored { event: String },
}

pub struct WebhookReconciler {
    secret: Option<String>,
    environment: Environment,
    ledger: Arc<TransactionLedger>,
    settler: Arc<Settler>,
}

impl WebhookReconciler {
    pub fn new(
        secret: Option<String>,
        environment: Environment,
        ledger: Arc<TransactionLedger>,
        settler: Arc<Settler>,
    ) -> Self {
        if secret.is_none() && !environment.is_production() {
            tracing::warn!("RAZORPAY_WEBHOOK_SECRET not set - webhook signatures will NOT be verified");
        }
        Self {
            secret,
            environment,
            ledger,
            settler,
        }
    }

    /// Verify and process one delivery
    ///
    /// Errors only for signature problems; everything after that is an
    /// acknowledged [`WebhookOutcome`].
    pub async fn handle(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookOutcome> {
        self.verify(body, signature)?;

        let payload: WebhookPayload = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Unparseable webhook body with valid signature");
                return Ok(WebhookOutcome::Ignored {
                    event: "unparseable".into(),
                });
            }
        };

        tracing::info!(event = %payload.event, "Processing Razorpay webhook");

        let entity = payload.payload.and_then(|p| p.payment).map(|w| w.entity);
        let outcome = match (payload.event.as_str(), entity) {
            ("payment.captured", Some(entity)) => self.captured(entity).await,
            ("payment.failed", Some(entity)) => self.failed(entity).await,
            (event, _) => {
                tracing::debug!(event = %event, "Unhandled webhook event");
                WebhookOutcome::Ignored {
                    event: event.to_string(),
                }
            }
        };

        Ok(outcome)
    }

    fn verify(&self, body: &[u8], signature: Option<&str>) -> Result<()> {
        let Some(secret) = &self.secret else {
            if self.environment.is_production() {
                tracing::error!("Webhook rejected: no webhook secret configured in production");
                return Err(BillingError::Config("Webhook secret not configured".into()));
            }
            tracing::warn!("Webhook signature check bypassed (development)");
            return Ok(());
        };

        let Some(signature) = signature else {
            return Err(BillingError::InvalidSignature(format!("Missing {SIGNATURE_HEADER} header")));
        };
        if !signature::verify(secret, body, signature) {
            tracing::warn!("Webhook signature mismatch");
            return Err(BillingError::InvalidSignature("Webhook signature mismatch".into()));
        }
        Ok(())
    }

    async fn captured(&self, entity: PaymentEntity) -> WebhookOutcome {
        let Some(order_ref) = entity.order_id else {
            tracing::error!(payment = %entity.id, "Captured payment has no gateway order");
            return WebhookOutcome::Ignored {
                event: "payment.captured".into(),
            };
        };

        let txn = match self.ledger.lookup(&order_ref).await {
            Ok(Some(txn)) => txn,
            Ok(None) => {
                tracing::error!(
                    gateway_order = %order_ref,
                    gateway_payment = %entity.id,
                    amount_minor = ?entity.amount,
                    "Captured payment matches no transaction"
                );
                return WebhookOutcome::Unmatched {
                    gateway_order: order_ref,
                };
            }
            Err(e) => {
                tracing::error!(gateway_order = %order_ref, error = %e, "Transaction lookup failed");
                return WebhookOutcome::Unmatched {
                    gateway_order: order_ref,
                };
            }
        };

        let captured = entity.amount.map(from_minor_units);
        if let Some(captured) = captured.filter(|captured| *captured != txn.amount) {
            tracing::error!(
                gateway_order = %order_ref,
                gateway_payment = %entity.id,
                %captured,
                expected = %txn.amount,
                "Captured amount differs from transaction, invoicing the captured amount"
            );
        }

        match self.ledger.settle(&order_ref, &entity.id).await {
            Ok(StatusChange::Applied(txn)) => {
                let transaction_id = txn.id;
                let ctx = SettleContext {
                    captured,
                    ..SettleContext::default()
                };
                let settlement = self.settler.finalize(txn, ctx, FulfillmentMode::Inline).await;
                tracing::info!(
                    gateway_order = %order_ref,
                    invoice_id = ?settlement.invoice.as_ref().map(|i| i.id),
                    order_id = ?settlement.order.as_ref().map(|o| o.id),
                    "Webhook settled payment"
                );
                WebhookOutcome::Settled { transaction_id }
            }
            Ok(StatusChange::Unchanged(txn)) => WebhookOutcome::Replayed { transaction_id: txn.id },
            Err(e) => {
                tracing::error!(gateway_order = %order_ref, error = %e, "Failed to settle captured payment");
                WebhookOutcome::Unmatched {
                    gateway_order: order_ref,
                }
            }
        }
    }

    async fn failed(&self, entity: PaymentEntity) -> WebhookOutcome {
        let Some(order_ref) = entity.order_id else {
            return WebhookOutcome::Ignored {
                event: "payment.failed".into(),
            };
        };

        match self.ledger.fail(&order_ref).await {
            Ok(_) => WebhookOutcome::Failed {
                gateway_order: order_ref,
            },
            Err(BillingError::NotFound(_)) => {
                tracing::warn!(gateway_order = %order_ref, "Failed payment matches no transaction");
                WebhookOutcome::Unmatched {
                    gateway_order: order_ref,
                }
            }
            Err(e) => {
                tracing::error!(gateway_order = %order_ref, error = %e, "Failed to record payment failure");
                WebhookOutcome::Ignored {
                    event: "payment.failed".into(),
                }
            }
        }
    }
}
