//! Service assembly
//!
//! Builds the object graph shared by the HTTP layer: one set of
//! repositories, one ledger, one fulfillment queue, and the orchestrator and
//! webhook reconciler on top of them.

use billing_core::{BillingConfig, CartStore, Catalog, InvoiceFactory, Repositories};
use billing_fulfillment::{ContactDefaults, DomainRegistrar, FulfillmentDispatcher, FulfillmentWorker};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::checkout::CheckoutOrchestrator;
use crate::gateway::PaymentGateway;
use crate::ledger::TransactionLedger;
use crate::settlement::Settler;
use crate::webhook::WebhookReconciler;

/// External collaborators, injected rather than built here
pub struct Adapters {
    pub gateway: Arc<dyn PaymentGateway>,
    pub registrar: Arc<dyn DomainRegistrar>,
    pub webhook_secret: Option<String>,
    pub contact_defaults: ContactDefaults,
}

/// Fully wired billing services
#[derive(Clone)]
pub struct BillingServices {
    pub config: BillingConfig,
    pub repos: Repositories,
    pub catalog: Arc<dyn Catalog>,
    pub carts: Arc<CartStore>,
    pub ledger: Arc<TransactionLedger>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub registrar: Arc<dyn DomainRegistrar>,
    pub settler: Arc<Settler>,
    pub checkout: Arc<CheckoutOrchestrator>,
    pub webhooks: Arc<WebhookReconciler>,
}

impl BillingServices {
    /// Wire everything and start the fulfillment processor
    ///
    /// Must run inside a Tokio runtime. The returned handle finishes once
    /// every clone of the services has been dropped.
    pub fn assemble(
        config: BillingConfig,
        repos: Repositories,
        catalog: Arc<dyn Catalog>,
        adapters: Adapters,
    ) -> (Self, JoinHandle<()>) {
        let carts = Arc::new(CartStore::new(repos.carts.clone(), catalog.clone(), config.tax_rate));
        let ledger = Arc::new(TransactionLedger::new(repos.transactions.clone()));

        let worker = Arc::new(FulfillmentWorker::new(
            adapters.registrar.clone(),
            repos.domains.clone(),
            repos.orders.clone(),
            adapters.contact_defaults,
        ));
        let (dispatcher, handle) = FulfillmentDispatcher::spawn(worker.clone());

        let settler = Arc::new(Settler::new(
            repos.clone(),
            carts.clone(),
            InvoiceFactory::from_config(&config),
            ledger.clone(),
            dispatcher,
            worker,
        ));

        let checkout = Arc::new(CheckoutOrchestrator::new(
            config.clone(),
            repos.clone(),
            carts.clone(),
            adapters.gateway.clone(),
            ledger.clone(),
            settler.clone(),
        ));
        let webhooks = Arc::new(WebhookReconciler::new(
            adapters.webhook_secret,
            config.environment,
            ledger.clone(),
            settler.clone(),
        ));

        tracing::info!(
            gateway = adapters.gateway.name(),
            registrar = adapters.registrar.name(),
            environment = ?config.environment,
            "Billing services assembled"
        );

        let services = Self {
            config,
            repos,
            catalog,
            carts,
            ledger,
            gateway: adapters.gateway,
            registrar: adapters.registrar,
            settler,
            checkout,
            webhooks,
        };
        (services, handle)
    }
}
