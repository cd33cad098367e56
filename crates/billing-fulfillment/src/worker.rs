//! Fulfillment Worker
//!
//! Registers the domains of a paid order. The name is claimed in the domain
//! store before the registrar is called, so two workers racing on the same
//! payment (client verification and webhook) can never both purchase it.
//!
//! The worker never returns an error. Every failure is logged with enough
//! context for an operator and leaves the order pending.

use billing_core::{
    BillingDetails, ClientId, Domain, DomainConfig, DomainRepository, Order, OrderId,
    OrderRepository, OrderStatus, StatusChange,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::ContactDefaults;
use crate::contacts::{ContactSet, build_contacts};
use crate::registrar::{DomainRegistrar, PurchaseRequest};

/// How long to wait for another fulfillment holding a domain claim
pub const DEFAULT_CLAIM_WAIT: Duration = Duration::from_secs(5);
const CLAIM_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Provisioning work for one paid order
#[derive(Clone, Debug, PartialEq)]
pub struct FulfillmentJob {
    pub order_id: OrderId,
    pub client_id: ClientId,

    /// Domain items of the order, in order
    pub items: Vec<DomainConfig>,

    /// Payer details used for registrar contacts
    pub billing: BillingDetails,

    /// Gateway order that paid for this, for reconciliation logs
    pub gateway_order_ref: Option<String>,
}

impl FulfillmentJob {
    pub fn for_order(order: &Order, billing: BillingDetails) -> Self {
        Self {
            order_id: order.id,
            client_id: order.client_id,
            items: order.domain_items(),
            billing,
            gateway_order_ref: None,
        }
    }

    #[must_use]
    pub fn with_gateway_order(mut self, gateway_order_ref: impl Into<String>) -> Self {
        self.gateway_order_ref = Some(gateway_order_ref.into());
        self
    }
}

/// What happened to one domain item
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Purchased and recorded by this worker
    Registered { domain: String },

    /// A Domain record already existed, no purchase made
    AlreadyRegistered { domain: String },

    /// Left for manual review
    Failed { domain: String, reason: String },
}

impl ItemOutcome {
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Registered { .. } | Self::AlreadyRegistered { .. })
    }

    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Summary of one job
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentReport {
    pub order_id: OrderId,
    pub outcomes: Vec<ItemOutcome>,

    /// Whether this run moved the order to completed
    pub order_completed: bool,
}

impl FulfillmentReport {
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }
}

/// Registers domains and completes orders
pub struct FulfillmentWorker {
    registrar: Arc<dyn DomainRegistrar>,
    domains: Arc<dyn DomainRepository>,
    orders: Arc<dyn OrderRepository>,
    contact_defaults: ContactDefaults,
    claim_wait: Duration,
}

impl FulfillmentWorker {
    pub fn new(
        registrar: Arc<dyn DomainRegistrar>,
        domains: Arc<dyn DomainRepository>,
        orders: Arc<dyn OrderRepository>,
        contact_defaults: ContactDefaults,
    ) -> Self {
        Self {
            registrar,
            domains,
            orders,
            contact_defaults,
            claim_wait: DEFAULT_CLAIM_WAIT,
        }
    }

    #[must_use]
    pub fn with_claim_wait(mut self, claim_wait: Duration) -> Self {
        self.claim_wait = claim_wait;
        self
    }

    pub fn registrar(&self) -> &Arc<dyn DomainRegistrar> {
        &self.registrar
    }

    /// Process every item of the job independently, then complete the order
    /// if all of them are registered
    pub async fn fulfill(&self, job: &FulfillmentJob) -> FulfillmentReport {
        let contacts = build_contacts(&job.billing, &self.contact_defaults);

        let mut outcomes = Vec::with_capacity(job.items.len());
        for item in &job.items {
            outcomes.push(self.fulfill_item(job, item, &contacts).await);
        }

        let order_completed = if outcomes.iter().all(ItemOutcome::is_done) {
            self.complete_order(job).await
        } else {
            if outcomes.iter().any(ItemOutcome::is_failure) {
                tracing::error!(
                    order_id = %job.order_id,
                    client_id = %job.client_id,
                    gateway_order = job.gateway_order_ref.as_deref().unwrap_or("-"),
                    "Order left pending for manual review"
                );
            }
            false
        };

        FulfillmentReport {
            order_id: job.order_id,
            outcomes,
            order_completed,
        }
    }

    async fn fulfill_item(
        &self,
        job: &FulfillmentJob,
        item: &DomainConfig,
        contacts: &ContactSet,
    ) -> ItemOutcome {
        let config = match item.clone().validated() {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(order_id = %job.order_id, domain = %item.domain, error = %e, "Invalid domain item");
                return ItemOutcome::Failed {
                    domain: item.domain.clone(),
                    reason: e.to_string(),
                };
            }
        };
        let domain = config.domain.clone();

        match self.domains.claim(&domain).await {
            Ok(true) => {}
            Ok(false) => return self.unclaimable(job, domain).await,
            Err(e) => {
                tracing::error!(order_id = %job.order_id, domain = %domain, error = %e, "Failed to claim domain");
                return ItemOutcome::Failed {
                    domain,
                    reason: e.to_string(),
                };
            }
        }

        let request = PurchaseRequest {
            domain: domain.clone(),
            period: config.period,
            contacts: contacts.clone(),
        };

        if let Err(e) = self.registrar.purchase(&request).await {
            tracing::error!(
                order_id = %job.order_id,
                client_id = %job.client_id,
                domain = %domain,
                gateway_order = job.gateway_order_ref.as_deref().unwrap_or("-"),
                registrar = self.registrar.name(),
                retryable = e.is_retryable(),
                error = %e,
                "Domain registration failed"
            );
            if let Err(release_err) = self.domains.release(&domain).await {
                tracing::warn!(domain = %domain, error = %release_err, "Failed to release domain claim");
            }
            return ItemOutcome::Failed {
                domain,
                reason: e.to_string(),
            };
        }

        let recorded = Domain::registered(
            job.client_id,
            &domain,
            self.registrar.name(),
            config.period,
            Utc::now(),
        );
        let stored = match recorded {
            Ok(record) => self.domains.insert(&record).await.map(|()| record),
            Err(e) => Err(e),
        };

        match stored {
            Ok(record) => {
                tracing::info!(
                    order_id = %job.order_id,
                    domain = %domain,
                    expires_at = %record.expires_at,
                    "Domain registered"
                );
                ItemOutcome::Registered { domain }
            }
            Err(e) => {
                // The claim stays held: the name is bought, only the record is missing
                tracing::error!(
                    order_id = %job.order_id,
                    client_id = %job.client_id,
                    domain = %domain,
                    gateway_order = job.gateway_order_ref.as_deref().unwrap_or("-"),
                    error = %e,
                    "Domain purchased but not recorded"
                );
                ItemOutcome::Failed {
                    domain,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn unclaimable(&self, job: &FulfillmentJob, domain: String) -> ItemOutcome {
        match self.domains.exists_by_name(&domain).await {
            Ok(true) => {
                tracing::warn!(order_id = %job.order_id, domain = %domain, "Domain already registered, skipping purchase");
                ItemOutcome::AlreadyRegistered { domain }
            }
            Ok(false) => self.await_claim_holder(job, domain).await,
            Err(e) => ItemOutcome::Failed {
                domain,
                reason: e.to_string(),
            },
        }
    }

    /// Another fulfillment holds the claim: wait for its registration to land
    async fn await_claim_holder(&self, job: &FulfillmentJob, domain: String) -> ItemOutcome {
        tracing::info!(order_id = %job.order_id, domain = %domain, "Domain registration already in flight, waiting");
        let deadline = Instant::now() + self.claim_wait;

        loop {
            tokio::time::sleep(CLAIM_POLL_INTERVAL).await;

            match self.domains.exists_by_name(&domain).await {
                Ok(true) => {
                    tracing::info!(order_id = %job.order_id, domain = %domain, "Domain registered by concurrent fulfillment");
                    return ItemOutcome::AlreadyRegistered { domain };
                }
                Ok(false) if Instant::now() < deadline => {}
                Ok(false) => {
                    tracing::error!(
                        order_id = %job.order_id,
                        client_id = %job.client_id,
                        domain = %domain,
                        gateway_order = job.gateway_order_ref.as_deref().unwrap_or("-"),
                        "Concurrent registration of domain did not complete"
                    );
                    return ItemOutcome::Failed {
                        domain,
                        reason: "registration held by another fulfillment did not complete".into(),
                    };
                }
                Err(e) => {
                    return ItemOutcome::Failed {
                        domain,
                        reason: e.to_string(),
                    };
                }
            }
        }
    }

    async fn complete_order(&self, job: &FulfillmentJob) -> bool {
        match self
            .orders
            .transition(&job.order_id, OrderStatus::Pending, OrderStatus::Completed)
            .await
        {
            Ok(StatusChange::Applied(_)) => {
                tracing::info!(order_id = %job.order_id, "Order completed");
                true
            }
            Ok(StatusChange::Unchanged(_)) => false,
            Err(e) => {
                tracing::error!(order_id = %job.order_id, error = %e, "Failed to complete order");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registrar::MockRegistrar;
    use billing_core::{InvoiceId, ItemConfig, LineItem, MemoryStore, OrderFactory};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        registrar: Arc<MockRegistrar>,
        worker: Arc<FulfillmentWorker>,
    }

    fn fixture(registrar: MockRegistrar) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let registrar = Arc::new(registrar);
        let worker = Arc::new(
            FulfillmentWorker::new(registrar.clone(), store.clone(), store.clone(), ContactDefaults::default())
                .with_claim_wait(Duration::from_millis(200)),
        );
        Fixture {
            store,
            registrar,
            worker,
        }
    }

    fn domain_line(domain: &str) -> LineItem {
        LineItem {
            product_id: None,
            name: "Domain Registration".into(),
            unit_price: dec!(999),
            quantity: 1,
            config: ItemConfig::Domain(DomainConfig::new(domain, 1)),
        }
    }

    async fn order_with(store: &MemoryStore, lines: &[LineItem]) -> Order {
        let order = OrderFactory::pending(ClientId::new(), InvoiceId::new(), lines);
        OrderRepository::insert(store, &order).await.unwrap();
        order
    }

    async fn status(store: &MemoryStore, id: &OrderId) -> OrderStatus {
        OrderRepository::get(store, id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_registers_and_completes_order() {
        let f = fixture(MockRegistrar::new());
        let order = order_with(&f.store, &[domain_line("shop.in")]).await;

        let report = f.worker.fulfill(&FulfillmentJob::for_order(&order, BillingDetails::default())).await;

        assert!(report.order_completed);
        assert_eq!(report.outcomes, vec![ItemOutcome::Registered { domain: "shop.in".into() }]);
        assert!(f.store.exists_by_name("shop.in").await.unwrap());
        assert_eq!(status(&f.store, &order.id).await, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_existing_domain_is_not_purchased_again() {
        let f = fixture(MockRegistrar::new());
        let order = order_with(&f.store, &[domain_line("shop.in")]).await;
        let job = FulfillmentJob::for_order(&order, BillingDetails::default());

        f.worker.fulfill(&job).await;
        let second = f.worker.fulfill(&job).await;

        assert_eq!(second.outcomes, vec![ItemOutcome::AlreadyRegistered { domain: "shop.in".into() }]);
        assert_eq!(f.registrar.purchase_count("shop.in").await, 1);
    }

    #[tokio::test]
    async fn test_failure_isolated_per_item() {
        let f = fixture(MockRegistrar::new().failing_on("bad.com"));
        let order = order_with(&f.store, &[domain_line("bad.com"), domain_line("good.com")]).await;

        let report = f.worker.fulfill(&FulfillmentJob::for_order(&order, BillingDetails::default())).await;

        assert!(!report.order_completed);
        assert_eq!(report.failures().count(), 1);
        assert!(f.store.exists_by_name("good.com").await.unwrap());
        assert!(!f.store.exists_by_name("bad.com").await.unwrap());
        assert_eq!(status(&f.store, &order.id).await, OrderStatus::Pending);

        // claim released, a later manual retry can purchase it
        assert!(f.store.claim("bad.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_racing_workers_purchase_once() {
        let f = fixture(MockRegistrar::new().with_latency(Duration::from_millis(20)));
        let order = order_with(&f.store, &[domain_line("race.dev")]).await;
        let job = FulfillmentJob::for_order(&order, BillingDetails::default());

        let (a, b) = tokio::join!(f.worker.fulfill(&job), f.worker.fulfill(&job));

        assert_eq!(f.registrar.purchase_count("race.dev").await, 1);
        assert_eq!(usize::from(a.order_completed) + usize::from(b.order_completed), 1);
        let recorded = DomainRepository::list_by_client(f.store.as_ref(), &order.client_id).await.unwrap();
        assert_eq!(recorded.len(), 1);
    }

    #[tokio::test]
    async fn test_contacts_from_billing_details() {
        let f = fixture(MockRegistrar::new());
        let order = order_with(&f.store, &[domain_line("named.org")]).await;
        let billing = BillingDetails {
            name: Some("Meera Nair".into()),
            ..BillingDetails::default()
        };

        f.worker.fulfill(&FulfillmentJob::for_order(&order, billing)).await;

        let purchases = f.registrar.purchases().await;
        assert_eq!(purchases[0].contacts.contact_registrant.name_last, "Nair");
    }

    #[tokio::test]
    async fn test_distinct_orders_for_one_domain() {
        let f = fixture(MockRegistrar::new().with_latency(Duration::from_millis(50)));
        let first = order_with(&f.store, &[domain_line("shared.io")]).await;
        let second = order_with(&f.store, &[domain_line("shared.io")]).await;

        let first_job = FulfillmentJob::for_order(&first, BillingDetails::default());
        let second_job = FulfillmentJob::for_order(&second, BillingDetails::default());
        let (a, b) = tokio::join!(
            f.worker.fulfill(&first_job),
            f.worker.fulfill(&second_job),
        );

        assert_eq!(f.registrar.purchase_count("shared.io").await, 1);
        assert!(a.order_completed && b.order_completed);
        assert_eq!(status(&f.store, &first.id).await, OrderStatus::Completed);
        assert_eq!(status(&f.store, &second.id).await, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_stuck_claim_needs_manual_review() {
        let f = fixture(MockRegistrar::new());
        let order = order_with(&f.store, &[domain_line("stuck.io")]).await;
        assert!(f.store.claim("stuck.io").await.unwrap());

        let report = f.worker.fulfill(&FulfillmentJob::for_order(&order, BillingDetails::default())).await;

        assert!(!report.order_completed);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(f.registrar.purchase_count("stuck.io").await, 0);
        assert_eq!(status(&f.store, &order.id).await, OrderStatus::Pending);
    }
}
