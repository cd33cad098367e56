//! Mock Registrar
//!
//! For testing and local development. Records every purchase call.

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{Availability, DomainRegistrar, PurchaseRequest};
use crate::error::{RegistrarError, Result};

/// Mock list price: 11.99 in micros
const MOCK_PRICE_MICROS: i64 = 11_990_000;

/// In-process registrar that never leaves the machine
#[derive(Default)]
pub struct MockRegistrar {
    purchases: Mutex<Vec<PurchaseRequest>>,

    /// Names whose purchase is rejected
    failing: HashSet<String>,

    /// Names reported as unavailable
    taken: HashSet<String>,

    /// Simulated round-trip time
    latency: Option<Duration>,
}

impl MockRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject purchases of `domain`
    #[must_use]
    pub fn failing_on(mut self, domain: &str) -> Self {
        self.failing.insert(domain.to_lowercase());
        self
    }

    /// Report `domain` as already taken
    #[must_use]
    pub fn with_taken(mut self, domain: &str) -> Self {
        self.taken.insert(domain.to_lowercase());
        self
    }

    /// Delay every call (for testing races)
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every purchase attempted so far, including rejected ones
    pub async fn purchases(&self) -> Vec<PurchaseRequest> {
        self.purchases.lock().await.clone()
    }

    /// Number of purchase calls for one name
    pub async fn purchase_count(&self, domain: &str) -> usize {
        let domain = domain.to_lowercase();
        self.purchases
            .lock()
            .await
            .iter()
            .filter(|p| p.domain == domain)
            .count()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DomainRegistrar for MockRegistrar {
    async fn purchase(&self, request: &PurchaseRequest) -> Result<()> {
        self.purchases.lock().await.push(request.clone());
        self.simulate_latency().await;

        if self.failing.contains(&request.domain) {
            return Err(RegistrarError::Rejected {
                status: 422,
                body: format!("{} cannot be registered", request.domain),
            });
        }

        tracing::debug!(domain = %request.domain, "Mock registrar accepted purchase");
        Ok(())
    }

    async fn check_availability(&self, domain: &str) -> Result<Availability> {
        self.simulate_latency().await;
        let domain = domain.to_lowercase();

        Ok(Availability {
            available: !self.taken.contains(&domain),
            price_micros: Some(MOCK_PRICE_MICROS),
            currency: Some("USD".into()),
            domain,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
