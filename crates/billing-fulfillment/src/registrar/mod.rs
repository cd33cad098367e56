//! Domain Registrar Integration
//!
//! Abstractions and implementations for domain registrars.

mod godaddy;
mod mock;

pub use godaddy::GoDaddyRegistrar;
pub use mock::MockRegistrar;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::contacts::ContactSet;
use crate::error::Result;

/// One registration to place with the registrar
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Lowercase fully qualified name
    pub domain: String,

    /// Years
    pub period: u32,

    pub contacts: ContactSet,
}

/// Availability answer for a domain name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub domain: String,
    pub available: bool,

    /// Registrar list price in millionths of `currency`
    #[serde(default)]
    pub price_micros: Option<i64>,

    #[serde(default)]
    pub currency: Option<String>,
}

impl Availability {
    /// List price in major units
    pub fn price(&self) -> Option<Decimal> {
        self.price_micros.map(|micros| Decimal::new(micros, 6).normalize())
    }
}

/// Registrar client trait
///
/// `purchase` is not idempotent on the registrar side. Callers must make
/// sure a name is purchased at most once.
#[async_trait]
pub trait DomainRegistrar: Send + Sync {
    /// Register a domain
    async fn purchase(&self, request: &PurchaseRequest) -> Result<()>;

    /// Check whether a name can be registered
    async fn check_availability(&self, domain: &str) -> Result<Availability>;

    /// Registrar name, recorded on each Domain
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_from_micros() {
        let availability = Availability {
            domain: "shop.in".into(),
            available: true,
            price_micros: Some(11_990_000),
            currency: Some("USD".into()),
        };
        assert_eq!(availability.price(), Some(dec!(11.99)));
    }
}
