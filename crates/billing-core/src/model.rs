//! Domain Models
//!
//! Catalog products, per-item configuration, billing profiles and registered
//! domains. Uses `rust_decimal` for all monetary values - never use f64 for money!

use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{BillingError, Result};
use crate::ids::{ClientId, DomainId, ProductId, UserId};

/// Registration period bounds in years
pub const MIN_DOMAIN_PERIOD: u32 = 1;
pub const MAX_DOMAIN_PERIOD: u32 = 10;
pub const DEFAULT_DOMAIN_PERIOD: u32 = 1;

/// Upper bounds on a single priced line
pub const MAX_LINE_QUANTITY: u32 = 1_000;
pub const MAX_UNIT_PRICE: Decimal = dec!(10000000);

/// Product families sold through the catalog
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Hosting,
    Vps,
    Saas,
    Domain,
}

/// List prices for a product
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub monthly: Option<Decimal>,
    #[serde(default)]
    pub yearly: Option<Decimal>,
}

/// A catalog product definition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,

    /// Display name, unique across the catalog
    pub name: String,

    #[serde(rename = "type")]
    pub product_type: ProductType,

    pub pricing: Pricing,

    #[serde(default)]
    pub description: Option<String>,
}

impl Product {
    pub fn new(name: impl Into<String>, product_type: ProductType, pricing: Pricing) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            product_type,
            pricing,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Price snapshotted into a cart line: yearly, else monthly, else free
    pub fn unit_price(&self) -> Decimal {
        self.pricing
            .yearly
            .or(self.pricing.monthly)
            .unwrap_or(Decimal::ZERO)
    }
}

fn default_period() -> u32 {
    DEFAULT_DOMAIN_PERIOD
}

/// Configuration of a domain registration line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Fully qualified domain name
    #[serde(alias = "domainName")]
    pub domain: String,

    /// Registration period in years
    #[serde(default = "default_period")]
    pub period: u32,
}

impl DomainConfig {
    pub fn new(domain: impl Into<String>, period: u32) -> Self {
        Self {
            domain: domain.into(),
            period,
        }
    }

    /// Normalise the name and check the period bounds
    pub fn validated(self) -> Result<Self> {
        let domain = self.domain.trim().trim_end_matches('.').to_lowercase();

        if domain.is_empty() {
            return Err(BillingError::InvalidArgument(
                "Domain name is required for domain products".into(),
            ));
        }
        if !domain.contains('.') || domain.starts_with('.') || domain.contains(char::is_whitespace) {
            return Err(BillingError::InvalidArgument(format!("Invalid domain name: {domain}")));
        }
        if !(MIN_DOMAIN_PERIOD..=MAX_DOMAIN_PERIOD).contains(&self.period) {
            return Err(BillingError::InvalidArgument(format!(
                "Registration period must be between {MIN_DOMAIN_PERIOD} and {MAX_DOMAIN_PERIOD} years"
            )));
        }

        Ok(Self {
            domain,
            period: self.period,
        })
    }
}

/// Free-form options for products with no fixed schema
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenericConfig {
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_json::Value>,
}

/// Per-item configuration, one variant per product family that needs one
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemConfig {
    Domain(DomainConfig),
    Generic(GenericConfig),
}

impl Default for ItemConfig {
    fn default() -> Self {
        Self::Generic(GenericConfig::default())
    }
}

impl ItemConfig {
    pub const fn domain(&self) -> Option<&DomainConfig> {
        match self {
            Self::Domain(config) => Some(config),
            Self::Generic(_) => None,
        }
    }

    /// Check the configuration against the product it is attached to
    pub fn validated_for(self, product_type: ProductType) -> Result<Self> {
        match (product_type, self) {
            (ProductType::Domain, Self::Domain(config)) => Ok(Self::Domain(config.validated()?)),
            (ProductType::Domain, Self::Generic(_)) => Err(BillingError::InvalidArgument(
                "Domain name is required for domain products".into(),
            )),
            (_, config) => Ok(config),
        }
    }
}

/// A priced line: the common input of invoice and order construction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub product_id: Option<ProductId>,

    pub name: String,

    #[serde(alias = "price")]
    pub unit_price: Decimal,

    #[serde(alias = "qty", default = "default_quantity")]
    pub quantity: u32,

    #[serde(default)]
    pub config: ItemConfig,
}

const fn default_quantity() -> u32 {
    1
}

impl LineItem {
    pub fn amount(&self) -> Result<Decimal> {
        line_amount(self.unit_price, self.quantity)
    }

    /// Bounds and configuration check for client-supplied lines
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_LINE_QUANTITY).contains(&self.quantity) {
            return Err(BillingError::InvalidArgument(format!(
                "Quantity for {} must be between 1 and {MAX_LINE_QUANTITY}",
                self.name
            )));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(BillingError::InvalidArgument(format!(
                "Price for {} cannot be negative",
                self.name
            )));
        }
        if self.unit_price > MAX_UNIT_PRICE {
            return Err(BillingError::InvalidArgument(format!(
                "Price for {} exceeds {MAX_UNIT_PRICE}",
                self.name
            )));
        }
        if let Some(domain) = self.config.domain() {
            domain.clone().validated()?;
        }
        Ok(())
    }
}

/// Sum of line amounts, failing instead of overflowing
pub fn subtotal_of(items: &[LineItem]) -> Result<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |acc, item| checked_sum(acc, item.amount()?))
}

/// `unit_price × quantity` with overflow reported as invalid input
pub fn line_amount(unit_price: Decimal, quantity: u32) -> Result<Decimal> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .ok_or_else(|| BillingError::InvalidArgument(format!("Line amount overflows: {unit_price} x {quantity}")))
}

pub fn checked_sum(a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| BillingError::InvalidArgument("Amount total overflows".into()))
}

/// Billing contact captured at checkout
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, alias = "gst")]
    pub gst_number: Option<String>,
}

/// Billing profile of a user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: ClientId,
    pub user_id: UserId,
    pub company: Option<String>,
    pub address: Option<String>,
    pub gst_number: Option<String>,
    pub wallet_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Client {
    /// Default profile: empty wallet, no billing fields
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: ClientId::new(),
            user_id,
            company: None,
            address: None,
            gst_number: None,
            wallet_balance: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle of a registered domain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    Active,
    Expired,
    Suspended,
}

/// A domain registered on behalf of a client
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: DomainId,
    pub client_id: ClientId,

    /// Unique, lowercase
    pub name: String,

    pub registrar: String,
    pub status: DomainStatus,
    pub registered_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Domain {
    /// Record a fresh registration of `period` years starting at `now`
    pub fn registered(
        client_id: ClientId,
        name: &str,
        registrar: impl Into<String>,
        period: u32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let expires_at = now
            .checked_add_months(Months::new(period.saturating_mul(12)))
            .ok_or_else(|| BillingError::Internal(format!("Expiry overflow for {name}")))?;

        Ok(Self {
            id: DomainId::new(),
            client_id,
            name: name.to_lowercase(),
            registrar: registrar.into(),
            status: DomainStatus::Active,
            registered_at: now,
            expires_at,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == DomainStatus::Expired || now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};
    use rust_decimal_macros::dec;

    #[test]
    fn test_unit_price_prefers_yearly() {
        let product = Product::new(
            "Hosting",
            ProductType::Hosting,
            Pricing {
                monthly: Some(dec!(99)),
                yearly: Some(dec!(999)),
            },
        );
        assert_eq!(product.unit_price(), dec!(999));

        let monthly_only = Product::new(
            "VPS",
            ProductType::Vps,
            Pricing {
                monthly: Some(dec!(450)),
                yearly: None,
            },
        );
        assert_eq!(monthly_only.unit_price(), dec!(450));
        assert_eq!(Product::new("Free", ProductType::Saas, Pricing::default()).unit_price(), Decimal::ZERO);
    }

    #[test]
    fn test_item_config_parses_domain_and_alias() {
        let config: ItemConfig = serde_json::from_str(r#"{"domain":"example.com","period":2}"#).unwrap();
        assert_eq!(config.domain(), Some(&DomainConfig::new("example.com", 2)));

        let alias: ItemConfig = serde_json::from_str(r#"{"domainName":"example.org"}"#).unwrap();
        assert_eq!(alias.domain().map(|d| d.period), Some(1));

        let generic: ItemConfig = serde_json::from_str(r#"{"os":"ubuntu"}"#).unwrap();
        assert!(generic.domain().is_none());
    }

    #[test]
    fn test_domain_products_require_domain_config() {
        let err = ItemConfig::default().validated_for(ProductType::Domain).unwrap_err();
        assert!(matches!(err, BillingError::InvalidArgument(_)));

        assert!(ItemConfig::default().validated_for(ProductType::Hosting).is_ok());
    }

    #[test]
    fn test_domain_config_validation() {
        let config = DomainConfig::new("  Example.COM ", 1).validated().unwrap();
        assert_eq!(config.domain, "example.com");

        assert!(DomainConfig::new("", 1).validated().is_err());
        assert!(DomainConfig::new("localhost", 1).validated().is_err());
        assert!(DomainConfig::new("example.com", 0).validated().is_err());
        assert!(DomainConfig::new("example.com", 11).validated().is_err());
    }

    #[test]
    fn test_line_item_accepts_client_field_names() {
        let item: LineItem = serde_json::from_str(
            r#"{"name":"Domain - a.com","price":799,"qty":2,"config":{"domain":"a.com"}}"#,
        )
        .unwrap();
        assert_eq!(item.amount().unwrap(), dec!(1598));
        assert!(item.validate().is_ok());
    }

    #[test]
    fn test_line_item_bounds() {
        let item = |unit_price: Decimal, quantity: u32| LineItem {
            product_id: None,
            name: "Hosting".into(),
            unit_price,
            quantity,
            config: ItemConfig::default(),
        };

        assert!(item(MAX_UNIT_PRICE, MAX_LINE_QUANTITY).validate().is_ok());
        for bad in [
            item(Decimal::MAX, 2),
            item(MAX_UNIT_PRICE + dec!(0.01), 1),
            item(dec!(10), 0),
            item(dec!(10), MAX_LINE_QUANTITY + 1),
            item(dec!(-1), 1),
        ] {
            let err = bad.validate().unwrap_err();
            assert!(matches!(err, BillingError::InvalidArgument(_)), "{bad:?}");
        }

        // unchecked lines report overflow instead of panicking
        let err = item(Decimal::MAX, 2).amount().unwrap_err();
        assert!(matches!(err, BillingError::InvalidArgument(_)));
        assert!(subtotal_of(&[item(Decimal::MAX, 1), item(Decimal::MAX, 1)]).is_err());
        assert_eq!(subtotal_of(&[item(dec!(800), 1), item(dec!(199), 2)]).unwrap(), dec!(1198));
    }

    #[test]
    fn test_domain_expiry_honours_period() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let domain = Domain::registered(ClientId::new(), "Example.com", "godaddy", 3, now).unwrap();
        assert_eq!(domain.name, "example.com");
        assert_eq!(domain.expires_at.year(), 2029);
        assert_eq!(domain.status, DomainStatus::Active);
        assert!(!domain.is_expired(now));
    }
}
