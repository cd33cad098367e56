//! Billing configuration
//!
//! Values are read from the process environment (after `.env` has been
//! loaded by the binary). Every reader goes through a `from_lookup` variant
//! so tests can feed a plain map instead of mutating the environment.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use crate::error::{BillingError, Result};

/// Flat GST rate applied to every cart
pub const DEFAULT_GST_RATE: Decimal = dec!(0.18);

/// Days until an invoice falls due
pub const DEFAULT_INVOICE_DUE_DAYS: i64 = 30;

/// Gateway per-transaction ceiling (INR 15,00,000)
pub const DEFAULT_MAX_TRANSACTION_AMOUNT: Decimal = dec!(1500000);

pub const DEFAULT_CURRENCY: &str = "INR";

/// Deployment environment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "test" | "staging" => Ok(Self::Development),
            other => Err(BillingError::Config(format!("Unknown APP_ENV: {other}"))),
        }
    }
}

/// Core billing settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Tax rate applied to cart subtotals
    pub tax_rate: Decimal,

    /// Invoice due date offset in days
    pub invoice_due_days: i64,

    /// ISO currency code sent to the gateway
    pub currency: String,

    /// Largest amount accepted for one payment order
    pub max_transaction_amount: Decimal,

    /// Deployment environment
    pub environment: Environment,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            tax_rate: DEFAULT_GST_RATE,
            invoice_due_days: DEFAULT_INVOICE_DUE_DAYS,
            currency: DEFAULT_CURRENCY.into(),
            max_transaction_amount: DEFAULT_MAX_TRANSACTION_AMOUNT,
            environment: Environment::default(),
        }
    }
}

impl BillingConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            tax_rate: parse_or(&lookup, "GST_RATE", defaults.tax_rate)?,
            invoice_due_days: parse_or(&lookup, "INVOICE_DUE_DAYS", defaults.invoice_due_days)?,
            currency: lookup("CURRENCY").unwrap_or(defaults.currency),
            max_transaction_amount: parse_or(
                &lookup,
                "MAX_TRANSACTION_AMOUNT",
                defaults.max_transaction_amount,
            )?,
            environment: parse_or(&lookup, "APP_ENV", defaults.environment)?,
        };

        if config.tax_rate < Decimal::ZERO || config.tax_rate >= Decimal::ONE {
            return Err(BillingError::Config(format!(
                "GST_RATE must be in [0, 1), got {}",
                config.tax_rate
            )));
        }
        if config.max_transaction_amount <= Decimal::ZERO {
            return Err(BillingError::Config("MAX_TRANSACTION_AMOUNT must be positive".into()));
        }

        Ok(config)
    }
}

/// Parse an optional variable, falling back to `default` when unset
pub fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| BillingError::Config(format!("{key}: {e}"))),
        _ => Ok(default),
    }
}

/// Read a required variable
pub fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| BillingError::Config(format!("{key} not set")))
}
