//! Application State

use std::sync::Arc;
use tokio::task::JoinHandle;

use billing_core::{BillingConfig, MemoryCatalog, Repositories, Result};
use billing_fulfillment::{ContactDefaults, DomainRegistrar, GoDaddyRegistrar, MockRegistrar, RegistrarConfig};
use billing_payments::config::webhook_secret_from_lookup;
use billing_payments::{Adapters, BillingServices, MockGateway, PaymentGateway, RazorpayConfig, RazorpayGateway};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Wired billing services
    pub services: BillingServices,

    /// Whether the real payment gateway is in use
    pub gateway_live: bool,

    /// Whether the real registrar is in use
    pub registrar_live: bool,
}

impl AppState {
    /// Build from environment variables
    pub async fn from_env() -> Result<(Self, JoinHandle<()>)> {
        Self::from_lookup(|key| std::env::var(key).ok()).await
    }

    /// Build from a key lookup
    ///
    /// Outside production, missing gateway or registrar credentials fall back
    /// to the in-process mocks. In production they are a startup error.
    pub async fn from_lookup<F>(lookup: F) -> Result<(Self, JoinHandle<()>)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = BillingConfig::from_lookup(&lookup)?;
        let production = config.environment.is_production();

        let (gateway, gateway_live): (Arc<dyn PaymentGateway>, bool) = match RazorpayConfig::from_lookup(&lookup) {
            Ok(razorpay) => {
                tracing::info!("✓ Razorpay configured");
                (Arc::new(RazorpayGateway::new(razorpay)), true)
            }
            Err(e) if production => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "⚠ Razorpay not configured - using mock gateway");
                (Arc::new(MockGateway::new()), false)
            }
        };

        let (registrar, registrar_live, contact_defaults): (Arc<dyn DomainRegistrar>, bool, ContactDefaults) =
            match RegistrarConfig::from_lookup(&lookup) {
                Ok(godaddy) => {
                    tracing::info!(base_url = %godaddy.base_url, "✓ GoDaddy configured");
                    let contact = godaddy.contact.clone();
                    (Arc::new(GoDaddyRegistrar::new(godaddy)), true, contact)
                }
                Err(e) if production => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "⚠ GoDaddy not configured - using mock registrar");
                    (Arc::new(MockRegistrar::new()), false, ContactDefaults::from_lookup(&lookup))
                }
            };

        let catalog = Arc::new(MemoryCatalog::with_defaults().await?);

        let (services, processor) = BillingServices::assemble(
            config,
            Repositories::in_memory(),
            catalog,
            Adapters {
                gateway,
                registrar,
                webhook_secret: webhook_secret_from_lookup(&lookup),
                contact_defaults,
            },
        );

        let state = Self {
            services,
            gateway_live,
            registrar_live,
        };
        Ok((state, processor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billing_core::BillingError;

    #[tokio::test]
    async fn test_development_falls_back_to_mocks() {
        let (state, _processor) = AppState::from_lookup(|_| None).await.unwrap();
        assert!(!state.gateway_live);
        assert!(!state.registrar_live);
        assert_eq!(state.services.gateway.name(), "mock");
        assert_eq!(state.services.registrar.name(), "mock");
        assert_eq!(state.services.catalog.products().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_production_requires_credentials() {
        let result = AppState::from_lookup(|key| (key == "APP_ENV").then(|| "production".into())).await;
        assert!(matches!(result, Err(BillingError::Config(_))));
    }

    #[tokio::test]
    async fn test_live_adapters_when_configured() {
        let (state, _processor) = AppState::from_lookup(|key| {
            match key {
                "RAZORPAY_KEY_ID" => Some("rzp_test_1"),
                "RAZORPAY_KEY_SECRET" => Some("secret"),
                "GODADDY_KEY" => Some("key"),
                "GODADDY_SECRET" => Some("secret"),
                _ => None,
            }
            .map(str::to_string)
        })
        .await
        .unwrap();
        assert!(state.gateway_live);
        assert!(state.registrar_live);
        assert_eq!(state.services.gateway.public_key(), Some("rzp_test_1"));
    }
}
