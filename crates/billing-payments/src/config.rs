//! Razorpay configuration

use billing_core::Result;
use billing_core::config::required;

pub const DEFAULT_RAZORPAY_BASE_URL: &str = "https://api.razorpay.com";

/// Credentials for the Razorpay API
#[derive(Clone, Debug)]
pub struct RazorpayConfig {
    /// Public key id, also handed to the browser checkout
    pub key_id: String,

    /// Secret used for API auth and payment signatures
    pub key_secret: String,

    /// Secret used for webhook signatures
    pub webhook_secret: Option<String>,

    pub base_url: String,
}

impl RazorpayConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            key_id: required(&lookup, "RAZORPAY_KEY_ID")?,
            key_secret: required(&lookup, "RAZORPAY_KEY_SECRET")?,
            webhook_secret: webhook_secret_from_lookup(&lookup),
            base_url: lookup("RAZORPAY_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_RAZORPAY_BASE_URL.into()),
        })
    }
}

/// The webhook secret is independent of the API credentials
pub fn webhook_secret_from_lookup<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup("RAZORPAY_WEBHOOK_SECRET").filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_key_pair() {
        let only_id = |key: &str| (key == "RAZORPAY_KEY_ID").then(|| "rzp_test_1".to_string());
        assert!(RazorpayConfig::from_lookup(only_id).is_err());
    }

    #[test]
    fn test_optional_webhook_secret() {
        let config = RazorpayConfig::from_lookup(|key| match key {
            "RAZORPAY_KEY_ID" => Some("rzp_test_1".into()),
            "RAZORPAY_KEY_SECRET" => Some("secret".into()),
            "RAZORPAY_WEBHOOK_SECRET" => Some(String::new()),
            _ => None,
        })
        .unwrap();
        assert!(config.webhook_secret.is_none());
        assert_eq!(config.base_url, DEFAULT_RAZORPAY_BASE_URL);
    }
}
