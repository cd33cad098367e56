//! Registrar configuration

use billing_core::Result;
use billing_core::config::required;
use serde::{Deserialize, Serialize};

/// GoDaddy test environment
pub const DEFAULT_GODADDY_BASE_URL: &str = "https://api.ote-godaddy.com";

/// Contact used on registrar forms when billing details are missing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDefaults {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address1: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl Default for ContactDefaults {
    fn default() -> Self {
        Self {
            name: "SaaSify".into(),
            email: "contact@saasify.com".into(),
            phone: "1234567890".into(),
            address1: "Street 1".into(),
            city: "Jalandhar".into(),
            state: "Punjab".into(),
            postal_code: "144411".into(),
            country: "IN".into(),
        }
    }
}

impl ContactDefaults {
    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let var = |key: &str, fallback: String| lookup(key).filter(|v| !v.trim().is_empty()).unwrap_or(fallback);
        Self {
            name: var("REGISTRAR_CONTACT_NAME", d.name),
            email: var("REGISTRAR_CONTACT_EMAIL", d.email),
            phone: var("REGISTRAR_CONTACT_PHONE", d.phone),
            address1: var("REGISTRAR_CONTACT_ADDRESS", d.address1),
            city: var("REGISTRAR_CONTACT_CITY", d.city),
            state: var("REGISTRAR_CONTACT_STATE", d.state),
            postal_code: var("REGISTRAR_CONTACT_POSTAL_CODE", d.postal_code),
            country: var("REGISTRAR_CONTACT_COUNTRY", d.country),
        }
    }
}

/// Credentials and endpoint of the GoDaddy API
#[derive(Clone, Debug)]
pub struct RegistrarConfig {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,

    /// Placeholder contact for registrar forms
    pub contact: ContactDefaults,
}

impl RegistrarConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            api_key: required(&lookup, "GODADDY_KEY")?,
            api_secret: required(&lookup, "GODADDY_SECRET")?,
            base_url: lookup("GODADDY_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GODADDY_BASE_URL.into()),
            contact: ContactDefaults::from_lookup(&lookup),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_credentials() {
        assert!(RegistrarConfig::from_lookup(|_| None).is_err());
    }

    #[test]
    fn test_defaults_to_sandbox() {
        let config = RegistrarConfig::from_lookup(|key| match key {
            "GODADDY_KEY" => Some("key".into()),
            "GODADDY_SECRET" => Some("secret".into()),
            "REGISTRAR_CONTACT_CITY" => Some("Pune".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.base_url, DEFAULT_GODADDY_BASE_URL);
        assert_eq!(config.contact.city, "Pune");
        assert_eq!(config.contact.country, "IN");
    }
}
