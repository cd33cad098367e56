//! GoDaddy Registrar Client
//!
//! Talks to the GoDaddy Domains API with `sso-key` authentication.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{Availability, DomainRegistrar, PurchaseRequest};
use crate::config::RegistrarConfig;
use crate::contacts::ContactSet;
use crate::error::{RegistrarError, Result};

/// Registrar agreement accepted on every purchase
const AGREEMENT_KEYS: [&str; 1] = ["DNRA"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Consent<'a> {
    agreed_at: String,
    agreed_by: &'a str,
    agreement_keys: [&'a str; 1],
}

#[derive(Serialize)]
struct PurchaseBody<'a> {
    consent: Consent<'a>,
    domain: &'a str,
    period: u32,
    privacy: bool,
    #[serde(flatten)]
    contacts: &'a ContactSet,
}

#[derive(Deserialize)]
struct AvailableResponse {
    domain: String,
    available: bool,
    #[serde(default)]
    price: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
}

/// GoDaddy API client
#[derive(Clone)]
pub struct GoDaddyRegistrar {
    config: RegistrarConfig,
    client: reqwest::Client,
}

impl GoDaddyRegistrar {
    pub fn new(config: RegistrarConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn auth_header(&self) -> String {
        format!("sso-key {}:{}", self.config.api_key, self.config.api_secret)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), body = %body, "GoDaddy API error");
        Err(RegistrarError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl DomainRegistrar for GoDaddyRegistrar {
    async fn purchase(&self, request: &PurchaseRequest) -> Result<()> {
        let body = PurchaseBody {
            consent: Consent {
                agreed_at: Utc::now().to_rfc3339(),
                agreed_by: "127.0.0.1",
                agreement_keys: AGREEMENT_KEYS,
            },
            domain: &request.domain,
            period: request.period,
            privacy: true,
            contacts: &request.contacts,
        };

        tracing::info!(domain = %request.domain, period = request.period, "Purchasing domain from GoDaddy");

        let response = self
            .client
            .post(self.url("/v1/domains/purchase"))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;

        Ok(())
    }

    async fn check_availability(&self, domain: &str) -> Result<Availability> {
        let response = self
            .client
            .get(self.url("/v1/domains/available"))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .query(&[("domain", domain)])
            .send()
            .await?;

        let parsed: AvailableResponse = Self::check(response).await?.json().await?;

        Ok(Availability {
            domain: parsed.domain,
            available: parsed.available,
            price_micros: parsed.price,
            currency: parsed.currency,
        })
    }

    fn name(&self) -> &str {
        "godaddy"
    }
}
