//! Razorpay Gateway Client
//!
//! Orders API over HTTP basic auth (`key_id:key_secret`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GatewayOrder, PaymentGateway};
use crate::config::RazorpayConfig;
use crate::error::{GatewayError, Result};
use crate::signature;

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    receipt: Option<String>,
}

/// Razorpay API client
#[derive(Clone)]
pub struct RazorpayGateway {
    config: RazorpayConfig,
    client: reqwest::Client,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn orders_url(&self) -> String {
        format!("{}/v1/orders", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<GatewayOrder> {
        let response = self
            .client
            .post(self.orders_url())
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&CreateOrderBody {
                amount: amount_minor,
                currency,
                receipt,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Razorpay API error");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let order: OrderResponse = response.json().await?;
        tracing::info!(gateway_order = %order.id, amount = order.amount, "Razorpay order created");

        Ok(GatewayOrder {
            id: order.id,
            amount: order.amount,
            currency: order.currency,
            receipt: order.receipt,
        })
    }

    fn verify_payment_signature(
        &self,
        gateway_order_ref: &str,
        gateway_payment_ref: &str,
        signature: &str,
    ) -> bool {
        signature::verify_payment(
            &self.config.key_secret,
            gateway_order_ref,
            gateway_payment_ref,
            signature,
        )
    }

    fn public_key(&self) -> Option<&str> {
        Some(self.config.key_id.as_str())
    }

    fn name(&self) -> &str {
        "razorpay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> RazorpayGateway {
        RazorpayGateway::new(RazorpayConfig {
            key_id: "rzp_test_abc".into(),
            key_secret: "shh".into(),
            webhook_secret: None,
            base_url: "https://api.razorpay.com/".into(),
        })
    }

    #[test]
    fn test_orders_url() {
        assert_eq!(gateway().orders_url(), "https://api.razorpay.com/v1/orders");
    }

    #[test]
    fn test_verifies_with_key_secret() {
        let gateway = gateway();
        let sig = signature::sign("shh", b"order_9|pay_9");
        assert!(gateway.verify_payment_signature("order_9", "pay_9", &sig));
        assert!(!gateway.verify_payment_signature("order_9", "pay_8", &sig));
        assert_eq!(gateway.public_key(), Some("rzp_test_abc"));
    }

    #[test]
    fn test_create_order_body() {
        let body = CreateOrderBody {
            amount: 94_400,
            currency: "INR",
            receipt: "rcpt_1",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["amount"], 94_400);
        assert_eq!(json["currency"], "INR");
    }
}
