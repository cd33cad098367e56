//! Payment Gateway Error Types

use billing_core::BillingError;
use thiserror::Error;

/// Result type alias for gateway calls
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Payment gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Transport failure talking to the gateway
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway answered with a non-success status
    #[error("Gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Gateway response did not parse
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Simulated or explicit outage
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Rejected { status, .. } => *status >= 500 || *status == 429,
            Self::Unavailable(_) => true,
            Self::Json(_) => false,
        }
    }
}

impl From<GatewayError> for BillingError {
    fn from(err: GatewayError) -> Self {
        Self::Upstream(err.to_string())
    }
}
