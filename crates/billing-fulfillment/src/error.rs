//! Registrar Error Types

use billing_core::BillingError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistrarError>;

#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registrar rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegistrarError {
    /// Transport problems may clear up; a rejection will not
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Rejected { status, .. } => *status >= 500,
            Self::Json(_) => false,
        }
    }
}

impl From<RegistrarError> for BillingError {
    fn from(err: RegistrarError) -> Self {
        Self::Upstream(err.to_string())
    }
}
