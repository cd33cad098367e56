//! Error Types

use thiserror::Error;

/// Result type alias for billing operations
pub type Result<T> = std::result::Result<T, BillingError>;

/// Billing error taxonomy
#[derive(Error, Debug)]
pub enum BillingError {
    /// Malformed or missing input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payment or webhook signature mismatch
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Duplicate domain, duplicate product name, settled transaction
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payment gateway or registrar call failed
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// Startup configuration problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BillingError {
    /// Shorthand for a missing entity of the given kind
    pub fn not_found(kind: &str, key: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{kind} {key}"))
    }

    /// Check if the failed call may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }

    /// Whether the error was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_)
                | Self::NotFound(_)
                | Self::InvalidSignature(_)
                | Self::Conflict(_)
                | Self::Json(_)
        )
    }

    /// Message safe to show to the payer
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidArgument(msg) | Self::NotFound(msg) | Self::Conflict(msg) => msg.clone(),
            Self::InvalidSignature(_) => "Invalid payment signature".into(),
            Self::Upstream(_) => "A payment or registrar service failed. Please try again.".into(),
            Self::Json(_) => "Malformed request body".into(),
            Self::Config(_) | Self::Internal(_) => "An unexpected error occurred.".into(),
        }
    }
}
