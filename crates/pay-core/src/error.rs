//! Error Types

use thiserror::Error;

/// Result type alias for payment operations
pub type Result<T> = std::result::Result<T, PayError>;

/// Payment subsystem errors
#[derive(Error, Debug)]
pub enum PayError {
    /// No valid caller identity
    #[error("Caller is not authenticated")]
    Unauthenticated,

    /// Plan id absent from the catalog
    #[error("Unknown plan: {0}")]
    UnknownPlan(String),

    /// Crypto asset has no configured exchange rate
    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    /// Plan currency does not match the provider settlement currency
    #[error("Currency mismatch: plan {plan_id} is {currency}, provider settles in {expected}")]
    CurrencyMismatch {
        plan_id: String,
        currency: String,
        expected: String,
    },

    /// Webhook signature invalid or missing
    #[error("Webhook authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Webhook payload could not be parsed into the provider envelope
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// No payment matches the external id
    #[error("No payment record for external id {0}")]
    RecordNotFound(String),

    /// The payment already reached this terminal state
    #[error("Payment {0} already processed")]
    AlreadyProcessed(String),

    /// Provider API call failed
    #[error("Provider error: {0}")]
    Provider(String),

    /// Persistent store read/patch failed
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PayError {
    /// Check if the provider should redeliver after seeing this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, PayError::Store(_) | PayError::Provider(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            PayError::Unauthenticated => "Please sign in to continue.".into(),
            PayError::UnknownPlan(id) => format!("The plan '{}' does not exist.", id),
            PayError::UnsupportedAsset(asset) => {
                format!("Payments in {} are not supported.", asset)
            }
            PayError::CurrencyMismatch { .. } => {
                "This plan cannot be paid with the selected method.".into()
            }
            PayError::Provider(_) => "Payment processing failed. Please try again.".into(),
            PayError::Config(_) => "Service configuration error.".into(),
            _ => "An error occurred processing your request.".into(),
        }
    }
}
