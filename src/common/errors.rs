//! Error types for the application

use thiserror::Error;

/// Result type alias using our TraderError
pub type Result<T> = std::result::Result<T, TraderError>;

/// Main error type for trading operations
#[derive(Error, Debug)]
pub enum TraderError {
    /// Price data could not be fetched (network or exchange error)
    #[error("Market data unavailable: {0}")]
    DataUnavailable(String),

    /// The exchange refused the order (insufficient funds, below minimum notional, ...)
    #[error("Order rejected: {reason}")]
    OrderRejected { reason: String },

    /// The order endpoint could not be reached or answered with a server error
    #[error("Order port unavailable: {0}")]
    OrderPortUnavailable(String),

    /// Position intent or direct order parameters are invalid
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Error payload returned by the exchange API
    #[error("Exchange error {status}: {name}: {message}")]
    Exchange {
        status: u16,
        name: String,
        message: String,
    },

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TraderError {
    /// Shorthand for an order rejection with the exchange's reason attached verbatim
    pub fn rejected(reason: impl Into<String>) -> Self {
        TraderError::OrderRejected {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            TraderError::DataUnavailable(_)
            | TraderError::OrderPortUnavailable(_)
            | TraderError::HttpRequest(_) => true,
            TraderError::Exchange { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
