use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Request shape rejected locally; nothing was sent.
    #[error("Order validation failed: {0}")]
    ValidationError(String),

    #[error("Insufficient margin: {0}")]
    MarginError(String),

    #[error("Invalid position mode: {0}")]
    PositionModeError(String),

    /// The channel (or the HTTP connection) could not carry the request.
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Exchange client error: {0}")]
    GenericClientError(String),

    /// Raw exchange rejection, before classification.
    #[error("API error: {code} - {message}")]
    ApiError { code: i32, message: String },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),
}

impl ExchangeError {
    /// Connectivity failure: eligible for REST fallback on write operations.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::TransportError(_))
    }

    /// Authoritative rejection that must never be retried on another transport.
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_)
                | Self::MarginError(_)
                | Self::PositionModeError(_)
                | Self::GenericClientError(_)
                | Self::ApiError { .. }
        )
    }
}
