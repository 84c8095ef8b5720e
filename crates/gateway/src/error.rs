//! Gateway error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Broker (publish or consume) error.
    #[error("broker error: {0}")]
    Broker(#[from] kafka_client::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Token missing, malformed, or expired.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
