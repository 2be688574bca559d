use thiserror::Error;

/// Result type for resolution.
pub type Result<T> = std::result::Result<T, RedirectorError>;

#[derive(Debug, Clone, Error)]
pub enum RedirectorError {
    /// No short code, or no destination, exists in any store.
    #[error("short code not found: {0}")]
    NotFound(String),
    /// The durable store failed, or resolution ran out of time.
    #[error("internal error: {0}")]
    Internal(String),
}
