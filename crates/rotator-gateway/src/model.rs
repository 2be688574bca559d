use jiff::Timestamp;
use rotator_core::Strategy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    #[serde(default)]
    pub urls: Vec<String>,
    /// Required, but checked by validation so a missing field answers with
    /// the regular error body.
    #[serde(default)]
    pub strategy: Option<String>,
}

/// Envelope of every successful API answer.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub error: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { error: false, data }
    }
}

#[derive(Debug, Serialize)]
pub struct ShortenResponse {
    pub url: String,
    pub strategy: Strategy,
    pub created_at: Timestamp,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
