use crate::error::ShortenerError;
use crate::record::ShortCodeRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, ShortenerError>;

/// Parameters for creating a rotating short link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenParams {
    /// Candidate destinations, in request order. Must not be empty.
    pub urls: Vec<String>,
    /// Strategy name as supplied by the caller (`RR`, `RNDM`, any case).
    /// Unknown names fall back to round-robin.
    pub strategy: String,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Persists a new short code with its links and returns the stored record.
    async fn shorten(&self, params: ShortenParams) -> Result<ShortCodeRecord>;
}
