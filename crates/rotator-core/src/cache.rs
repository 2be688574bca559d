use crate::error::CacheError;
use crate::record::{LinkId, LinkRecord, ShortCodeRecord};
use crate::shortcode::ShortCode;
use async_trait::async_trait;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// The fast cache holding denormalized copies of short codes and links.
///
/// Implementations can use Redis, in-memory caches, or other backends.
/// Every write and increment must be applied atomically so concurrent
/// readers never observe a half-written record.
#[async_trait]
pub trait LinkCache: Send + Sync + 'static {
    /// Get a short code from cache.
    ///
    /// Returns `Ok(None)` if the key is not in the cache.
    async fn get_short_code(&self, code: &ShortCode) -> Result<Option<ShortCodeRecord>>;

    /// Store a short code, refreshing its time-to-live.
    async fn save_short_code(&self, record: &ShortCodeRecord) -> Result<()>;

    /// Increment the cached hit counter of a short code under its per-key lock.
    ///
    /// Does nothing if the short code is not cached.
    async fn incr_short_code(&self, code: &ShortCode) -> Result<()>;

    /// Get every cached link of a short code. An empty vector is a miss.
    async fn get_links(&self, code: &ShortCode) -> Result<Vec<LinkRecord>>;

    /// Store a group of links in one batch with a shared time-to-live.
    async fn save_links(&self, links: &[LinkRecord]) -> Result<()>;

    /// Increment the cached hit counter of one link under its per-key lock.
    ///
    /// Does nothing if the link is not cached.
    async fn incr_link(&self, code: &ShortCode, link_id: LinkId) -> Result<()>;
}
