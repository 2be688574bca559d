use crate::error::StorageError;
use crate::record::{LinkId, LinkRecord, NewShortCode, ShortCodeRecord};
use crate::shortcode::ShortCode;
use async_trait::async_trait;

/// Result type for durable store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// The durable store: source of truth for short codes and their links.
///
/// "No rows" is always reported as `None` or an empty vector, never as an
/// error, so callers can tell a missing code apart from a failing backend.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Persists a short code and one link per destination URL.
    ///
    /// Both writes happen in one transaction: either the code and all of its
    /// links become visible, or nothing does. Returns
    /// `Err(StorageError::Conflict)` if the code is already taken.
    async fn save_short_code_with_links(
        &self,
        short_code: NewShortCode,
        urls: &[String],
    ) -> Result<(ShortCodeRecord, Vec<LinkRecord>)>;

    /// Retrieves the short code record. Returns `None` if it does not exist.
    async fn get_short_code(&self, code: &ShortCode) -> Result<Option<ShortCodeRecord>>;

    /// Retrieves every link of a short code. Returns an empty vector if
    /// there are none.
    async fn get_links(&self, code: &ShortCode) -> Result<Vec<LinkRecord>>;

    /// Increments the hit counter of a short code by one.
    async fn update_short_code_hit(&self, code: &ShortCode) -> Result<()>;

    /// Increments the hit counter of a link by one.
    async fn update_link_hit(&self, link_id: LinkId) -> Result<()>;
}
