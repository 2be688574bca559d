use crate::Result;
use async_trait::async_trait;
use rotator_core::ShortCode;

#[async_trait]
pub trait Redirector: Send + Sync + 'static {
    /// Resolves a short code to the destination URL picked for this request.
    async fn resolve(&self, code: &ShortCode) -> Result<String>;
}
