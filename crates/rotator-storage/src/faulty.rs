use async_trait::async_trait;
use parking_lot::Mutex;
use rotator_core::error::StorageError;
use rotator_core::repository::{Repository, Result};
use rotator_core::{LinkId, LinkRecord, NewShortCode, ShortCode, ShortCodeRecord};
use std::collections::HashSet;
use std::sync::Arc;

/// The operations of [`Repository`], used to pick which ones fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOp {
    SaveShortCodeWithLinks,
    GetShortCode,
    GetLinks,
    UpdateShortCodeHit,
    UpdateLinkHit,
}

/// Wraps a repository and makes selected operations fail with
/// [`StorageError::Unavailable`] before they reach it.
///
/// Useful for exercising degraded paths without a real outage. Clones share
/// the set of failing operations.
#[derive(Debug, Clone)]
pub struct FaultyRepository<R> {
    inner: R,
    failing: Arc<Mutex<HashSet<RepositoryOp>>>,
}

impl<R: Repository> FaultyRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            failing: Arc::default(),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Makes `op` fail until [`heal`](Self::heal) is called.
    pub fn fail(&self, op: RepositoryOp) {
        self.failing.lock().insert(op);
    }

    pub fn heal(&self, op: RepositoryOp) {
        self.failing.lock().remove(&op);
    }

    fn check(&self, op: RepositoryOp) -> Result<()> {
        if self.failing.lock().contains(&op) {
            Err(StorageError::Unavailable(format!("injected fault on {op:?}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<R: Repository> Repository for FaultyRepository<R> {
    async fn save_short_code_with_links(
        &self,
        short_code: NewShortCode,
        urls: &[String],
    ) -> Result<(ShortCodeRecord, Vec<LinkRecord>)> {
        self.check(RepositoryOp::SaveShortCodeWithLinks)?;
        self.inner.save_short_code_with_links(short_code, urls).await
    }

    async fn get_short_code(&self, code: &ShortCode) -> Result<Option<ShortCodeRecord>> {
        self.check(RepositoryOp::GetShortCode)?;
        self.inner.get_short_code(code).await
    }

    async fn get_links(&self, code: &ShortCode) -> Result<Vec<LinkRecord>> {
        self.check(RepositoryOp::GetLinks)?;
        self.inner.get_links(code).await
    }

    async fn update_short_code_hit(&self, code: &ShortCode) -> Result<()> {
        self.check(RepositoryOp::UpdateShortCodeHit)?;
        self.inner.update_short_code_hit(code).await
    }

    async fn update_link_hit(&self, link_id: LinkId) -> Result<()> {
        self.check(RepositoryOp::UpdateLinkHit)?;
        self.inner.update_link_hit(link_id).await
    }
}
