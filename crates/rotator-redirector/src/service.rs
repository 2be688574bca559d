use crate::redirector::Redirector;
use crate::selection::select_link;
use crate::{RedirectorError, Result};
use async_trait::async_trait;
use rotator_core::{LinkCache, LinkId, LinkRecord, Repository, ShortCode, ShortCodeRecord};
use rotator_tasks::TaskRunner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};
use typed_builder::TypedBuilder;

/// Budget for the synchronous part of a resolution.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, TypedBuilder)]
pub struct RedirectorConfig {
    #[builder(default = DEFAULT_RESOLVE_TIMEOUT)]
    pub timeout: Duration,
}

impl Default for RedirectorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Service for handling redirects.
///
/// Reads are cache-aside: the fast cache is asked first and any miss or
/// cache failure falls back to the durable store. Only durable failures
/// reach the caller. Cache population and hit counting are queued on the
/// task runner and never delay or fail a resolution.
#[derive(Debug, Clone)]
pub struct RedirectorService<R, C> {
    repository: Arc<R>,
    cache: Arc<C>,
    tasks: TaskRunner,
    config: RedirectorConfig,
}

impl<R: Repository, C: LinkCache> RedirectorService<R, C> {
    pub fn new(repository: R, cache: C, tasks: TaskRunner) -> Self {
        Self::with_config(repository, cache, tasks, RedirectorConfig::default())
    }

    pub fn with_config(repository: R, cache: C, tasks: TaskRunner, config: RedirectorConfig) -> Self {
        Self {
            repository: Arc::new(repository),
            cache: Arc::new(cache),
            tasks,
            config,
        }
    }

    async fn lookup(&self, code: &ShortCode) -> Result<String> {
        let short_code = self.short_code(code).await?;
        let links = self.links(code).await?;

        let Some(link) = select_link(short_code.strategy, links) else {
            return Err(RedirectorError::NotFound(code.to_string()));
        };

        debug!(
            code = %code,
            link_id = link.id,
            strategy = %short_code.strategy,
            url = %link.original,
            "Resolved short code"
        );
        self.record_hit(code.clone(), link.id);
        Ok(link.original)
    }

    async fn short_code(&self, code: &ShortCode) -> Result<ShortCodeRecord> {
        match self.cache.get_short_code(code).await {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => trace!(code = %code, "Short code not cached"),
            Err(e) => warn!(code = %code, error = %e, "Cache read failed, using durable store"),
        }

        match self.repository.get_short_code(code).await {
            Ok(Some(record)) => {
                self.populate_short_code(record.clone());
                Ok(record)
            }
            Ok(None) => {
                trace!(code = %code, "Short code not found");
                Err(RedirectorError::NotFound(code.to_string()))
            }
            Err(e) => {
                error!(code = %code, error = %e, "Failed to load short code");
                Err(RedirectorError::Internal(e.to_string()))
            }
        }
    }

    async fn links(&self, code: &ShortCode) -> Result<Vec<LinkRecord>> {
        match self.cache.get_links(code).await {
            Ok(links) if !links.is_empty() => return Ok(links),
            Ok(_) => trace!(code = %code, "Links not cached"),
            Err(e) => warn!(code = %code, error = %e, "Cache read failed, using durable store"),
        }

        match self.repository.get_links(code).await {
            Ok(links) if links.is_empty() => {
                trace!(code = %code, "Short code has no links");
                Err(RedirectorError::NotFound(code.to_string()))
            }
            Ok(links) => {
                self.populate_links(links.clone());
                Ok(links)
            }
            Err(e) => {
                error!(code = %code, error = %e, "Failed to load links");
                Err(RedirectorError::Internal(e.to_string()))
            }
        }
    }

    fn populate_short_code(&self, record: ShortCodeRecord) {
        let cache = Arc::clone(&self.cache);
        self.tasks.submit("populate-short-code", async move {
            if let Err(e) = cache.save_short_code(&record).await {
                warn!(code = %record.code, error = %e, "Failed to populate short code cache");
            }
        });
    }

    fn populate_links(&self, links: Vec<LinkRecord>) {
        let cache = Arc::clone(&self.cache);
        self.tasks.submit("populate-links", async move {
            if let Err(e) = cache.save_links(&links).await {
                let code = links.first().map(|l| l.code.to_string()).unwrap_or_default();
                warn!(code = %code, error = %e, "Failed to populate links cache");
            }
        });
    }

    /// Propagates one hit to both stores. Every step runs even if an
    /// earlier one failed; failures only leave the counters behind.
    fn record_hit(&self, code: ShortCode, link_id: LinkId) {
        let repository = Arc::clone(&self.repository);
        let cache = Arc::clone(&self.cache);

        self.tasks.submit("record-hit", async move {
            if let Err(e) = repository.update_link_hit(link_id).await {
                warn!(code = %code, link_id, operation = "update_link_hit", error = %e, "Failed to record hit");
            }
            if let Err(e) = repository.update_short_code_hit(&code).await {
                warn!(code = %code, link_id, operation = "update_short_code_hit", error = %e, "Failed to record hit");
            }
            if let Err(e) = cache.incr_short_code(&code).await {
                warn!(code = %code, link_id, operation = "incr_short_code", error = %e, "Failed to record hit");
            }
            if let Err(e) = cache.incr_link(&code, link_id).await {
                warn!(code = %code, link_id, operation = "incr_link", error = %e, "Failed to record hit");
            }
        });
    }
}

#[async_trait]
impl<R: Repository, C: LinkCache> Redirector for RedirectorService<R, C> {
    async fn resolve(&self, code: &ShortCode) -> Result<String> {
        trace!(code = %code, "resolving short code");

        match tokio::time::timeout(self.config.timeout, self.lookup(code)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    code = %code,
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Resolution timed out"
                );
                Err(RedirectorError::Internal(format!(
                    "resolving '{code}' timed out"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::Timestamp;
    use rotator_cache::MokaLinkCache;
    use rotator_core::{CacheError, NewShortCode, StorageError, Strategy};
    use rotator_storage::{FaultyRepository, InMemoryRepository, RepositoryOp};
    use rotator_tasks::TaskRunnerConfig;
    use std::collections::HashSet;

    /// A cache whose every call fails.
    #[derive(Debug, Clone)]
    struct BrokenCache;

    #[async_trait]
    impl LinkCache for BrokenCache {
        async fn get_short_code(
            &self,
            _code: &ShortCode,
        ) -> rotator_core::cache::Result<Option<ShortCodeRecord>> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn save_short_code(&self, _record: &ShortCodeRecord) -> rotator_core::cache::Result<()> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn incr_short_code(&self, _code: &ShortCode) -> rotator_core::cache::Result<()> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn get_links(&self, _code: &ShortCode) -> rotator_core::cache::Result<Vec<LinkRecord>> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn save_links(&self, _links: &[LinkRecord]) -> rotator_core::cache::Result<()> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn incr_link(&self, _code: &ShortCode, _link_id: LinkId) -> rotator_core::cache::Result<()> {
            Err(CacheError::Unavailable("down".to_string()))
        }
    }

    /// A durable store that never answers a short code lookup.
    #[derive(Debug, Clone)]
    struct StalledRepository;

    #[async_trait]
    impl Repository for StalledRepository {
        async fn save_short_code_with_links(
            &self,
            _short_code: NewShortCode,
            _urls: &[String],
        ) -> rotator_core::repository::Result<(ShortCodeRecord, Vec<LinkRecord>)> {
            Err(StorageError::Operation("read only".to_string()))
        }

        async fn get_short_code(
            &self,
            _code: &ShortCode,
        ) -> rotator_core::repository::Result<Option<ShortCodeRecord>> {
            std::future::pending().await
        }

        async fn get_links(&self, _code: &ShortCode) -> rotator_core::repository::Result<Vec<LinkRecord>> {
            Ok(Vec::new())
        }

        async fn update_short_code_hit(&self, _code: &ShortCode) -> rotator_core::repository::Result<()> {
            Ok(())
        }

        async fn update_link_hit(&self, _link_id: LinkId) -> rotator_core::repository::Result<()> {
            Ok(())
        }
    }

    fn runner() -> TaskRunner {
        TaskRunner::start(TaskRunnerConfig::default())
    }

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    async fn seed(repo: &impl Repository, c: &str, strategy: Strategy, urls: &[&str]) -> Vec<LinkRecord> {
        let urls: Vec<String> = urls.iter().map(|u| u.to_string()).collect();
        let (_, links) = repo
            .save_short_code_with_links(NewShortCode { code: code(c), strategy }, &urls)
            .await
            .unwrap();
        links
    }

    fn cached_short_code(c: &str, strategy: Strategy) -> ShortCodeRecord {
        let now = Timestamp::now();
        ShortCodeRecord {
            id: 1,
            code: code(c),
            total_hit: 0,
            strategy,
            created_at: now,
            updated_at: now,
        }
    }

    fn cached_links(c: &str, hits: &[u64]) -> Vec<LinkRecord> {
        let now = Timestamp::now();
        hits.iter()
            .enumerate()
            .map(|(i, &total_hit)| LinkRecord {
                id: i as u64 + 1,
                code: code(c),
                original: format!("https://{i}.example"),
                total_hit,
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    #[tokio::test]
    async fn resolves_to_a_persisted_destination() {
        let repo = InMemoryRepository::new();
        seed(&repo, "abc123", Strategy::Random, &["https://a.test", "https://b.test"]).await;
        let service = RedirectorService::new(repo, MokaLinkCache::new(), runner());

        let url = service.resolve(&code("abc123")).await.unwrap();
        assert!(url == "https://a.test" || url == "https://b.test");
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let service = RedirectorService::new(InMemoryRepository::new(), MokaLinkCache::new(), runner());

        let err = service.resolve(&code("missing")).await.unwrap_err();
        assert!(matches!(err, RedirectorError::NotFound(_)));
    }

    #[tokio::test]
    async fn code_without_links_is_not_found() {
        let cache = MokaLinkCache::new();
        cache
            .save_short_code(&cached_short_code("lonely", Strategy::RoundRobin))
            .await
            .unwrap();
        let service = RedirectorService::new(InMemoryRepository::new(), cache, runner());

        let err = service.resolve(&code("lonely")).await.unwrap_err();
        assert!(matches!(err, RedirectorError::NotFound(_)));
    }

    #[tokio::test]
    async fn round_robin_picks_among_least_hit() {
        let cache = MokaLinkCache::new();
        cache
            .save_short_code(&cached_short_code("abc123", Strategy::RoundRobin))
            .await
            .unwrap();
        cache.save_links(&cached_links("abc123", &[5, 2, 2, 9])).await.unwrap();
        let service = RedirectorService::new(InMemoryRepository::new(), cache, runner());

        let url = service.resolve(&code("abc123")).await.unwrap();
        assert!(url == "https://1.example" || url == "https://2.example");
    }

    #[tokio::test]
    async fn cache_hit_does_not_need_durable_reads() {
        let repo = FaultyRepository::new(InMemoryRepository::new());
        repo.fail(RepositoryOp::GetShortCode);
        repo.fail(RepositoryOp::GetLinks);
        let cache = MokaLinkCache::new();
        cache
            .save_short_code(&cached_short_code("abc123", Strategy::Random))
            .await
            .unwrap();
        cache.save_links(&cached_links("abc123", &[0, 0])).await.unwrap();
        let service = RedirectorService::new(repo, cache, runner());

        let url = service.resolve(&code("abc123")).await.unwrap();
        assert!(url == "https://0.example" || url == "https://1.example");
    }

    #[tokio::test]
    async fn broken_cache_falls_back_to_durable_store() {
        let repo = InMemoryRepository::new();
        seed(&repo, "abc123", Strategy::RoundRobin, &["https://a.test"]).await;
        let service = RedirectorService::new(repo, BrokenCache, runner());

        assert_eq!(service.resolve(&code("abc123")).await.unwrap(), "https://a.test");
    }

    #[tokio::test]
    async fn durable_failure_is_internal() {
        let repo = FaultyRepository::new(InMemoryRepository::new());
        seed(&repo, "abc123", Strategy::RoundRobin, &["https://a.test"]).await;
        repo.fail(RepositoryOp::GetLinks);
        let service = RedirectorService::new(repo, MokaLinkCache::new(), runner());

        let err = service.resolve(&code("abc123")).await.unwrap_err();
        assert!(matches!(err, RedirectorError::Internal(_)));
    }

    #[tokio::test]
    async fn stalled_store_times_out_as_internal() {
        let config = RedirectorConfig::builder()
            .timeout(Duration::from_millis(50))
            .build();
        let service =
            RedirectorService::with_config(StalledRepository, MokaLinkCache::new(), runner(), config);

        let err = service.resolve(&code("abc123")).await.unwrap_err();
        assert!(matches!(err, RedirectorError::Internal(_)));
    }

    // Polling sleeps the test thread, so the workers need their own.
    #[tokio::test(flavor = "multi_thread")]
    async fn durable_hit_populates_cache_in_background() {
        let repo = InMemoryRepository::new();
        seed(&repo, "abc123", Strategy::RoundRobin, &["https://a.test", "https://b.test"]).await;
        let cache = MokaLinkCache::new();
        let service = RedirectorService::new(repo, cache.clone(), runner());

        service.resolve(&code("abc123")).await.unwrap();

        awaitility::at_most(Duration::from_secs(5))
            .poll_interval(Duration::from_millis(20))
            .until_async(|| async {
                let short_code = cache.get_short_code(&code("abc123")).await.unwrap();
                let links = cache.get_links(&code("abc123")).await.unwrap();
                short_code.is_some() && links.len() == 2
            })
            .await;
    }

    #[tokio::test]
    async fn hit_is_recorded_in_both_stores() {
        let repo = InMemoryRepository::new();
        let links = seed(&repo, "abc123", Strategy::RoundRobin, &["https://a.test"]).await;
        let cache = MokaLinkCache::new();
        cache
            .save_short_code(&cached_short_code("abc123", Strategy::RoundRobin))
            .await
            .unwrap();
        cache.save_links(&links).await.unwrap();
        let tasks = runner();
        let service = RedirectorService::new(repo.clone(), cache.clone(), tasks.clone());

        service.resolve(&code("abc123")).await.unwrap();
        tasks.shutdown().await;

        let durable = repo.get_links(&code("abc123")).await.unwrap();
        assert_eq!(durable[0].total_hit, 1);
        let durable_code = repo.get_short_code(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(durable_code.total_hit, 1);

        let cached = cache.get_links(&code("abc123")).await.unwrap();
        assert_eq!(cached[0].total_hit, 1);
        let cached_code = cache.get_short_code(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(cached_code.total_hit, 1);
    }

    #[tokio::test]
    async fn failed_hit_step_does_not_stop_the_rest() {
        let repo = FaultyRepository::new(InMemoryRepository::new());
        seed(&repo, "abc123", Strategy::RoundRobin, &["https://a.test"]).await;
        repo.fail(RepositoryOp::UpdateLinkHit);
        let tasks = runner();
        let service = RedirectorService::new(repo.clone(), MokaLinkCache::new(), tasks.clone());

        service.resolve(&code("abc123")).await.unwrap();
        tasks.shutdown().await;

        let links = repo.inner().get_links(&code("abc123")).await.unwrap();
        assert_eq!(links[0].total_hit, 0);
        let record = repo.inner().get_short_code(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(record.total_hit, 1);
    }

    #[tokio::test]
    async fn round_robin_rotates_as_hits_accumulate() {
        let repo = InMemoryRepository::new();
        seed(
            &repo,
            "abc123",
            Strategy::RoundRobin,
            &["https://a.test", "https://b.test", "https://c.test"],
        )
        .await;

        let mut seen = HashSet::new();
        for _ in 0..3 {
            // A fresh runner per round so each hit lands before the next read.
            let tasks = runner();
            let service = RedirectorService::new(repo.clone(), MokaLinkCache::new(), tasks.clone());
            seen.insert(service.resolve(&code("abc123")).await.unwrap());
            tasks.shutdown().await;
        }

        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn rejected_background_work_does_not_fail_resolution() {
        let repo = InMemoryRepository::new();
        seed(&repo, "abc123", Strategy::RoundRobin, &["https://a.test"]).await;
        let tasks = runner();
        tasks.shutdown().await;
        let service = RedirectorService::new(repo, MokaLinkCache::new(), tasks);

        assert_eq!(service.resolve(&code("abc123")).await.unwrap(), "https://a.test");
    }
}
