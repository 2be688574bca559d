use async_trait::async_trait;
use rotator_core::{
    LinkCache, LinkRecord, NewShortCode, Repository, ShortCode, ShortCodeRecord, ShortenParams,
    Shortener, ShortenerError, StorageError, Strategy,
};
use rotator_generator::Generator;
use rotator_tasks::TaskRunner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

/// Budget for the synchronous part of a creation.
pub const DEFAULT_SHORTEN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerConfig {
    #[builder(default = DEFAULT_SHORTEN_TIMEOUT)]
    pub timeout: Duration,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A concrete implementation of the `Shortener` trait.
///
/// Generates a code, persists it together with one link per destination
/// in a single durable write, then hands cache population to the task
/// runner. The caller gets its answer as soon as the durable write
/// commits.
///
/// Generated codes are not retried on collision: a taken code fails the
/// write and the creation with it.
#[derive(Debug, Clone)]
pub struct ShortenerService<R, C, G> {
    repository: Arc<R>,
    cache: Arc<C>,
    generator: Arc<G>,
    tasks: TaskRunner,
    config: ShortenerConfig,
}

impl<R: Repository, C: LinkCache, G: Generator> ShortenerService<R, C, G> {
    pub fn new(repository: R, cache: C, generator: G, tasks: TaskRunner) -> Self {
        Self::with_config(repository, cache, generator, tasks, ShortenerConfig::default())
    }

    pub fn with_config(
        repository: R,
        cache: C,
        generator: G,
        tasks: TaskRunner,
        config: ShortenerConfig,
    ) -> Self {
        Self {
            repository: Arc::new(repository),
            cache: Arc::new(cache),
            generator: Arc::new(generator),
            tasks,
            config,
        }
    }

    async fn create(&self, params: ShortenParams) -> Result<ShortCodeRecord, ShortenerError> {
        if params.urls.is_empty() {
            return Err(ShortenerError::InvalidInput(
                "at least one url is required".to_string(),
            ));
        }

        let strategy = Strategy::from_name(&params.strategy);
        let code: ShortCode = self.generator.generate().into();
        debug!(code = %code, strategy = %strategy, links = params.urls.len(), "Creating short code");

        let (record, links) = self
            .repository
            .save_short_code_with_links(NewShortCode { code, strategy }, &params.urls)
            .await
            .map_err(storage_to_shortener_error)?;

        info!(
            code = %record.code,
            strategy = %record.strategy,
            links = links.len(),
            "Short code created"
        );

        self.populate_cache(record.clone(), links);
        Ok(record)
    }

    /// Best effort: a dropped or failing population only costs one cache
    /// miss later.
    fn populate_cache(&self, record: ShortCodeRecord, links: Vec<LinkRecord>) {
        let cache = Arc::clone(&self.cache);
        self.tasks.submit("populate-created-short-code", async move {
            if let Err(e) = cache.save_short_code(&record).await {
                warn!(code = %record.code, error = %e, "Failed to cache new short code");
            }
            if let Err(e) = cache.save_links(&links).await {
                warn!(code = %record.code, error = %e, "Failed to cache new links");
            }
        });
    }
}

#[async_trait]
impl<R: Repository, C: LinkCache, G: Generator> Shortener for ShortenerService<R, C, G> {
    async fn shorten(&self, params: ShortenParams) -> Result<ShortCodeRecord, ShortenerError> {
        match tokio::time::timeout(self.config.timeout, self.create(params)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Short code creation timed out"
                );
                Err(ShortenerError::Internal(
                    "short code creation timed out".to_string(),
                ))
            }
        }
    }
}

/// Every durable failure is internal to the caller, a collision included.
fn storage_to_shortener_error(e: StorageError) -> ShortenerError {
    match &e {
        StorageError::Conflict(code) => {
            warn!(code = %code, "Generated short code collided with an existing one");
        }
        other => warn!(error = %other, "Failed to persist short code"),
    }
    ShortenerError::from(e)
}
