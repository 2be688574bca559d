mod cli;

use crate::cli::{CacheBackendArg, LogFormatArg, StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use rotator_cache::{MokaCacheConfig, MokaLinkCache, RedisCacheConfig, RedisLinkCache};
use rotator_core::{LinkCache, Repository};
use rotator_gateway::{App, AppState};
use rotator_generator::RandomGenerator;
use rotator_redirector::{RedirectorConfig, RedirectorService};
use rotator_shortener::{ShortenerConfig, ShortenerService};
use rotator_storage::{InMemoryRepository, MySqlRepository};
use rotator_tasks::{TaskRunner, TaskRunnerConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format)?;

    info!(
        listen_addr = %config.listen_addr,
        public_base_url = %config.public_base_url,
        storage_backend = %config.storage,
        cache_backend = %config.cache,
        "starting rotator gateway"
    );

    let tasks = TaskRunner::start(
        TaskRunnerConfig::builder()
            .workers(config.workers())
            .queue_capacity(config.task_queue_capacity)
            .task_timeout(config.task_timeout())
            .build(),
    );

    let served = match config.storage {
        StorageBackendArg::InMemory => {
            with_cache(&config, InMemoryRepository::new(), tasks.clone()).await
        }
        StorageBackendArg::Mysql => {
            let dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let repository = MySqlRepository::connect(dsn)
                .await
                .context("failed to connect to mysql")?;
            repository
                .init_schema()
                .await
                .context("failed to apply mysql schema")?;
            with_cache(&config, repository, tasks.clone()).await
        }
    };

    // Let already accepted hit counts and cache writes finish.
    tasks.shutdown().await;
    info!("rotator gateway stopped");

    served
}

fn init_tracing(format: LogFormatArg) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormatArg::Json => tracing::subscriber::set_global_default(builder.json().finish()),
        LogFormatArg::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish()),
    }
    .context("failed to install tracing subscriber")?;

    LogTracer::init().context("failed to forward log records to tracing")?;
    Ok(())
}

async fn with_cache<R: Repository + Clone>(
    config: &CLI,
    repository: R,
    tasks: TaskRunner,
) -> anyhow::Result<()> {
    match config.cache {
        CacheBackendArg::InMemory => {
            let cache = MokaLinkCache::with_config(
                MokaCacheConfig::builder().ttl(config.cache_ttl()).build(),
            );
            serve(config, repository, cache, tasks).await
        }
        CacheBackendArg::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .context("redis url is required when cache backend is redis")?;
            let cache = RedisLinkCache::connect(
                url,
                RedisCacheConfig::builder()
                    .key_prefix(config.cache_key_prefix.as_str())
                    .ttl(config.cache_ttl())
                    .build(),
            )
            .await
            .context("failed to connect to redis")?;
            serve(config, repository, cache, tasks).await
        }
    }
}

async fn serve<R, C>(config: &CLI, repository: R, cache: C, tasks: TaskRunner) -> anyhow::Result<()>
where
    R: Repository + Clone,
    C: LinkCache + Clone,
{
    let shortener = ShortenerService::with_config(
        repository.clone(),
        cache.clone(),
        RandomGenerator::new(),
        tasks.clone(),
        ShortenerConfig::builder()
            .timeout(config.request_timeout())
            .build(),
    );
    let redirector = RedirectorService::with_config(
        repository,
        cache,
        tasks,
        RedirectorConfig::builder()
            .timeout(config.request_timeout())
            .build(),
    );

    let state = AppState::new(
        Arc::new(shortener),
        Arc::new(redirector),
        config.public_base_url.clone(),
    )
    .with_max_urls(config.max_urls_per_request);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(listen_addr = %listener.local_addr()?, "serving http");

    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "failed to listen for shutdown signal, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
