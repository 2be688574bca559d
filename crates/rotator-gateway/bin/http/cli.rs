use clap::{Parser, ValueEnum};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "ROTATOR_LISTEN_ADDR";
pub const PUBLIC_BASE_URL_ENV: &str = "ROTATOR_PUBLIC_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "ROTATOR_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "ROTATOR_MYSQL_DSN";
pub const CACHE_BACKEND_ENV: &str = "ROTATOR_CACHE_BACKEND";
pub const REDIS_URL_ENV: &str = "ROTATOR_REDIS_URL";
pub const CACHE_KEY_PREFIX_ENV: &str = "ROTATOR_CACHE_KEY_PREFIX";
pub const CACHE_TTL_SECS_ENV: &str = "ROTATOR_CACHE_TTL_SECS";
pub const WORKER_POOL_SIZE_ENV: &str = "ROTATOR_WORKER_POOL_SIZE";
pub const TASK_QUEUE_CAPACITY_ENV: &str = "ROTATOR_TASK_QUEUE_CAPACITY";
pub const TASK_TIMEOUT_MS_ENV: &str = "ROTATOR_TASK_TIMEOUT_MS";
pub const REQUEST_TIMEOUT_MS_ENV: &str = "ROTATOR_REQUEST_TIMEOUT_MS";
pub const MAX_URLS_PER_REQUEST_ENV: &str = "ROTATOR_MAX_URLS_PER_REQUEST";
pub const LOG_FORMAT_ENV: &str = "ROTATOR_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_CACHE_KEY_PREFIX: &str = "rot:";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for CacheBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendArg::InMemory => write!(f, "in-memory"),
            CacheBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    #[value(name = "json")]
    Json,
    #[value(name = "pretty")]
    Pretty,
}

#[derive(Debug, Parser)]
#[command(name = "rotator", about = "Rotating short link service")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Base the created short links are published under.
    #[arg(long, env = PUBLIC_BASE_URL_ENV, default_value = DEFAULT_PUBLIC_BASE_URL)]
    pub public_base_url: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(
        long,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = CacheBackendArg::InMemory
    )]
    pub cache: CacheBackendArg,

    #[arg(long, env = REDIS_URL_ENV, required_if_eq("cache", "redis"))]
    pub redis_url: Option<String>,

    #[arg(long, env = CACHE_KEY_PREFIX_ENV, default_value = DEFAULT_CACHE_KEY_PREFIX)]
    pub cache_key_prefix: String,

    #[arg(long, env = CACHE_TTL_SECS_ENV, default_value_t = DEFAULT_CACHE_TTL_SECS)]
    pub cache_ttl_secs: u64,

    /// Background workers. Values below one fall back to the default.
    #[arg(
        long,
        env = WORKER_POOL_SIZE_ENV,
        default_value_t = 10,
        allow_negative_numbers = true
    )]
    pub worker_pool_size: i64,

    #[arg(long, env = TASK_QUEUE_CAPACITY_ENV, default_value_t = 1024)]
    pub task_queue_capacity: usize,

    #[arg(long, env = TASK_TIMEOUT_MS_ENV, default_value_t = 10_000)]
    pub task_timeout_ms: u64,

    #[arg(long, env = REQUEST_TIMEOUT_MS_ENV, default_value_t = 10_000)]
    pub request_timeout_ms: u64,

    #[arg(long, env = MAX_URLS_PER_REQUEST_ENV, default_value_t = 100)]
    pub max_urls_per_request: usize,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Pretty
    )]
    pub log_format: LogFormatArg,
}

impl CLI {
    /// Pool size handed to the task runner; zero makes it use its default.
    pub fn workers(&self) -> usize {
        usize::try_from(self.worker_pool_size).unwrap_or(0)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
