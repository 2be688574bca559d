use thiserror::Error;

/// Errors raised while validating core domain values.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("unknown strategy tag: {0}")]
    InvalidStrategy(String),
}

/// Failure to take a per-key lock.
#[derive(Debug, Clone, Error)]
pub enum LockError {
    #[error("lock '{key}' not acquired after {attempts} attempts")]
    Timeout { key: String, attempts: u32 },
    #[error("lock backend failed: {0}")]
    Backend(String),
}

/// Errors from the fast cache. These never cross the engine boundary:
/// reads degrade to misses, writes and increments are logged and dropped.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out: {0}")]
    Timeout(String),
    #[error("cache serialization failed: {0}")]
    Serialization(String),
    #[error("cache value is invalid: {0}")]
    InvalidData(String),
    #[error("cache initialization failed: {0}")]
    Initialization(String),
    #[error("cache operation failed: {0}")]
    Operation(String),
    #[error("cache lock: {0}")]
    Lock(#[from] LockError),
}

/// Errors from the durable store.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("short code already exists: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

/// Errors returned by the creation engine.
#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        ShortenerError::Internal(value.to_string())
    }
}
