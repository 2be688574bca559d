use crate::codec::{self, FIELD_TOTAL_HIT, FIELD_UPDATED_AT};
use crate::keys::{KeySpace, DEFAULT_KEY_PREFIX};
use crate::lock::{DistributedLock, LockOptions, RedisLockBackend};
use crate::DEFAULT_CACHE_TTL;
use async_trait::async_trait;
use jiff::Timestamp;
use redis::AsyncCommands;
use rotator_core::cache::Result;
use rotator_core::{CacheError, LinkCache, LinkId, LinkRecord, ShortCode, ShortCodeRecord};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

/// Keys requested per `SCAN` page.
const SCAN_PAGE_SIZE: usize = 100;

/// Increments a counter field only when the hash is still there.
const INCR_EXISTING_SCRIPT: &str = r#"
if redis.call("exists", KEYS[1]) == 1 then
    redis.call("hincrby", KEYS[1], ARGV[1], 1)
    redis.call("hset", KEYS[1], ARGV[2], ARGV[3])
    return 1
else
    return 0
end
"#;

#[derive(Debug, Clone, TypedBuilder)]
pub struct RedisCacheConfig {
    #[builder(default = DEFAULT_KEY_PREFIX.to_string(), setter(into))]
    pub key_prefix: String,
    #[builder(default = DEFAULT_CACHE_TTL)]
    pub ttl: Duration,
    #[builder(default)]
    pub lock: LockOptions,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A Redis-based implementation of [`LinkCache`].
///
/// Records are stored as flat hashes, one per short code and one per link,
/// all under a configurable key prefix. Counter increments take a per-key
/// lock held in the same Redis, so they are safe across instances.
#[derive(Debug, Clone)]
pub struct RedisLinkCache {
    conn: redis::aio::MultiplexedConnection,
    keys: KeySpace,
    ttl_secs: i64,
    lock: DistributedLock<RedisLockBackend>,
    lock_options: LockOptions,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("timed out") {
        CacheError::Timeout(message)
    } else if err.is_connection_refusal() {
        CacheError::Unavailable(message)
    } else {
        CacheError::Operation(message)
    }
}

impl RedisLinkCache {
    /// Creates a new Redis link cache with the default configuration.
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_config(conn, RedisCacheConfig::default())
    }

    pub fn with_config(conn: redis::aio::MultiplexedConnection, config: RedisCacheConfig) -> Self {
        let ttl_secs = i64::try_from(config.ttl.as_secs()).unwrap_or(i64::MAX).max(1);
        Self {
            lock: DistributedLock::new(RedisLockBackend::new(conn.clone())),
            conn,
            keys: KeySpace::new(config.key_prefix),
            ttl_secs,
            lock_options: config.lock,
        }
    }

    /// Connects to `url` and builds a cache on a multiplexed connection.
    pub async fn connect(url: &str, config: RedisCacheConfig) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Initialization(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        Ok(Self::with_config(conn, config))
    }

    /// Bumps `total_hit` of an existing hash and stamps `updated_at`.
    ///
    /// The existence check and the writes run as one script, so a hash that
    /// expires in between is left alone instead of coming back partial.
    async fn incr_existing(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();

        let applied: i64 = redis::Script::new(INCR_EXISTING_SCRIPT)
            .key(key)
            .arg(FIELD_TOTAL_HIT)
            .arg(FIELD_UPDATED_AT)
            .arg(Timestamp::now().to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("failed to increment counter in Redis", e))?;

        Ok(applied == 1)
    }

    /// Collects every key matching `pattern`, following the cursor until it
    /// wraps back to zero.
    async fn scan_all(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, page): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_PAGE_SIZE)
                .query_async(&mut conn)
                .await
                .map_err(|e| map_redis_error("failed to scan keys in Redis", e))?;

            keys.extend(page);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may return a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }
}

#[async_trait]
impl LinkCache for RedisLinkCache {
    async fn get_short_code(&self, code: &ShortCode) -> Result<Option<ShortCodeRecord>> {
        let key = self.keys.short_code(code);
        trace!(code = %code, "Fetching short code from Redis cache");

        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(&key).await.map_err(|e| {
            warn!(code = %code, error = %e, "Redis error on get");
            map_redis_error("failed to fetch short code from Redis", e)
        })?;

        match codec::short_code_from_fields(&fields) {
            Ok(Some(record)) => {
                debug!(code = %code, "Cache hit in Redis");
                Ok(Some(record))
            }
            Ok(None) => {
                trace!(code = %code, "Cache miss in Redis");
                Ok(None)
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Failed to decode cached short code");
                Err(e)
            }
        }
    }

    async fn save_short_code(&self, record: &ShortCodeRecord) -> Result<()> {
        let key = self.keys.short_code(&record.code);
        trace!(code = %record.code, "Storing short code in Redis cache");

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(&key, &codec::short_code_fields(record))
            .ignore()
            .expire(&key, self.ttl_secs)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(code = %record.code, error = %e, "Failed to cache short code in Redis");
                map_redis_error("failed to write short code to Redis", e)
            })?;

        debug!(code = %record.code, "Cached short code in Redis");
        Ok(())
    }

    async fn incr_short_code(&self, code: &ShortCode) -> Result<()> {
        let key = self.keys.short_code(code);
        let lock_key = self.keys.short_code_lock(code);

        let applied = self
            .lock
            .with_lock(&lock_key, &self.lock_options, || self.incr_existing(&key))
            .await?;

        if applied {
            trace!(code = %code, "Incremented cached short code hits");
        } else {
            debug!(code = %code, "Short code not cached, skipping increment");
        }
        Ok(())
    }

    async fn get_links(&self, code: &ShortCode) -> Result<Vec<LinkRecord>> {
        trace!(code = %code, "Fetching links from Redis cache");

        let keys = self.scan_all(&self.keys.links_pattern(code)).await?;
        if keys.is_empty() {
            trace!(code = %code, "Cache miss in Redis");
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for key in &keys {
            pipe.hgetall(key);
        }

        let mut conn = self.conn.clone();
        let hashes: Vec<HashMap<String, String>> =
            pipe.query_async(&mut conn).await.map_err(|e| {
                warn!(code = %code, error = %e, "Redis error on get");
                map_redis_error("failed to fetch links from Redis", e)
            })?;

        let mut links = Vec::with_capacity(hashes.len());
        for fields in &hashes {
            match codec::link_from_fields(fields) {
                Ok(Some(link)) => links.push(link),
                Ok(None) => {}
                Err(e) => {
                    warn!(code = %code, error = %e, "Failed to decode cached link");
                    return Err(e);
                }
            }
        }

        debug!(code = %code, count = links.len(), "Cache hit in Redis");
        Ok(links)
    }

    async fn save_links(&self, links: &[LinkRecord]) -> Result<()> {
        if links.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for link in links {
            let key = self.keys.link(&link.code, link.id);
            pipe.hset_multiple(&key, &codec::link_fields(link))
                .ignore()
                .expire(&key, self.ttl_secs)
                .ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await.map_err(|e| {
            warn!(count = links.len(), error = %e, "Failed to cache links in Redis");
            map_redis_error("failed to write links to Redis", e)
        })?;

        debug!(count = links.len(), "Cached links in Redis");
        Ok(())
    }

    async fn incr_link(&self, code: &ShortCode, link_id: LinkId) -> Result<()> {
        let key = self.keys.link(code, link_id);
        let lock_key = self.keys.link_lock(code, link_id);

        let applied = self
            .lock
            .with_lock(&lock_key, &self.lock_options, || self.incr_existing(&key))
            .await?;

        if applied {
            trace!(code = %code, link_id, "Incremented cached link hits");
        } else {
            debug!(code = %code, link_id, "Link not cached, skipping increment");
        }
        Ok(())
    }
}
