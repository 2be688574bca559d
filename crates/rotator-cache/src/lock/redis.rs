use super::LockBackend;
use async_trait::async_trait;
use rotator_core::LockError;
use std::time::Duration;
use tracing::warn;

/// Deletes the key only when it still carries the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Lock backend shared by every instance talking to the same Redis.
///
/// Holds are plain keys set with `SET NX PX`, so a crashed holder frees the
/// key once the ttl passes.
#[derive(Debug, Clone)]
pub struct RedisLockBackend {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisLockBackend {
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl LockBackend for RedisLockBackend {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(key, error = %e, "Redis error on lock acquire");
                LockError::Backend(format!("failed to set lock key '{key}': {e}"))
            })?;

        Ok(reply.is_some())
    }

    async fn release(&self, key: &str, token: &str) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(RELEASE_SCRIPT);

        let removed: i64 = script
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(key, error = %e, "Redis error on lock release");
                LockError::Backend(format!("failed to release lock key '{key}': {e}"))
            })?;

        Ok(removed == 1)
    }
}
