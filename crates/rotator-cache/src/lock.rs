//! Per-key mutual exclusion for read-modify-write on cached counters.
//!
//! [`DistributedLock`] owns the retry loop and the overall deadline; a
//! [`LockBackend`] only knows how to take and drop a single key once.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryLockBackend;
pub use self::redis::RedisLockBackend;

use async_trait::async_trait;
use rotator_core::{CacheError, LockError};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

/// A store able to hold short-lived, token-owned keys.
#[async_trait]
pub trait LockBackend: Send + Sync + 'static {
    /// Takes `key` for `token` if nobody holds it. The hold lapses on its
    /// own after `ttl`.
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Drops `key` only if it is still held by `token`. Returns whether
    /// anything was released.
    async fn release(&self, key: &str, token: &str) -> Result<bool, LockError>;
}

/// Linear backoff between acquisition attempts: the n-th retry waits
/// `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct RetryPolicy {
    #[builder(default = Duration::from_millis(100))]
    pub base_delay: Duration,
    /// Total attempts, including the first one.
    #[builder(default = 5)]
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct LockOptions {
    /// How long a hold survives a holder that never releases it.
    #[builder(default = Duration::from_secs(5))]
    pub ttl: Duration,
    /// Hard deadline for the whole acquisition, retries included.
    #[builder(default = Duration::from_secs(5))]
    pub acquire_timeout: Duration,
    #[builder(default)]
    pub retry: RetryPolicy,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Proof of holding a key. Hand it back to [`DistributedLock::release`].
#[derive(Debug)]
pub struct Lease {
    key: String,
    token: String,
}

impl Lease {
    pub fn key(&self) -> &str {
        &self.key
    }
}

#[derive(Debug, Clone)]
pub struct DistributedLock<B> {
    backend: B,
}

impl<B: LockBackend> DistributedLock<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Acquires `key`, retrying with backoff until the attempts run out or
    /// `acquire_timeout` passes.
    pub async fn acquire(&self, key: &str, options: &LockOptions) -> Result<Lease, LockError> {
        let token = new_token();
        let mut attempts = 0u32;

        let outcome = tokio::time::timeout(options.acquire_timeout, async {
            loop {
                attempts += 1;
                if self.backend.try_acquire(key, &token, options.ttl).await? {
                    return Ok(());
                }
                if attempts >= options.retry.max_attempts {
                    return Err(LockError::Timeout {
                        key: key.to_string(),
                        attempts,
                    });
                }
                trace!(key, attempt = attempts, "lock busy, backing off");
                tokio::time::sleep(options.retry.delay_after(attempts)).await;
            }
        })
        .await;

        match outcome {
            Ok(Ok(())) => {
                trace!(key, attempts, "lock acquired");
                Ok(Lease {
                    key: key.to_string(),
                    token,
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LockError::Timeout {
                key: key.to_string(),
                attempts,
            }),
        }
    }

    pub async fn release(&self, lease: Lease) -> Result<(), LockError> {
        let released = self.backend.release(&lease.key, &lease.token).await?;
        if !released {
            // The hold outlived its ttl and may now belong to someone else.
            debug!(key = %lease.key, "lock expired before release");
        }
        Ok(())
    }

    /// Runs `f` while holding `key`. A failed release is logged and left to
    /// the ttl.
    pub async fn with_lock<T, F, Fut>(
        &self,
        key: &str,
        options: &LockOptions,
        f: F,
    ) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let lease = self.acquire(key, options).await?;
        let result = f().await;
        if let Err(e) = self.release(lease).await {
            warn!(key, error = %e, "failed to release lock");
        }
        result
    }
}

fn new_token() -> String {
    format!("{:032x}", rand::random::<u128>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_options() -> LockOptions {
        LockOptions::builder()
            .ttl(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(2))
            .retry(
                RetryPolicy::builder()
                    .base_delay(Duration::from_millis(5))
                    .max_attempts(3)
                    .build(),
            )
            .build()
    }

    #[test]
    fn default_backoff_is_linear() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay_after(1), Duration::from_millis(100));
        assert_eq!(retry.delay_after(2), Duration::from_millis(200));
        assert_eq!(retry.delay_after(3), Duration::from_millis(300));
        assert_eq!(retry.max_attempts, 5);
    }

    #[tokio::test]
    async fn acquire_then_release_frees_the_key() {
        let lock = DistributedLock::new(MemoryLockBackend::new());
        let options = fast_options();

        let lease = lock.acquire("k", &options).await.unwrap();
        assert_eq!(lease.key(), "k");
        lock.release(lease).await.unwrap();

        let again = lock.acquire("k", &options).await.unwrap();
        lock.release(again).await.unwrap();
    }

    #[tokio::test]
    async fn held_key_times_out_after_max_attempts() {
        let lock = DistributedLock::new(MemoryLockBackend::new());
        let options = fast_options();

        let _held = lock.acquire("k", &options).await.unwrap();
        let err = lock.acquire("k", &options).await.unwrap_err();
        assert!(matches!(err, LockError::Timeout { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn acquire_timeout_bounds_the_retry_loop() {
        let lock = DistributedLock::new(MemoryLockBackend::new());
        let options = LockOptions::builder()
            .acquire_timeout(Duration::from_millis(50))
            .retry(
                RetryPolicy::builder()
                    .base_delay(Duration::from_secs(1))
                    .max_attempts(10)
                    .build(),
            )
            .build();

        let _held = lock.acquire("k", &options).await.unwrap();
        let started = std::time::Instant::now();
        let err = lock.acquire("k", &options).await.unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let lock = DistributedLock::new(MemoryLockBackend::new());
        let options = fast_options();

        let a = lock.acquire("a", &options).await.unwrap();
        let b = lock.acquire("b", &options).await.unwrap();
        lock.release(a).await.unwrap();
        lock.release(b).await.unwrap();
    }

    #[tokio::test]
    async fn with_lock_serializes_critical_sections() {
        let lock = Arc::new(DistributedLock::new(MemoryLockBackend::new()));
        let options = LockOptions::builder()
            .retry(
                RetryPolicy::builder()
                    .base_delay(Duration::from_millis(1))
                    .max_attempts(1000)
                    .build(),
            )
            .build();
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            let overlaps = Arc::clone(&overlaps);
            tasks.push(tokio::spawn(async move {
                lock.with_lock("shared", &options, || async {
                    if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn with_lock_surfaces_lock_failure_as_cache_error() {
        let lock = DistributedLock::new(MemoryLockBackend::new());
        let options = fast_options();
        let _held = lock.acquire("k", &options).await.unwrap();

        let ran = AtomicUsize::new(0);
        let result = lock
            .with_lock("k", &options, || async {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(CacheError::Lock(_))));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
