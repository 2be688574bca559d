//! Fast cache implementations of [`rotator_core::LinkCache`].
//!
//! - [`RedisLinkCache`] for shared, multi-instance deployments.
//! - [`MokaLinkCache`] for a single process and for tests.
//!
//! Both guard counter increments with a [`DistributedLock`].

pub mod codec;
pub mod keys;
pub mod lock;
pub mod moka;
pub mod redis;

use std::time::Duration;

pub use self::keys::{KeySpace, DEFAULT_KEY_PREFIX};
pub use self::lock::{
    DistributedLock, Lease, LockBackend, LockOptions, MemoryLockBackend, RedisLockBackend,
    RetryPolicy,
};
pub use self::moka::{MokaCacheConfig, MokaLinkCache};
pub use self::redis::{RedisCacheConfig, RedisLinkCache};

/// Default lifetime of every cached record: 30 days.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
