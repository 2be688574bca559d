use crate::keys::KeySpace;
use crate::lock::{DistributedLock, LockOptions, MemoryLockBackend};
use crate::DEFAULT_CACHE_TTL;
use async_trait::async_trait;
use jiff::Timestamp;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use rotator_core::cache::Result;
use rotator_core::{LinkCache, LinkId, LinkRecord, ShortCode, ShortCodeRecord};
use std::collections::BTreeMap;
use std::future::ready;
use std::time::Duration;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

type LinkGroup = BTreeMap<LinkId, LinkRecord>;

#[derive(Debug, Clone, TypedBuilder)]
pub struct MokaCacheConfig {
    /// Maximum number of short codes, and separately of link groups.
    #[builder(default = 10_000)]
    pub max_capacity: u64,
    #[builder(default = DEFAULT_CACHE_TTL)]
    pub ttl: Duration,
    #[builder(default)]
    pub lock: LockOptions,
}

impl Default for MokaCacheConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// An in-memory [`LinkCache`] using Moka.
///
/// Links are kept as one group per short code. Saving and incrementing go
/// through moka's per-key compute, so a reader sees either the old group or
/// the new one. Increments additionally take the same per-key lock the
/// Redis cache takes, backed by a [`MemoryLockBackend`].
#[derive(Debug, Clone)]
pub struct MokaLinkCache {
    short_codes: Cache<String, ShortCodeRecord>,
    links: Cache<String, LinkGroup>,
    keys: KeySpace,
    lock: DistributedLock<MemoryLockBackend>,
    lock_options: LockOptions,
}

impl MokaLinkCache {
    pub fn new() -> Self {
        Self::with_config(MokaCacheConfig::default())
    }

    pub fn with_config(config: MokaCacheConfig) -> Self {
        Self::with_lock_backend(config, MemoryLockBackend::new())
    }

    /// Builds a cache whose increments contend on `backend`. Clones of one
    /// backend share their held keys.
    pub fn with_lock_backend(config: MokaCacheConfig, backend: MemoryLockBackend) -> Self {
        Self {
            short_codes: Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(config.ttl)
                .build(),
            links: Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(config.ttl)
                .build(),
            keys: KeySpace::default(),
            lock: DistributedLock::new(backend),
            lock_options: config.lock,
        }
    }

    /// Key of the per-code entries, also used in the lock names.
    fn entry_key(code: &ShortCode) -> String {
        code.as_str().to_string()
    }
}

impl Default for MokaLinkCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkCache for MokaLinkCache {
    async fn get_short_code(&self, code: &ShortCode) -> Result<Option<ShortCodeRecord>> {
        trace!(code = %code, "Fetching short code from Moka cache");

        match self.short_codes.get(&Self::entry_key(code)).await {
            Some(record) => {
                debug!(code = %code, "Cache hit in Moka");
                Ok(Some(record))
            }
            None => {
                trace!(code = %code, "Cache miss in Moka");
                Ok(None)
            }
        }
    }

    async fn save_short_code(&self, record: &ShortCodeRecord) -> Result<()> {
        self.short_codes
            .insert(Self::entry_key(&record.code), record.clone())
            .await;
        debug!(code = %record.code, "Cached short code in Moka");
        Ok(())
    }

    async fn incr_short_code(&self, code: &ShortCode) -> Result<()> {
        let lock_key = self.keys.short_code_lock(code);

        let result = self
            .lock
            .with_lock(&lock_key, &self.lock_options, || async {
                let now = Timestamp::now();
                let result = self
                    .short_codes
                    .entry(Self::entry_key(code))
                    .and_compute_with(|entry| {
                        ready(match entry {
                            Some(entry) => {
                                let mut record = entry.into_value();
                                record.total_hit += 1;
                                record.updated_at = now;
                                Op::Put(record)
                            }
                            None => Op::Nop,
                        })
                    })
                    .await;
                Ok(result)
            })
            .await?;

        match result {
            CompResult::ReplacedWith(_) => trace!(code = %code, "Incremented cached short code hits"),
            _ => debug!(code = %code, "Short code not cached, skipping increment"),
        }
        Ok(())
    }

    async fn get_links(&self, code: &ShortCode) -> Result<Vec<LinkRecord>> {
        trace!(code = %code, "Fetching links from Moka cache");

        match self.links.get(&Self::entry_key(code)).await {
            Some(group) => {
                debug!(code = %code, count = group.len(), "Cache hit in Moka");
                Ok(group.into_values().collect())
            }
            None => {
                trace!(code = %code, "Cache miss in Moka");
                Ok(Vec::new())
            }
        }
    }

    async fn save_links(&self, links: &[LinkRecord]) -> Result<()> {
        let mut groups: BTreeMap<String, LinkGroup> = BTreeMap::new();
        for link in links {
            groups
                .entry(Self::entry_key(&link.code))
                .or_default()
                .insert(link.id, link.clone());
        }

        for (key, incoming) in groups {
            self.links
                .entry(key)
                .and_compute_with(|entry| {
                    let mut group = entry.map(|e| e.into_value()).unwrap_or_default();
                    group.extend(incoming);
                    ready(Op::Put(group))
                })
                .await;
        }

        debug!(count = links.len(), "Cached links in Moka");
        Ok(())
    }

    async fn incr_link(&self, code: &ShortCode, link_id: LinkId) -> Result<()> {
        let lock_key = self.keys.link_lock(code, link_id);

        let result = self
            .lock
            .with_lock(&lock_key, &self.lock_options, || async {
                let now = Timestamp::now();
                let result = self
                    .links
                    .entry(Self::entry_key(code))
                    .and_compute_with(|entry| {
                        let updated = entry.map(|e| e.into_value()).and_then(|mut group| {
                            let link = group.get_mut(&link_id)?;
                            link.total_hit += 1;
                            link.updated_at = now;
                            Some(group)
                        });
                        ready(match updated {
                            Some(group) => Op::Put(group),
                            None => Op::Nop,
                        })
                    })
                    .await;
                Ok(result)
            })
            .await?;

        match result {
            CompResult::ReplacedWith(_) => {
                trace!(code = %code, link_id, "Incremented cached link hits")
            }
            _ => debug!(code = %code, link_id, "Link not cached, skipping increment"),
        }
        Ok(())
    }
}
