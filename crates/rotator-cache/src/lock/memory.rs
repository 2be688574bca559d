use super::LockBackend;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rotator_core::LockError;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Expiry used when a requested ttl does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

#[derive(Debug)]
struct Hold {
    token: String,
    expires_at: Instant,
}

/// Process-local lock backend for single-instance deployments and tests.
///
/// Clones share the same table of held keys.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockBackend {
    held: Arc<DashMap<String, Hold>>,
}

impl MemoryLockBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockBackend for MemoryLockBackend {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError> {
        let now = Instant::now();
        let hold = Hold {
            token: token.to_string(),
            expires_at: now
                .checked_add(ttl)
                .unwrap_or_else(|| now + FAR_FUTURE),
        };

        match self.held.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at <= now {
                    occupied.insert(hold);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(hold);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str, token: &str) -> Result<bool, LockError> {
        Ok(self
            .held
            .remove_if(key, |_, hold| hold.token == token)
            .is_some())
    }
}
