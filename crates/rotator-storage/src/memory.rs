use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use rotator_core::error::StorageError;
use rotator_core::repository::{Repository, Result};
use rotator_core::{LinkId, LinkRecord, NewShortCode, ShortCode, ShortCodeRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Largest destination the `urls.original` column accepts.
pub const MAX_ORIGINAL_BYTES: usize = 65_535;

#[derive(Debug, Clone)]
struct StoredShortCode {
    record: ShortCodeRecord,
    link_ids: Vec<LinkId>,
}

#[derive(Debug, Default)]
struct Tables {
    short_codes: DashMap<String, StoredShortCode>,
    links: DashMap<LinkId, LinkRecord>,
    next_short_code_id: AtomicU64,
    next_link_id: AtomicU64,
}

/// In-memory implementation of the Repository trait using DashMap.
///
/// A short code only becomes visible once all of its links are in place,
/// so readers never see a code without its destinations. Clones share the
/// same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Tables>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored short codes.
    pub fn len(&self) -> usize {
        self.tables.short_codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.short_codes.is_empty()
    }

    /// Number of stored links across all short codes.
    pub fn link_count(&self) -> usize {
        self.tables.links.len()
    }
}

fn next_id(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn save_short_code_with_links(
        &self,
        short_code: NewShortCode,
        urls: &[String],
    ) -> Result<(ShortCodeRecord, Vec<LinkRecord>)> {
        if urls.is_empty() {
            return Err(StorageError::InvalidData(format!(
                "short code '{}' needs at least one url",
                short_code.code
            )));
        }

        // The vacant entry stays locked until the code is published.
        let vacant = match self
            .tables
            .short_codes
            .entry(short_code.code.as_str().to_owned())
        {
            Entry::Occupied(_) => return Err(StorageError::Conflict(short_code.code.to_string())),
            Entry::Vacant(vacant) => vacant,
        };

        let now = Timestamp::now();
        let mut links: Vec<LinkRecord> = Vec::with_capacity(urls.len());
        for url in urls {
            if url.len() > MAX_ORIGINAL_BYTES {
                // Undo the partial write; the code was never published.
                for link in &links {
                    self.tables.links.remove(&link.id);
                }
                return Err(StorageError::InvalidData(format!(
                    "url of {} bytes exceeds the {MAX_ORIGINAL_BYTES} byte limit",
                    url.len()
                )));
            }

            let link = LinkRecord {
                id: next_id(&self.tables.next_link_id),
                code: short_code.code.clone(),
                original: url.clone(),
                total_hit: 0,
                created_at: now,
                updated_at: now,
            };
            self.tables.links.insert(link.id, link.clone());
            links.push(link);
        }

        let record = ShortCodeRecord {
            id: next_id(&self.tables.next_short_code_id),
            code: short_code.code,
            total_hit: 0,
            strategy: short_code.strategy,
            created_at: now,
            updated_at: now,
        };
        vacant.insert(StoredShortCode {
            record: record.clone(),
            link_ids: links.iter().map(|link| link.id).collect(),
        });

        Ok((record, links))
    }

    async fn get_short_code(&self, code: &ShortCode) -> Result<Option<ShortCodeRecord>> {
        Ok(self
            .tables
            .short_codes
            .get(code.as_str())
            .map(|stored| stored.record.clone()))
    }

    async fn get_links(&self, code: &ShortCode) -> Result<Vec<LinkRecord>> {
        let Some(link_ids) = self
            .tables
            .short_codes
            .get(code.as_str())
            .map(|stored| stored.link_ids.clone())
        else {
            return Ok(Vec::new());
        };

        Ok(link_ids
            .iter()
            .filter_map(|id| self.tables.links.get(id).map(|link| link.clone()))
            .collect())
    }

    async fn update_short_code_hit(&self, code: &ShortCode) -> Result<()> {
        if let Some(mut stored) = self.tables.short_codes.get_mut(code.as_str()) {
            stored.record.total_hit += 1;
            stored.record.updated_at = Timestamp::now();
        }
        Ok(())
    }

    async fn update_link_hit(&self, link_id: LinkId) -> Result<()> {
        if let Some(mut link) = self.tables.links.get_mut(&link_id) {
            link.total_hit += 1;
            link.updated_at = Timestamp::now();
        }
        Ok(())
    }
}
