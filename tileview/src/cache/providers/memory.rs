//! In-memory cache tier.
//!
//! Payloads live inside the [`LruIndex`] itself, so index and data are
//! guarded by a single `parking_lot::Mutex`. Every operation is a short
//! critical section with no I/O.

use std::time::Instant as WallInstant;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::cache::lru_index::{LruIndex, Quota};
use crate::cache::traits::{BoxFuture, CacheTier, CacheTierError, PurgeResult, TierStats};

/// In-memory cache tier with LRU eviction.
pub struct MemoryTier {
    name: String,
    index: Mutex<LruIndex<Bytes>>,
}

impl MemoryTier {
    pub fn new(name: impl Into<String>, quota: Quota) -> Self {
        Self {
            name: name.into(),
            index: Mutex::new(LruIndex::new(quota)),
        }
    }
}

impl CacheTier for MemoryTier {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_load(&self, key: &str) -> BoxFuture<'_, Result<Option<Bytes>, CacheTierError>> {
        let value = self.index.lock().get(key).cloned();
        Box::pin(async move { Ok(value) })
    }

    fn store(&self, key: &str, value: Bytes) -> BoxFuture<'_, Result<(), CacheTierError>> {
        let size = value.len() as u64;
        let result = self.index.lock().insert(key, value, size);
        let tier = self.name.as_str();
        let result = match result {
            Ok(evicted) => {
                if !evicted.is_empty() {
                    debug!(
                        tier,
                        evicted = evicted.len(),
                        bytes = evicted.iter().map(|e| e.size).sum::<u64>(),
                        "Evicted entries to make room"
                    );
                }
                trace!(tier, key, size, "Stored entry");
                Ok(())
            }
            Err(oversized) => Err(CacheTierError::ValueTooLarge {
                size: oversized.size,
                max: oversized.max,
            }),
        };
        Box::pin(async move { result })
    }

    fn purge_expired(&self) -> BoxFuture<'_, Result<PurgeResult, CacheTierError>> {
        Box::pin(async move {
            let start = WallInstant::now();
            let expired = self.index.lock().expire(Instant::now());
            Ok(PurgeResult {
                entries_removed: expired.len(),
                bytes_freed: expired.iter().map(|e| e.size).sum(),
                duration_ms: start.elapsed().as_millis() as u64,
            })
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), CacheTierError>> {
        self.index.lock().clear();
        Box::pin(async { Ok(()) })
    }

    fn stats(&self) -> TierStats {
        let index = self.index.lock();
        let quota = index.quota();
        TierStats {
            entries: index.len() as u64,
            bytes: index.total_bytes(),
            max_bytes: quota.max_bytes,
            max_entries: quota.max_entries,
        }
    }
}

impl std::fmt::Debug for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTier")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}
