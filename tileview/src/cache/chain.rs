//! Ordered chain of cache tiers.
//!
//! ```text
//! load:   tier 0 ──miss──► tier 1 ──miss──► ... ──► None
//!           ▲                 │ hit
//!           └── backfill ─────┘
//!
//! store:  tier 0 ──► tier 1 ──► ...
//! ```
//!
//! Tier failures never reach the caller: a failing load is treated as a
//! miss, a failing store as a no-op, and both are logged.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, instrument, warn};

use super::config::{CacheTierConfig, TierStorage};
use super::providers::{DiskTier, MemoryTier};
use super::traits::{CacheTier, CacheTierError, PurgeResult, TierStats};

/// A payload found in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    pub data: Bytes,
    /// Position of the tier that held the payload.
    pub tier: usize,
}

/// Occupancy of one tier, by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTierStats {
    pub name: String,
    pub stats: TierStats,
}

/// Tiered tile cache.
#[derive(Clone, Default)]
pub struct TileCache {
    tiers: Vec<Arc<dyn CacheTier>>,
}

impl TileCache {
    pub fn new(tiers: Vec<Arc<dyn CacheTier>>) -> Self {
        Self { tiers }
    }

    /// A cache with no tiers; every load misses.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Builds the tiers described by `configs`, in order.
    ///
    /// # Errors
    ///
    /// Fails if a disk tier's directory cannot be created or scanned.
    pub async fn from_configs(configs: &[CacheTierConfig]) -> Result<Self, CacheTierError> {
        let mut tiers: Vec<Arc<dyn CacheTier>> = Vec::with_capacity(configs.len());
        for config in configs {
            let tier: Arc<dyn CacheTier> = match &config.storage {
                TierStorage::Memory => Arc::new(MemoryTier::new(&config.name, config.quota())),
                TierStorage::Disk { directory } => {
                    Arc::new(DiskTier::open(&config.name, directory, config.quota()).await?)
                }
            };
            tiers.push(tier);
        }
        Ok(Self::new(tiers))
    }

    pub fn tiers(&self) -> &[Arc<dyn CacheTier>] {
        &self.tiers
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Looks `key` up front to back. On a hit in a later tier, the payload is
    /// copied into every earlier tier.
    #[instrument(level = "trace", skip(self))]
    pub async fn load(&self, key: &str) -> Option<CacheHit> {
        for (position, tier) in self.tiers.iter().enumerate() {
            match tier.try_load(key).await {
                Ok(Some(data)) => {
                    for earlier in &self.tiers[..position] {
                        store_logged(earlier.as_ref(), key, data.clone()).await;
                    }
                    if position > 0 {
                        debug!(key, from = tier.name(), "Promoted cache entry");
                    }
                    return Some(CacheHit {
                        data,
                        tier: position,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(tier = tier.name(), key, error = %e, "Cache tier load failed");
                }
            }
        }
        None
    }

    /// Writes `data` to every tier, front to back.
    pub async fn store(&self, key: &str, data: Bytes) {
        for tier in &self.tiers {
            store_logged(tier.as_ref(), key, data.clone()).await;
        }
    }

    /// Purges expired entries from every tier and returns the totals.
    pub async fn purge_expired(&self) -> PurgeResult {
        let mut total = PurgeResult::default();
        for tier in &self.tiers {
            match tier.purge_expired().await {
                Ok(result) => {
                    if result.entries_removed > 0 {
                        debug!(tier = tier.name(), %result, "Purged expired entries");
                    }
                    total += result;
                }
                Err(e) => warn!(tier = tier.name(), error = %e, "Cache tier purge failed"),
            }
        }
        total
    }

    pub async fn clear(&self) {
        for tier in &self.tiers {
            if let Err(e) = tier.clear().await {
                warn!(tier = tier.name(), error = %e, "Cache tier clear failed");
            }
        }
    }

    pub fn stats(&self) -> Vec<NamedTierStats> {
        self.tiers
            .iter()
            .map(|tier| NamedTierStats {
                name: tier.name().to_string(),
                stats: tier.stats(),
            })
            .collect()
    }
}

async fn store_logged(tier: &dyn CacheTier, key: &str, data: Bytes) {
    match tier.store(key, data).await {
        Ok(()) => {}
        Err(CacheTierError::ValueTooLarge { size, max }) => {
            debug!(tier = tier.name(), key, size, max, "Payload exceeds tier quota, not cached");
        }
        Err(e) => warn!(tier = tier.name(), key, error = %e, "Cache tier store failed"),
    }
}

impl std::fmt::Debug for TileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.tiers.iter().map(|tier| tier.name()).collect();
        f.debug_struct("TileCache").field("tiers", &names).finish()
    }
}
