//! Core traits for cache tiers.
//!
//! A [`CacheTier`] is one level of the cache chain: a byte store keyed by
//! fragment id that enforces its own byte, entry and retention quotas.
//!
//! # Design Principles
//!
//! - **String keys**: fragment ids, human-readable in logs
//! - **`Bytes` values**: opaque payloads, shared without copying
//! - **Self-contained quotas**: every tier evicts on insert and purges idle
//!   entries on request
//! - **Dyn-compatible**: uses `Pin<Box<dyn Future>>` so the chain can hold
//!   `Arc<dyn CacheTier>`

use std::fmt;
use std::future::Future;
use std::ops::AddAssign;
use std::pin::Pin;

use bytes::Bytes;
use thiserror::Error;

/// Result of purging expired entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeResult {
    /// Number of entries removed.
    pub entries_removed: usize,
    /// Total bytes freed.
    pub bytes_freed: u64,
    /// Duration of the purge in milliseconds.
    pub duration_ms: u64,
}

impl AddAssign for PurgeResult {
    fn add_assign(&mut self, other: Self) {
        self.entries_removed += other.entries_removed;
        self.bytes_freed += other.bytes_freed;
        self.duration_ms += other.duration_ms;
    }
}

impl fmt::Display for PurgeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Purge: removed {} entries, freed {} bytes in {}ms",
            self.entries_removed, self.bytes_freed, self.duration_ms
        )
    }
}

/// Point-in-time occupancy of one tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierStats {
    pub entries: u64,
    pub bytes: u64,
    /// `None` when unlimited.
    pub max_bytes: Option<u64>,
    /// `None` when unlimited.
    pub max_entries: Option<u64>,
}

/// Errors that can occur during cache tier operations.
#[derive(Debug, Error)]
pub enum CacheTierError {
    /// I/O error in a persistent tier.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The payload alone exceeds the tier's byte quota.
    #[error("Value too large: {size} bytes (max: {max})")]
    ValueTooLarge { size: u64, max: u64 },

    /// A blocking worker failed.
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One level of the tile cache.
///
/// # Eviction
///
/// Inserting evicts least-recently-accessed entries until the new entry
/// fits both the byte and the entry quota. Reading an entry counts as an
/// access. Entries idle for longer than the retention period are removed by
/// [`CacheTier::purge_expired`].
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` for use across async tasks.
pub trait CacheTier: Send + Sync {
    /// Name used in logs and statistics.
    fn name(&self) -> &str;

    /// Returns the payload for `key`, updating its last access.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(data))` if the key exists
    /// - `Ok(None)` if the key is not found
    /// - `Err(_)` if an error occurs
    fn try_load(&self, key: &str) -> BoxFuture<'_, Result<Option<Bytes>, CacheTierError>>;

    /// Stores `value` under `key`, replacing any previous payload.
    ///
    /// # Errors
    ///
    /// [`CacheTierError::ValueTooLarge`] if the payload alone exceeds the
    /// byte quota; I/O errors for persistent tiers.
    fn store(&self, key: &str, value: Bytes) -> BoxFuture<'_, Result<(), CacheTierError>>;

    /// Removes entries idle longer than the retention period.
    fn purge_expired(&self) -> BoxFuture<'_, Result<PurgeResult, CacheTierError>>;

    /// Removes every entry.
    fn clear(&self) -> BoxFuture<'_, Result<(), CacheTierError>>;

    fn stats(&self) -> TierStats;
}
