//! Tiered tile cache.
//!
//! ```text
//! TileCache
//!   ├── MemoryTier   (LruIndex<Bytes> under one mutex)
//!   └── DiskTier     (LruIndex<()> + {dir}/{hash[0..2]}/{hash}.tile)
//! ```
//!
//! Every tier enforces its own [`Quota`]: byte and entry limits evict the
//! least-recently-accessed entries on insert, and retention is applied by
//! [`TileCache::purge_expired`], optionally driven by a [`PurgeDaemon`].

mod chain;
mod config;
mod daemon;
mod lru_index;
mod providers;
mod traits;

pub use chain::{CacheHit, NamedTierStats, TileCache};
pub use config::{
    default_disk_directory, CacheTierConfig, TierStorage, DEFAULT_MEMORY_TIER_BYTES,
    DEFAULT_MEMORY_TIER_RETENTION,
};
pub use daemon::{PurgeDaemon, DEFAULT_PURGE_INTERVAL};
pub use lru_index::{Evicted, LruIndex, Oversized, Quota};
pub use providers::{DiskTier, MemoryTier};
pub use traits::{BoxFuture, CacheTier, CacheTierError, PurgeResult, TierStats};
