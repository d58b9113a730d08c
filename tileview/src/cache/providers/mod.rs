//! Cache tier implementations.
//!
//! # Available Tiers
//!
//! - [`MemoryTier`]: in-process LRU store
//! - [`DiskTier`]: one file per entry under a cache directory, index rebuilt
//!   on open
//!
//! Tiers are normally created from [`CacheTierConfig`](crate::cache::CacheTierConfig)
//! records via [`TileCache::from_configs`](crate::cache::TileCache::from_configs).

mod disk;
mod memory;

pub use disk::DiskTier;
pub use memory::MemoryTier;
