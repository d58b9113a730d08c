//! Cache tier configuration records.

use std::path::PathBuf;
use std::time::Duration;

use super::lru_index::Quota;

/// Default byte quota of the memory tier (256 MB).
pub const DEFAULT_MEMORY_TIER_BYTES: i64 = 256 * 1024 * 1024;

/// Default idle retention of the memory tier.
pub const DEFAULT_MEMORY_TIER_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Where a tier keeps its payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierStorage {
    Memory,
    Disk { directory: PathBuf },
}

/// One tier of the cache chain, in chain order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTierConfig {
    pub name: String,
    pub storage: TierStorage,
    /// `<= 0` means unlimited.
    pub max_bytes: i64,
    /// `<= 0` means unlimited.
    pub max_entries: i64,
    /// Idle time after which an entry may be purged; `None` keeps entries
    /// until evicted.
    pub retention: Option<Duration>,
}

impl CacheTierConfig {
    /// A memory tier with the given byte quota and no other limits.
    pub fn memory(name: impl Into<String>, max_bytes: i64) -> Self {
        Self {
            name: name.into(),
            storage: TierStorage::Memory,
            max_bytes,
            max_entries: 0,
            retention: None,
        }
    }

    /// A disk tier under `directory` with the given byte quota.
    pub fn disk(name: impl Into<String>, directory: impl Into<PathBuf>, max_bytes: i64) -> Self {
        Self {
            name: name.into(),
            storage: TierStorage::Disk {
                directory: directory.into(),
            },
            max_bytes,
            max_entries: 0,
            retention: None,
        }
    }

    pub fn with_max_entries(mut self, max_entries: i64) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_retention(mut self, retention: Option<Duration>) -> Self {
        self.retention = retention;
        self
    }

    pub fn quota(&self) -> Quota {
        Quota::new(self.max_bytes, self.max_entries, self.retention)
    }
}

impl Default for CacheTierConfig {
    fn default() -> Self {
        Self::memory("memory", DEFAULT_MEMORY_TIER_BYTES)
            .with_retention(Some(DEFAULT_MEMORY_TIER_RETENTION))
    }
}

/// Default directory for a disk tier: `<platform cache dir>/tileview`.
pub fn default_disk_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tileview")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_memory_tier() {
        let config = CacheTierConfig::default();
        assert_eq!(config.storage, TierStorage::Memory);
        assert_eq!(config.max_bytes, 256 * 1024 * 1024);
        assert_eq!(config.max_entries, 0);
        assert_eq!(config.retention, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_quota_conversion() {
        let quota = CacheTierConfig::disk("disk", "/tmp/x", -1)
            .with_max_entries(10)
            .quota();
        assert_eq!(quota.max_bytes, None);
        assert_eq!(quota.max_entries, Some(10));
    }

    #[test]
    fn test_default_disk_directory_is_named() {
        assert!(default_disk_directory().ends_with("tileview"));
    }
}
