//! On-disk cache tier.
//!
//! # File Layout
//!
//! One file per entry, named by the SHA-256 of the key and fanned out by the
//! first two hex digits:
//!
//! ```text
//! {directory}/{hash[0..2]}/{hash}.tile
//! ```
//!
//! Writes go to a sibling `.tmp` file that is renamed into place, so a
//! reader never sees a partial payload.
//!
//! # Index
//!
//! The LRU index is keyed by the hash and rebuilt from the directory on
//! [`DiskTier::open`], using each file's mtime as its last access; reads
//! bump the mtime. The index
//! lock is only held while the index is mutated, never across file I/O.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant as WallInstant, SystemTime};

use bytes::Bytes;
use filetime::FileTime;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::cache::lru_index::{Evicted, LruIndex, Quota};
use crate::cache::traits::{BoxFuture, CacheTier, CacheTierError, PurgeResult, TierStats};

const ENTRY_EXTENSION: &str = "tile";
const TEMP_EXTENSION: &str = "tmp";

/// A cache file found while scanning the directory.
struct ScannedEntry {
    hash: String,
    size: u64,
    modified: SystemTime,
}

/// On-disk cache tier with LRU eviction.
pub struct DiskTier {
    name: String,
    directory: PathBuf,
    index: Mutex<LruIndex<()>>,
    temp_counter: AtomicU64,
}

impl DiskTier {
    /// Opens (creating if needed) a disk tier rooted at `directory`.
    ///
    /// Existing entries are indexed oldest first; if they exceed the quota
    /// the oldest are deleted.
    pub async fn open(
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
        quota: Quota,
    ) -> Result<Self, CacheTierError> {
        let name = name.into();
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory).await?;

        let scan_dir = directory.clone();
        let mut scanned = tokio::task::spawn_blocking(move || scan_directory(&scan_dir))
            .await
            .map_err(|e| CacheTierError::Task(e.to_string()))??;
        scanned.sort_by_key(|entry| entry.modified);

        let now = SystemTime::now();
        let mut index = LruIndex::new(quota);
        let mut dropped = Vec::new();
        for entry in scanned {
            let idle = now.duration_since(entry.modified).unwrap_or(Duration::ZERO);
            match index.insert_aged(&entry.hash, (), entry.size, idle) {
                Ok(evicted) => dropped.extend(evicted),
                Err(_) => dropped.push(Evicted {
                    key: entry.hash,
                    value: (),
                    size: entry.size,
                }),
            }
        }

        let tier = Self {
            name,
            directory,
            index: Mutex::new(index),
            temp_counter: AtomicU64::new(0),
        };
        tier.remove_files(&dropped).await;

        let stats = tier.stats();
        info!(
            tier = %tier.name,
            dir = %tier.directory.display(),
            entries = stats.entries,
            bytes = stats.bytes,
            over_quota = dropped.len(),
            "Disk cache tier opened"
        );
        Ok(tier)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.path_for_hash(&hash_key(key))
    }

    fn path_for_hash(&self, hash: &str) -> PathBuf {
        self.directory
            .join(&hash[..2])
            .join(format!("{hash}.{ENTRY_EXTENSION}"))
    }

    async fn remove_files(&self, entries: &[Evicted<()>]) {
        for entry in entries {
            let path = self.path_for_hash(&entry.key);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    debug!(
                        path = %path.display(),
                        error = %e,
                        "Failed to delete cache file"
                    );
                }
            }
        }
    }
}

impl CacheTier for DiskTier {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_load(&self, key: &str) -> BoxFuture<'_, Result<Option<Bytes>, CacheTierError>> {
        let hash = hash_key(key);
        Box::pin(async move {
            if !self.index.lock().touch(&hash) {
                return Ok(None);
            }
            let path = self.path_for_hash(&hash);
            match tokio::fs::read(&path).await {
                Ok(data) => {
                    touch_file(&path).await;
                    Ok(Some(Bytes::from(data)))
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(tier = %self.name, path = %path.display(), "Indexed cache file missing");
                    self.index.lock().remove(&hash);
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn store(&self, key: &str, value: Bytes) -> BoxFuture<'_, Result<(), CacheTierError>> {
        let hash = hash_key(key);
        Box::pin(async move {
            let size = value.len() as u64;
            let max_bytes = self.index.lock().quota().max_bytes;
            if let Some(max) = max_bytes {
                if size > max {
                    return Err(CacheTierError::ValueTooLarge { size, max });
                }
            }

            let path = self.path_for_hash(&hash);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let serial = self.temp_counter.fetch_add(1, Ordering::Relaxed);
            let temp_path = path.with_extension(format!("{serial}.{TEMP_EXTENSION}"));
            if let Err(e) = tokio::fs::write(&temp_path, &value).await {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e.into());
            }
            if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e.into());
            }

            let inserted = self.index.lock().insert(&hash, (), size);
            let evicted = inserted.map_err(|oversized| CacheTierError::ValueTooLarge {
                size: oversized.size,
                max: oversized.max,
            })?;
            if !evicted.is_empty() {
                debug!(
                    tier = %self.name,
                    evicted = evicted.len(),
                    bytes = evicted.iter().map(|e| e.size).sum::<u64>(),
                    "Evicted entries to make room"
                );
                self.remove_files(&evicted).await;
            }
            trace!(tier = %self.name, hash = %hash, size, "Stored entry");
            Ok(())
        })
    }

    fn purge_expired(&self) -> BoxFuture<'_, Result<PurgeResult, CacheTierError>> {
        Box::pin(async move {
            let start = WallInstant::now();
            let expired = self.index.lock().expire(Instant::now());
            self.remove_files(&expired).await;
            Ok(PurgeResult {
                entries_removed: expired.len(),
                bytes_freed: expired.iter().map(|e| e.size).sum(),
                duration_ms: start.elapsed().as_millis() as u64,
            })
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), CacheTierError>> {
        Box::pin(async move {
            let removed = self.index.lock().clear();
            self.remove_files(&removed).await;
            Ok(())
        })
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

impl std::fmt::Debug for DiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskTier")
            .field("name", &self.name)
            .field("directory", &self.directory)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Sets the file's mtime to now so its last access survives a reopen.
async fn touch_file(path: &Path) {
    let path = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        filetime::set_file_mtime(&path, FileTime::now()).map_err(|e| (path, e))
    })
    .await;
    if let Ok(Err((path, e))) = result {
        debug!(path = %path.display(), error = %e, "Failed to update cache file mtime");
    }
}

/// Lowercase hex SHA-256 of `key`.
fn hash_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

fn is_entry_hash(stem: &str) -> bool {
    stem.len() == 64 && stem.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Collects cache files two levels deep, deleting leftover temp files.
fn scan_directory(directory: &Path) -> Result<Vec<ScannedEntry>, CacheTierError> {
    let mut found = Vec::new();
    for shard in std::fs::read_dir(directory)?.flatten() {
        let shard_path = shard.path();
        if !shard_path.is_dir() {
            continue;
        }
        let files = match std::fs::read_dir(&shard_path) {
            Ok(files) => files,
            Err(e) => {
                debug!(dir = %shard_path.display(), error = %e, "Failed to read cache shard");
                continue;
            }
        };
        for file in files.flatten() {
            let path = file.path();
            let extension = path.extension().and_then(|e| e.to_str());
            if extension == Some(TEMP_EXTENSION) {
                let _ = std::fs::remove_file(&path);
                continue;
            }
            if extension != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_entry_hash(stem) {
                continue;
            }
            if let Ok(metadata) = file.metadata() {
                found.push(ScannedEntry {
                    hash: stem.to_string(),
                    size: metadata.len(),
                    modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                });
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open(dir: &TempDir, quota: Quota) -> DiskTier {
        DiskTier::open("disk", dir.path(), quota).await.unwrap()
    }

    #[test]
    fn test_hash_key() {
        let hash = hash_key("osm:-:3:1:1");
        assert_eq!(hash.len(), 64);
        assert!(is_entry_hash(&hash));
        assert_ne!(hash, hash_key("osm:-:3:1:2"));
    }

    #[tokio::test]
    async fn test_layout_uses_hash_prefix() {
        let dir = TempDir::new().unwrap();
        let tier = open(&dir, Quota::unlimited()).await;

        tier.store("key1", Bytes::from_static(b"payload")).await.unwrap();

        let hash = hash_key("key1");
        let expected = dir.path().join(&hash[..2]).join(format!("{hash}.tile"));
        assert_eq!(tier.path_for("key1"), expected);
        assert_eq!(std::fs::read(&expected).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let dir = TempDir::new().unwrap();
        let tier = open(&dir, Quota::unlimited()).await;

        tier.store("key1", Bytes::from_static(&[1, 2, 3])).await.unwrap();
        assert_eq!(
            tier.try_load("key1").await.unwrap(),
            Some(Bytes::from_static(&[1, 2, 3]))
        );
        assert!(tier.try_load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let tier = open(&dir, Quota::unlimited()).await;
            tier.store("a", Bytes::from_static(b"alpha")).await.unwrap();
            tier.store("b", Bytes::from_static(b"beta")).await.unwrap();
        }

        let reopened = open(&dir, Quota::unlimited()).await;
        let stats = reopened.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.bytes, 9);
        assert_eq!(
            reopened.try_load("a").await.unwrap(),
            Some(Bytes::from_static(b"alpha"))
        );
    }

    #[tokio::test]
    async fn test_entry_limit_deletes_evicted_files() {
        let dir = TempDir::new().unwrap();
        let tier = open(&dir, Quota::new(0, 2, None)).await;

        tier.store("a", Bytes::from_static(b"1")).await.unwrap();
        tier.store("b", Bytes::from_static(b"2")).await.unwrap();
        tier.try_load("a").await.unwrap();
        tier.store("c", Bytes::from_static(b"3")).await.unwrap();

        assert!(tier.path_for("a").exists());
        assert!(!tier.path_for("b").exists());
        assert!(tier.path_for("c").exists());
        assert_eq!(tier.stats().entries, 2);
    }

    #[tokio::test]
    async fn test_value_too_large_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let tier = open(&dir, Quota::new(4, 0, None)).await;

        let err = tier.store("big", Bytes::from_static(b"12345")).await.unwrap_err();
        assert!(matches!(err, CacheTierError::ValueTooLarge { size: 5, max: 4 }));
        assert!(!tier.path_for("big").exists());
    }

    #[tokio::test]
    async fn test_reopen_orders_by_mtime_and_enforces_quota() {
        let dir = TempDir::new().unwrap();
        {
            let tier = open(&dir, Quota::unlimited()).await;
            for key in ["old", "mid", "new"] {
                tier.store(key, Bytes::from_static(b"xx")).await.unwrap();
            }
            let base = FileTime::from_unix_time(1_700_000_000, 0);
            for (offset, key) in ["old", "mid", "new"].iter().enumerate() {
                let time = FileTime::from_unix_time(base.unix_seconds() + offset as i64, 0);
                filetime::set_file_mtime(tier.path_for(key), time).unwrap();
            }
        }

        let tier = open(&dir, Quota::new(0, 2, None)).await;
        assert_eq!(tier.stats().entries, 2);
        assert!(!tier.path_for("old").exists());
        assert!(tier.try_load("mid").await.unwrap().is_some());
        assert!(tier.try_load("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_uses_file_age_after_reopen() {
        let dir = TempDir::new().unwrap();
        let retention = Some(Duration::from_secs(3600));
        {
            let tier = open(&dir, Quota::unlimited()).await;
            tier.store("stale", Bytes::from_static(b"s")).await.unwrap();
            tier.store("fresh", Bytes::from_static(b"f")).await.unwrap();
            let two_hours_ago = FileTime::from_system_time(
                SystemTime::now() - Duration::from_secs(2 * 3600),
            );
            filetime::set_file_mtime(tier.path_for("stale"), two_hours_ago).unwrap();
        }

        let tier = open(&dir, Quota::new(0, 0, retention)).await;
        let result = tier.purge_expired().await.unwrap();

        assert_eq!(result.entries_removed, 1);
        assert!(!tier.path_for("stale").exists());
        assert!(tier.try_load("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_read_refreshes_file_age_for_next_open() {
        let dir = TempDir::new().unwrap();
        let retention = Some(Duration::from_secs(3600));
        let two_hours_ago =
            FileTime::from_system_time(SystemTime::now() - Duration::from_secs(2 * 3600));
        {
            let tier = open(&dir, Quota::unlimited()).await;
            tier.store("read", Bytes::from_static(b"r")).await.unwrap();
            tier.store("unread", Bytes::from_static(b"u")).await.unwrap();
            filetime::set_file_mtime(tier.path_for("read"), two_hours_ago).unwrap();
            filetime::set_file_mtime(tier.path_for("unread"), two_hours_ago).unwrap();
        }
        {
            let tier = open(&dir, Quota::unlimited()).await;
            assert!(tier.try_load("read").await.unwrap().is_some());
        }

        let tier = open(&dir, Quota::new(0, 0, retention)).await;
        let result = tier.purge_expired().await.unwrap();

        assert_eq!(result.entries_removed, 1);
        assert!(tier.path_for("read").exists());
        assert!(!tier.path_for("unread").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let tier = open(&dir, Quota::unlimited()).await;
        tier.store("a", Bytes::from_static(b"a")).await.unwrap();
        std::fs::remove_file(tier.path_for("a")).unwrap();

        assert!(tier.try_load("a").await.unwrap().is_none());
        assert_eq!(tier.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_leftover_temp_files_removed_on_open() {
        let dir = TempDir::new().unwrap();
        let shard = dir.path().join("ab");
        std::fs::create_dir_all(&shard).unwrap();
        let temp = shard.join(format!("{}.0.tmp", "ab".repeat(32)));
        std::fs::write(&temp, b"partial").unwrap();

        let tier = open(&dir, Quota::unlimited()).await;
        assert!(!temp.exists());
        assert_eq!(tier.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_clear_removes_files() {
        let dir = TempDir::new().unwrap();
        let tier = open(&dir, Quota::unlimited()).await;
        tier.store("a", Bytes::from_static(b"a")).await.unwrap();
        tier.clear().await.unwrap();

        assert!(!tier.path_for("a").exists());
        assert_eq!(tier.stats().entries, 0);
    }
}
