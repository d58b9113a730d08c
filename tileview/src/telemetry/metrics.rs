//! Atomic engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::Instant;

use super::snapshot::TelemetrySnapshot;

/// Counters for cache and retrieval activity.
///
/// All methods take `&self`; share with `Arc<EngineMetrics>`.
#[derive(Debug)]
pub struct EngineMetrics {
    started_at: Instant,
    builds: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    fetches_started: AtomicU64,
    fetches_succeeded: AtomicU64,
    fetches_failed: AtomicU64,
    fetches_cancelled: AtomicU64,
    coalesced_waits: AtomicU64,
    bytes_downloaded: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            builds: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            fetches_started: AtomicU64::new(0),
            fetches_succeeded: AtomicU64::new(0),
            fetches_failed: AtomicU64::new(0),
            fetches_cancelled: AtomicU64::new(0),
            coalesced_waits: AtomicU64::new(0),
            bytes_downloaded: AtomicU64::new(0),
        }
    }

    pub fn build_completed(&self) {
        self.builds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
    }

    /// A fetch this engine led completed with `bytes` of payload.
    pub fn fetch_succeeded(&self, bytes: u64) {
        self.fetches_succeeded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn fetch_failed(&self) {
        self.fetches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetch_cancelled(&self) {
        self.fetches_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// A retrieval was served by another caller's in-flight fetch.
    pub fn coalesced_wait(&self) {
        self.coalesced_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            uptime: self.started_at.elapsed(),
            builds: self.builds.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetches_succeeded: self.fetches_succeeded.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
            fetches_cancelled: self.fetches_cancelled.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
