//! Point-in-time telemetry copy.

use std::fmt;
use std::time::Duration;

/// Copy of [`EngineMetrics`](super::EngineMetrics) counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub uptime: Duration,
    pub builds: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub fetches_started: u64,
    pub fetches_succeeded: u64,
    pub fetches_failed: u64,
    pub fetches_cancelled: u64,
    pub coalesced_waits: u64,
    pub bytes_downloaded: u64,
}

impl TelemetrySnapshot {
    /// Fraction of block lookups served from cache, `0.0` before any lookup.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Average download throughput since the engine started.
    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.bytes_downloaded as f64 / secs
        } else {
            0.0
        }
    }

    /// Fetches started but not yet finished.
    pub fn fetches_in_flight(&self) -> u64 {
        self.fetches_started
            .saturating_sub(self.fetches_succeeded + self.fetches_failed + self.fetches_cancelled)
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cache {}/{} hit ({:.0}%), fetches {} ok {} failed {} cancelled, {} coalesced, {} bytes",
            self.cache_hits,
            self.cache_hits + self.cache_misses,
            self.cache_hit_rate() * 100.0,
            self.fetches_succeeded,
            self.fetches_failed,
            self.fetches_cancelled,
            self.coalesced_waits,
            self.bytes_downloaded
        )
    }
}
