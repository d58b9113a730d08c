//! Engine telemetry.
//!
//! Lock-free atomic counters updated by the retrieval path, read as
//! point-in-time copies.
//!
//! # Architecture
//!
//! ```text
//! TileEngine ─────► EngineMetrics ─────► TelemetrySnapshot ─────► host UI / logs
//!                  (atomic counters)    (point-in-time copy)
//! ```
//!
//! # Example
//!
//! ```
//! use tileview::telemetry::EngineMetrics;
//!
//! let metrics = EngineMetrics::new();
//! metrics.cache_miss();
//! metrics.fetch_started();
//! metrics.fetch_succeeded(18_432);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.fetches_succeeded, 1);
//! assert_eq!(snapshot.bytes_downloaded, 18_432);
//! ```

mod metrics;
mod snapshot;

pub use metrics::EngineMetrics;
pub use snapshot::TelemetrySnapshot;
