//! Block retrieval pipeline
//!
//! ```text
//! MapBlock ──► TileProvider::build_request ──► HttpTransport::send ──► body
//!                    │ None                        │ bounded + cancellable
//!                    ▼                             ▼
//!          RequestConstruction           Bytes | FetchError
//! ```
//!
//! [`TileFetcher`] performs one fetch; [`RequestCoalescer`] makes sure only
//! one fetch per fragment id is in flight at a time.

mod budget;
mod coalesce;
mod error;
mod fetcher;

pub use budget::{LatencyBudget, DEFAULT_LATENCY_BUDGET};
pub use coalesce::{CoalescedFetch, RequestCoalescer};
pub use error::FetchError;
pub use fetcher::TileFetcher;
