//! TileView - map tile region engine
//!
//! Turns a requested map view (center, pixel size, heading, scale) into the
//! set of tiles or static images covering it, and retrieves their imagery
//! through a chain of cache tiers and a pluggable HTTP provider.
//!
//! ```ignore
//! use std::sync::Arc;
//! use tileview::config::EngineConfig;
//! use tileview::coord::LatLong;
//! use tileview::engine::TileEngine;
//! use tileview::provider::ProviderRegistry;
//! use tileview::region::RegionRequest;
//!
//! let config = EngineConfig::load()?;
//! let engine = Arc::new(TileEngine::from_config(&config, &ProviderRegistry::new()).await?);
//!
//! let mut session = engine.session();
//! session.submit(RegionRequest::new(LatLong::new(47.37, 8.54), 1024, 768, 12));
//! if let Some(region) = session.next().await {
//!     println!("{} of {} blocks loaded", region.loaded_count(), region.blocks.len());
//! }
//! ```

pub mod cache;
pub mod config;
pub mod coord;
pub mod engine;
pub mod fetch;
pub mod logging;
pub mod provider;
pub mod range;
pub mod region;
pub mod telemetry;

pub use engine::{EngineError, LoadedRegion, TileEngine, ViewSession};
pub use range::{ClampWarning, Range};
