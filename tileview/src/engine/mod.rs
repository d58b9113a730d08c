//! Engine facade
//!
//! [`TileEngine`] ties one provider, a transport and the cache chain
//! together:
//!
//! - [`TileEngine::build`] turns a view into blocks
//! - [`TileEngine::load`] fills those blocks with imagery
//! - [`ViewSession`] debounces a stream of views and cancels loads that
//!   were superseded by a newer view
//!
//! The engine is generic over [`HttpTransport`](crate::provider::HttpTransport)
//! so tests can substitute a scripted transport.

mod error;
mod loaded;
mod session;
mod tile_engine;

pub use error::EngineError;
pub use loaded::{BlockFailure, LoadedRegion};
pub use session::ViewSession;
pub use tile_engine::TileEngine;
