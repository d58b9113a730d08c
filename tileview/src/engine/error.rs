//! Engine construction errors.

use thiserror::Error;

use crate::cache::CacheTierError;
use crate::config::ConfigFileError;
use crate::provider::ProviderError;

/// Why an engine could not be created.
///
/// Once running, the engine reports per-block failures in
/// [`LoadedRegion::failures`](super::LoadedRegion::failures) instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigFileError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheTierError),
}
