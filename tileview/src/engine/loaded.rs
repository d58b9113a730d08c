//! Result of loading a region's imagery.

use crate::coord::PixelPoint;
use crate::fetch::FetchError;
use crate::region::{ChangeKind, MapBlock};

/// A block whose imagery could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFailure {
    pub fragment_id: String,
    pub error: FetchError,
}

/// Blocks of one build with their imagery, in grid order.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRegion {
    /// Every block of the build; `image()` is `None` for failed blocks.
    pub blocks: Vec<MapBlock>,
    pub failures: Vec<BlockFailure>,
    /// Screen offset of the first block, from the build.
    pub offset: PixelPoint,
    /// Draw-time rotation in degrees, `(360 - heading) mod 360`, from the build.
    pub rotation: f64,
    pub change: ChangeKind,
    /// The load was cancelled before every block finished.
    pub cancelled: bool,
}

impl LoadedRegion {
    pub fn loaded_count(&self) -> usize {
        self.blocks.iter().filter(|block| block.is_loaded()).count()
    }

    /// Every block has imagery.
    pub fn is_complete(&self) -> bool {
        self.blocks.iter().all(MapBlock::is_loaded)
    }

    pub fn failure(&self, fragment_id: &str) -> Option<&FetchError> {
        self.failures
            .iter()
            .find(|failure| failure.fragment_id == fragment_id)
            .map(|failure| &failure.error)
    }
}
