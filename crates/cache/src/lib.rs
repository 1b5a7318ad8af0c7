//! Pageflow Cache Library
//!
//! Full-page bitmap caches with LRU eviction: in RAM, on disk, and the two
//! layered. Each cache also remembers the document's page boundaries (aspect
//! ratios) so a reopened document can lay out without being parsed.

mod config;
mod disk;
mod error;
mod layered;
mod ram;

pub use config::CacheConfig;
pub use disk::{DiskCacheStats, DiskTileCache};
pub use error::{CacheError, ConfigError};
pub use layered::LayeredCache;
pub use ram::{CacheStats, RamTileCache};

use pageflow_render::Bitmap;

/// Persistent shortcut for rendered pages and page boundaries.
///
/// Bitmaps are keyed by page index only; a cached bitmap may be at a
/// different size than the one currently wanted, so callers compare sizes.
pub trait TileCache: Send + Sync {
    fn get(&self, page_index: usize) -> Result<Option<Bitmap>, CacheError>;

    fn put(&self, page_index: usize, bitmap: &Bitmap) -> Result<(), CacheError>;

    /// Persist the aspect ratio (height / width) of every page.
    fn save_boundaries(&self, aspect_ratios: &[f32]) -> Result<(), CacheError>;

    fn load_boundaries(&self) -> Result<Option<Vec<f32>>, CacheError>;
}
