//! RAM in front of disk

use crate::disk::DiskTileCache;
use crate::error::CacheError;
use crate::ram::RamTileCache;
use crate::TileCache;
use pageflow_render::Bitmap;

/// Two-level page cache.
///
/// Lookups try RAM first and promote disk hits into RAM. Writes go to both
/// levels. Boundaries are persisted on disk and mirrored in RAM.
#[derive(Clone)]
pub struct LayeredCache {
    ram: RamTileCache,
    disk: DiskTileCache,
}

impl LayeredCache {
    pub fn new(ram: RamTileCache, disk: DiskTileCache) -> Self {
        Self { ram, disk }
    }

    pub fn ram(&self) -> &RamTileCache {
        &self.ram
    }

    pub fn disk(&self) -> &DiskTileCache {
        &self.disk
    }
}

impl TileCache for LayeredCache {
    fn get(&self, page_index: usize) -> Result<Option<Bitmap>, CacheError> {
        if let Some(bitmap) = self.ram.lookup(page_index) {
            return Ok(Some(bitmap));
        }

        let bitmap = self.disk.load(page_index)?;
        if let Some(bitmap) = &bitmap {
            self.ram.insert(page_index, bitmap.clone());
        }
        Ok(bitmap)
    }

    fn put(&self, page_index: usize, bitmap: &Bitmap) -> Result<(), CacheError> {
        self.ram.insert(page_index, bitmap.clone());
        self.disk.store(page_index, bitmap)
    }

    fn save_boundaries(&self, aspect_ratios: &[f32]) -> Result<(), CacheError> {
        self.ram.save_boundaries(aspect_ratios)?;
        self.disk.save_boundaries(aspect_ratios)
    }

    fn load_boundaries(&self) -> Result<Option<Vec<f32>>, CacheError> {
        if let Some(boundaries) = self.ram.load_boundaries()? {
            return Ok(Some(boundaries));
        }
        let boundaries = self.disk.load_boundaries()?;
        if let Some(boundaries) = &boundaries {
            self.ram.save_boundaries(boundaries)?;
        }
        Ok(boundaries)
    }
}
