//! Persistent disk cache for page bitmaps with LRU eviction.
//!
//! Each page lives in its own file (`<page as hex>.tile`): an 8 byte header
//! holding width and height as little-endian `u32`, followed by raw RGBA
//! pixels. Page aspect ratios are kept next to the bitmaps in
//! `boundaries.json` so a reopened document can lay out before the document
//! itself is opened.

use crate::error::CacheError;
use crate::TileCache;
use pageflow_render::{Bitmap, BYTES_PER_PIXEL};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const HEADER_LEN: usize = 8;
const TILE_EXTENSION: &str = "tile";
const BOUNDARIES_FILE: &str = "boundaries.json";

/// Statistics for monitoring disk cache performance
#[derive(Debug, Clone, Default)]
pub struct DiskCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Number of pages evicted to free space
    pub evictions: u64,
    pub page_count: usize,
    /// Total disk space used in bytes, headers included
    pub disk_used: usize,
}

impl DiskCacheStats {
    /// Calculate cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate disk utilization (0.0 to 1.0)
    pub fn disk_utilization(&self, limit: usize) -> f64 {
        if limit == 0 {
            0.0
        } else {
            self.disk_used as f64 / limit as f64
        }
    }
}

#[derive(Serialize, Deserialize)]
struct BoundariesFile {
    aspect_ratios: Vec<f32>,
}

struct CacheState {
    /// Page index to (file path, file size)
    entries: HashMap<usize, (PathBuf, usize)>,
    /// LRU queue: front = least recently used, back = most recently used
    lru_queue: VecDeque<usize>,
    stats: DiskCacheStats,
    disk_limit: usize,
    cache_dir: PathBuf,
}

impl CacheState {
    fn touch(&mut self, page: usize) {
        self.lru_queue.retain(|&p| p != page);
        self.lru_queue.push_back(page);
    }

    fn forget(&mut self, page: usize) -> Option<PathBuf> {
        let (path, size) = self.entries.remove(&page)?;
        self.lru_queue.retain(|&p| p != page);
        self.stats.disk_used = self.stats.disk_used.saturating_sub(size);
        self.stats.page_count = self.entries.len();
        Some(path)
    }

    fn evict_lru(&mut self) -> io::Result<()> {
        let Some(page) = self.lru_queue.pop_front() else {
            return Ok(());
        };
        if let Some((path, size)) = self.entries.remove(&page) {
            self.stats.disk_used = self.stats.disk_used.saturating_sub(size);
            self.stats.page_count = self.entries.len();
            self.stats.evictions += 1;
            remove_if_exists(&path)?;
            tracing::trace!(page, "evicted page from disk cache");
        }
        Ok(())
    }

    /// Evict entries until `needed_space` more bytes fit under the limit
    fn evict_until_space_available(&mut self, needed_space: usize) -> io::Result<()> {
        while self.stats.disk_used + needed_space > self.disk_limit && !self.lru_queue.is_empty() {
            self.evict_lru()?;
        }
        Ok(())
    }
}

/// Persistent disk cache for page bitmaps
///
/// Thread-safe; clones share the same state.
#[derive(Clone)]
pub struct DiskTileCache {
    state: Arc<Mutex<CacheState>>,
}

impl DiskTileCache {
    /// Create a disk cache in `cache_dir`, creating the directory if needed.
    ///
    /// Pages already present in the directory are picked up.
    pub fn new<P: AsRef<Path>>(cache_dir: P, disk_limit: usize) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;

        let cache = Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                lru_queue: VecDeque::new(),
                stats: DiskCacheStats::default(),
                disk_limit,
                cache_dir,
            })),
        };
        cache.load_from_disk()?;
        Ok(cache)
    }

    pub fn with_mb_limit<P: AsRef<Path>>(
        cache_dir: P,
        megabytes: usize,
    ) -> Result<Self, CacheError> {
        Self::new(cache_dir, megabytes * 1024 * 1024)
    }

    fn page_path(cache_dir: &Path, page: usize) -> PathBuf {
        cache_dir.join(format!("{:08x}.{}", page, TILE_EXTENSION))
    }

    /// Write a page bitmap, replacing any previous file for the page.
    ///
    /// Least recently used pages are evicted to make room; a bitmap larger
    /// than the whole limit is not written.
    pub fn store(&self, page: usize, bitmap: &Bitmap) -> Result<(), CacheError> {
        let mut state = self.state.lock().unwrap();
        let file_size = bitmap.byte_size() + HEADER_LEN;

        if let Some(old_path) = state.forget(page) {
            remove_if_exists(&old_path)?;
        }

        if file_size > state.disk_limit {
            return Ok(());
        }

        state.evict_until_space_available(file_size)?;

        let path = Self::page_path(&state.cache_dir, page);
        let mut file = File::create(&path)?;
        file.write_all(&bitmap.width.to_le_bytes())?;
        file.write_all(&bitmap.height.to_le_bytes())?;
        file.write_all(&bitmap.pixels)?;
        file.sync_all()?;

        state.entries.insert(page, (path, file_size));
        state.lru_queue.push_back(page);
        state.stats.disk_used += file_size;
        state.stats.page_count = state.entries.len();
        Ok(())
    }

    /// Read a page bitmap, updating LRU order on a hit.
    ///
    /// A file that does not decode is removed and reported as
    /// [`CacheError::Corrupt`].
    pub fn load(&self, page: usize) -> Result<Option<Bitmap>, CacheError> {
        let mut state = self.state.lock().unwrap();

        let path = match state.entries.get(&page) {
            Some((path, _)) => path.clone(),
            None => {
                state.stats.misses += 1;
                return Ok(None);
            }
        };

        match read_bitmap(&path)? {
            Some(bitmap) => {
                state.touch(page);
                state.stats.hits += 1;
                Ok(Some(bitmap))
            }
            None => {
                state.forget(page);
                remove_if_exists(&path)?;
                state.stats.misses += 1;
                Err(CacheError::Corrupt { path })
            }
        }
    }

    /// Check if a page is cached without updating LRU order
    pub fn contains(&self, page: usize) -> bool {
        self.state.lock().unwrap().entries.contains_key(&page)
    }

    pub fn remove(&self, page: usize) -> Result<(), CacheError> {
        let mut state = self.state.lock().unwrap();
        if let Some(path) = state.forget(page) {
            remove_if_exists(&path)?;
        }
        Ok(())
    }

    /// Remove every cached page. Saved boundaries are kept.
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut state = self.state.lock().unwrap();

        for (_, (path, _)) in state.entries.drain() {
            remove_if_exists(&path)?;
        }
        state.lru_queue.clear();
        state.stats.page_count = 0;
        state.stats.disk_used = 0;
        Ok(())
    }

    pub fn stats(&self) -> DiskCacheStats {
        self.state.lock().unwrap().stats.clone()
    }

    pub fn disk_limit(&self) -> usize {
        self.state.lock().unwrap().disk_limit
    }

    pub fn disk_used(&self) -> usize {
        self.state.lock().unwrap().stats.disk_used
    }

    pub fn page_count(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.state.lock().unwrap().cache_dir.clone()
    }

    /// Update disk space limit, evicting pages if usage is now above it
    pub fn set_disk_limit(&self, new_limit: usize) -> Result<(), CacheError> {
        let mut state = self.state.lock().unwrap();
        state.disk_limit = new_limit;
        state.evict_until_space_available(0)?;
        Ok(())
    }

    /// Rebuild the index from the files in the cache directory.
    ///
    /// Files are ordered oldest-modified first so eviction after a restart
    /// still drops the stalest pages.
    pub fn load_from_disk(&self) -> Result<(), CacheError> {
        let mut state = self.state.lock().unwrap();

        state.entries.clear();
        state.lru_queue.clear();
        state.stats.page_count = 0;
        state.stats.disk_used = 0;

        let mut found = Vec::new();
        for entry in fs::read_dir(&state.cache_dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) != Some(TILE_EXTENSION) {
                continue;
            }
            let Some(page) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|stem| usize::from_str_radix(stem, 16).ok())
            else {
                continue;
            };

            let metadata = entry.metadata()?;
            let modified = metadata.modified().ok();
            found.push((modified, page, path, metadata.len() as usize));
        }

        found.sort_by_key(|(modified, page, _, _)| (*modified, *page));
        for (_, page, path, size) in found {
            state.entries.insert(page, (path, size));
            state.lru_queue.push_back(page);
            state.stats.disk_used += size;
        }
        state.stats.page_count = state.entries.len();

        tracing::debug!(
            pages = state.stats.page_count,
            bytes = state.stats.disk_used,
            dir = %state.cache_dir.display(),
            "loaded disk cache index"
        );
        state.evict_until_space_available(0)?;
        Ok(())
    }

    fn boundaries_path(&self) -> PathBuf {
        self.state.lock().unwrap().cache_dir.join(BOUNDARIES_FILE)
    }
}

impl TileCache for DiskTileCache {
    fn get(&self, page_index: usize) -> Result<Option<Bitmap>, CacheError> {
        self.load(page_index)
    }

    fn put(&self, page_index: usize, bitmap: &Bitmap) -> Result<(), CacheError> {
        self.store(page_index, bitmap)
    }

    fn save_boundaries(&self, aspect_ratios: &[f32]) -> Result<(), CacheError> {
        let json = serde_json::to_vec(&BoundariesFile {
            aspect_ratios: aspect_ratios.to_vec(),
        })?;
        fs::write(self.boundaries_path(), json)?;
        Ok(())
    }

    fn load_boundaries(&self) -> Result<Option<Vec<f32>>, CacheError> {
        let json = match fs::read(self.boundaries_path()) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: BoundariesFile = serde_json::from_slice(&json)?;
        Ok(Some(file.aspect_ratios))
    }
}

/// Read one page file; `None` if its contents are malformed
fn read_bitmap(path: &Path) -> io::Result<Option<Bitmap>> {
    let mut file = File::open(path)?;

    let mut header = [0u8; HEADER_LEN];
    if file.read_exact(&mut header).is_err() {
        return Ok(None);
    }
    let width = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let height = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let expected = width as u64 * height as u64 * BYTES_PER_PIXEL;
    let mut pixels = Vec::with_capacity(expected as usize);
    file.read_to_end(&mut pixels)?;

    Ok(Bitmap::from_rgba(width, height, pixels))
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
