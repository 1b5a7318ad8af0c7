//! RAM page cache with LRU eviction
//!
//! Keeps rendered full-page bitmaps in memory, evicting the least recently
//! used page once the memory limit is reached.

use crate::error::CacheError;
use crate::TileCache;
use pageflow_render::Bitmap;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of pages currently in cache
    pub page_count: usize,

    /// Total memory used by cached bitmaps (bytes)
    pub memory_used: usize,

    /// Maximum memory allowed (bytes)
    pub memory_limit: usize,

    pub hits: u64,
    pub misses: u64,

    /// Number of pages evicted due to memory pressure
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate memory utilization (0.0 to 1.0)
    pub fn memory_utilization(&self) -> f64 {
        if self.memory_limit == 0 {
            0.0
        } else {
            self.memory_used as f64 / self.memory_limit as f64
        }
    }
}

struct CacheState {
    pages: HashMap<usize, Bitmap>,

    /// LRU queue (most recently used at back, least recently used at front)
    lru_queue: VecDeque<usize>,

    memory_used: usize,
    memory_limit: usize,
    boundaries: Option<Vec<f32>>,
    stats: CacheStats,
}

impl CacheState {
    fn new(memory_limit: usize) -> Self {
        Self {
            pages: HashMap::new(),
            lru_queue: VecDeque::new(),
            memory_used: 0,
            memory_limit,
            boundaries: None,
            stats: CacheStats {
                memory_limit,
                ..Default::default()
            },
        }
    }

    /// Mark a page as most recently used
    fn touch(&mut self, page: usize) {
        self.lru_queue.retain(|&p| p != page);
        self.lru_queue.push_back(page);
    }

    fn evict_lru(&mut self) -> Option<Bitmap> {
        let page = self.lru_queue.pop_front()?;
        let bitmap = self.pages.remove(&page)?;
        self.memory_used = self.memory_used.saturating_sub(bitmap.byte_size());
        self.stats.evictions += 1;
        self.sync_stats();
        tracing::trace!(page, "evicted page from RAM cache");
        Some(bitmap)
    }

    /// Evict pages until `required_size` more bytes fit under the limit
    fn evict_to_fit(&mut self, required_size: usize) {
        while self.memory_used + required_size > self.memory_limit && !self.pages.is_empty() {
            if self.evict_lru().is_none() {
                break;
            }
        }
    }

    fn sync_stats(&mut self) {
        self.stats.page_count = self.pages.len();
        self.stats.memory_used = self.memory_used;
    }
}

/// RAM page cache with LRU eviction
///
/// Thread-safe and cheap to clone; clones share the same storage.
///
/// # Example
///
/// ```
/// use pageflow_cache::RamTileCache;
/// use pageflow_render::Bitmap;
///
/// let cache = RamTileCache::with_mb_limit(64);
/// cache.insert(3, Bitmap::filled(100, 140, [255; 4]));
///
/// if let Some(bitmap) = cache.lookup(3) {
///     println!("Cache hit! {}x{}", bitmap.width, bitmap.height);
/// }
/// println!("Hit rate: {:.2}%", cache.stats().hit_rate() * 100.0);
/// ```
#[derive(Clone)]
pub struct RamTileCache {
    state: Arc<Mutex<CacheState>>,
}

impl RamTileCache {
    /// Create a new RAM cache with a memory limit in bytes
    pub fn new(memory_limit: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::new(memory_limit))),
        }
    }

    pub fn with_mb_limit(megabytes: usize) -> Self {
        Self::new(megabytes * 1024 * 1024)
    }

    /// Store a page bitmap, replacing any previous one for the page.
    ///
    /// A bitmap larger than the whole limit is not cached.
    pub fn insert(&self, page: usize, bitmap: Bitmap) {
        let mut state = self.state.lock().unwrap();
        let size = bitmap.byte_size();

        if let Some(old) = state.pages.remove(&page) {
            state.memory_used = state.memory_used.saturating_sub(old.byte_size());
            state.lru_queue.retain(|&p| p != page);
        }

        if size > state.memory_limit {
            state.sync_stats();
            return;
        }

        state.evict_to_fit(size);
        state.memory_used += size;
        state.pages.insert(page, bitmap);
        state.touch(page);
        state.sync_stats();
    }

    /// Retrieve a page bitmap, updating LRU order and statistics
    pub fn lookup(&self, page: usize) -> Option<Bitmap> {
        let mut state = self.state.lock().unwrap();

        if let Some(bitmap) = state.pages.get(&page).cloned() {
            state.touch(page);
            state.stats.hits += 1;
            Some(bitmap)
        } else {
            state.stats.misses += 1;
            None
        }
    }

    /// Check if a page is cached without updating LRU order
    pub fn contains(&self, page: usize) -> bool {
        self.state.lock().unwrap().pages.contains_key(&page)
    }

    pub fn remove(&self, page: usize) -> Option<Bitmap> {
        let mut state = self.state.lock().unwrap();

        let bitmap = state.pages.remove(&page)?;
        state.memory_used = state.memory_used.saturating_sub(bitmap.byte_size());
        state.lru_queue.retain(|&p| p != page);
        state.sync_stats();
        Some(bitmap)
    }

    /// Drop every cached page. Saved boundaries are kept.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.pages.clear();
        state.lru_queue.clear();
        state.memory_used = 0;
        state.sync_stats();
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().unwrap().stats
    }

    /// Update the memory limit, evicting pages if usage is now above it
    pub fn set_memory_limit(&self, new_limit: usize) {
        let mut state = self.state.lock().unwrap();
        state.memory_limit = new_limit;
        state.stats.memory_limit = new_limit;
        state.evict_to_fit(0);
    }

    pub fn memory_used(&self) -> usize {
        self.state.lock().unwrap().memory_used
    }

    pub fn page_count(&self) -> usize {
        self.state.lock().unwrap().pages.len()
    }
}

impl Default for RamTileCache {
    /// Create a cache with a default 256MB limit
    fn default() -> Self {
        Self::with_mb_limit(256)
    }
}

impl TileCache for RamTileCache {
    fn get(&self, page_index: usize) -> Result<Option<Bitmap>, CacheError> {
        Ok(self.lookup(page_index))
    }

    fn put(&self, page_index: usize, bitmap: &Bitmap) -> Result<(), CacheError> {
        self.insert(page_index, bitmap.clone());
        Ok(())
    }

    fn save_boundaries(&self, aspect_ratios: &[f32]) -> Result<(), CacheError> {
        self.state.lock().unwrap().boundaries = Some(aspect_ratios.to_vec());
        Ok(())
    }

    fn load_boundaries(&self) -> Result<Option<Vec<f32>>, CacheError> {
        Ok(self.state.lock().unwrap().boundaries.clone())
    }
}
