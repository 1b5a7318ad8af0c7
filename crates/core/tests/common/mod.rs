#![allow(dead_code)]

use pageflow_cache::{CacheError, RamTileCache, TileCache};
use pageflow_render::{
    Bitmap, PageInfo, PageInfoProvider, RenderError, RenderResult, Renderer, SyntheticDocument,
};
use pageflow_scheduler::{CancellationToken, FragmentRegion};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Scriptable renderer: counts calls, can hold renders back, can fail.
#[derive(Clone)]
pub struct MockRenderer {
    state: Arc<MockState>,
}

struct MockState {
    aspect_ratios: Vec<f32>,
    opens: AtomicUsize,
    fail_open: AtomicBool,
    blocked: AtomicBool,
    failures_left: AtomicUsize,
    full_started: AtomicUsize,
    full_finished: AtomicUsize,
    full_sizes: Mutex<Vec<(usize, u32, u32)>>,
    fragments: Mutex<Vec<(usize, FragmentRegion, f32)>>,
    fragment_scale: Mutex<f32>,
}

impl MockRenderer {
    pub fn new(aspect_ratios: Vec<f32>) -> Self {
        Self {
            state: Arc::new(MockState {
                aspect_ratios,
                opens: AtomicUsize::new(0),
                fail_open: AtomicBool::new(false),
                blocked: AtomicBool::new(false),
                failures_left: AtomicUsize::new(0),
                full_started: AtomicUsize::new(0),
                full_finished: AtomicUsize::new(0),
                full_sizes: Mutex::new(Vec::new()),
                fragments: Mutex::new(Vec::new()),
                fragment_scale: Mutex::new(1.0),
            }),
        }
    }

    pub fn uniform(count: usize, aspect_ratio: f32) -> Self {
        Self::new(vec![aspect_ratio; count])
    }

    /// Hold full-page renders until [`release`](Self::release). Held renders
    /// ignore their token, like a rasterizer stuck in a native call.
    pub fn block(&self) {
        self.state.blocked.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.state.blocked.store(false, Ordering::SeqCst);
    }

    /// Shrink fragment bitmaps, like a rasterizer keeping them in budget.
    pub fn scale_fragments(&self, scale: f32) {
        *self.state.fragment_scale.lock().unwrap() = scale;
    }

    pub fn fail_next(&self, count: usize) {
        self.state.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn fail_open(&self) {
        self.state.fail_open.store(true, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn full_started(&self) -> usize {
        self.state.full_started.load(Ordering::SeqCst)
    }

    pub fn full_finished(&self) -> usize {
        self.state.full_finished.load(Ordering::SeqCst)
    }

    pub fn full_sizes(&self) -> Vec<(usize, u32, u32)> {
        self.state.full_sizes.lock().unwrap().clone()
    }

    pub fn fragments(&self) -> Vec<(usize, FragmentRegion, f32)> {
        self.state.fragments.lock().unwrap().clone()
    }
}

impl Renderer for MockRenderer {
    fn render_page(
        &self,
        index: usize,
        width: u32,
        height: u32,
        _token: &CancellationToken,
    ) -> RenderResult<Bitmap> {
        self.state.full_started.fetch_add(1, Ordering::SeqCst);
        while self.state.blocked.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        self.state.full_sizes.lock().unwrap().push((index, width, height));

        let failing = self
            .state
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        let result = if failing {
            Err(RenderError::Raster("injected failure".into()))
        } else {
            Ok(Bitmap::filled(width, height, SyntheticDocument::page_color(index)))
        };

        self.state.full_finished.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn render_fragment(
        &self,
        index: usize,
        _page_width: f32,
        _page_height: f32,
        region: FragmentRegion,
        zoom: f32,
        token: &CancellationToken,
    ) -> RenderResult<Bitmap> {
        if token.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        self.state.fragments.lock().unwrap().push((index, region, zoom));

        let density = zoom * *self.state.fragment_scale.lock().unwrap();
        let width = (region.width() * density).round().max(1.0) as u32;
        let height = (region.height() * density).round().max(1.0) as u32;
        Ok(Bitmap::filled(width, height, SyntheticDocument::page_color(index)))
    }
}

impl PageInfoProvider for MockRenderer {
    fn open(&self) -> RenderResult<Box<dyn PageInfo + '_>> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(RenderError::Open("unreadable document".into()));
        }
        Ok(Box::new(MockPageInfo { state: &self.state }))
    }
}

struct MockPageInfo<'a> {
    state: &'a MockState,
}

impl PageInfo for MockPageInfo<'_> {
    fn page_count(&self) -> usize {
        self.state.aspect_ratios.len()
    }

    fn aspect_ratio(&mut self, index: usize) -> RenderResult<f32> {
        self.state
            .aspect_ratios
            .get(index)
            .copied()
            .ok_or(RenderError::InvalidPageIndex {
                index,
                page_count: self.state.aspect_ratios.len(),
            })
    }
}

/// RAM cache that counts writes
pub struct RecordingCache {
    pub inner: RamTileCache,
    puts: AtomicUsize,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self {
            inner: RamTileCache::with_mb_limit(16),
            puts: AtomicUsize::new(0),
        }
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

impl TileCache for RecordingCache {
    fn get(&self, page_index: usize) -> Result<Option<Bitmap>, CacheError> {
        self.inner.get(page_index)
    }

    fn put(&self, page_index: usize, bitmap: &Bitmap) -> Result<(), CacheError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(page_index, bitmap)
    }

    fn save_boundaries(&self, aspect_ratios: &[f32]) -> Result<(), CacheError> {
        self.inner.save_boundaries(aspect_ratios)
    }

    fn load_boundaries(&self) -> Result<Option<Vec<f32>>, CacheError> {
        self.inner.load_boundaries()
    }
}

/// Run `step` until it returns true or five seconds pass.
pub fn wait_for(mut step: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if step() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    step()
}

/// Give workers a moment to pick up anything that was (wrongly) queued.
pub fn settle() {
    thread::sleep(Duration::from_millis(50));
}

/// Route engine logs to the test output; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
