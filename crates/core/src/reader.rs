//! The reader facade handed to the UI layer
//!
//! A [`Reader`] ties a [`ViewportController`] to a [`TileEngine`]: every
//! gesture or layout change goes to the controller, and whenever the
//! published layout changes the engine is told which pages and fragments
//! are now wanted. All time comes from an injectable [`Clock`].

use crate::config::ReaderConfig;
use crate::engine::{page_demands, EngineConfig, TileEngine};
use crate::error::{ReaderError, ReaderResult};
use crate::loader::{DocumentLoader, LoadingState};
use crate::page::PageRuntime;
use pageflow_cache::TileCache;
use pageflow_render::{PageInfoProvider, Renderer};
use pageflow_scheduler::{Clock, SystemClock};
use std::sync::Arc;
use tracing::{info, warn};
use viewer_core::{
    Anchor, LayoutState, Orientation, Size, SubscriptionId, Vec2, ViewerSnapshot,
    ViewportController, ViewportError,
};

/// Builder for [`Reader`].
///
/// # Example
///
/// ```
/// use pageflow_core::{Reader, ReaderConfig};
/// use pageflow_render::{GatedRenderer, SyntheticDocument};
/// use viewer_core::Size;
///
/// let renderer = GatedRenderer::new(SyntheticDocument::uniform(10, 1.4));
/// let mut reader = Reader::builder(renderer)
///     .with_config(ReaderConfig::new().with_worker_threads(1).with_initial_page(4))
///     .open()
///     .unwrap();
///
/// reader.on_viewport_resize(Size::new(800.0, 600.0));
/// assert_eq!(reader.snapshot().anchor.map(|a| a.page_index), Some(4));
/// reader.dispose();
/// ```
pub struct ReaderBuilder<'a, R> {
    renderer: R,
    config: ReaderConfig,
    cache: Option<Arc<dyn TileCache>>,
    document_key: Option<String>,
    clock: Option<Arc<dyn Clock>>,
    on_progress: Option<Box<dyn FnMut(LoadingState) + 'a>>,
}

impl<'a, R> ReaderBuilder<'a, R>
where
    R: Renderer + PageInfoProvider + 'static,
{
    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `cache` instead of building one from the configuration.
    pub fn with_cache(mut self, cache: Arc<dyn TileCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Key (path or URI) of the document, used to pick its cache directory
    /// when caching is configured.
    pub fn with_document_key(mut self, key: impl Into<String>) -> Self {
        self.document_key = Some(key.into());
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Called while page boundaries are read.
    pub fn with_progress(mut self, on_progress: impl FnMut(LoadingState) + 'a) -> Self {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    /// Read the page boundaries and start the render workers.
    ///
    /// # Errors
    ///
    /// - [`ReaderError::Config`] if the configuration is invalid
    /// - [`ReaderError::DocumentOpen`] if the document cannot be read
    /// - [`ReaderError::WorkerSpawn`] if worker threads cannot be started
    pub fn open(self) -> ReaderResult<Reader> {
        let ReaderBuilder {
            renderer,
            config,
            cache,
            document_key,
            clock,
            on_progress,
        } = self;

        config.validate()?;

        let cache = cache.or_else(|| {
            let cache_config = config.cache.as_ref()?;
            let key = document_key.as_deref()?;
            match cache_config.open_document_cache(key) {
                Ok(cache) => Some(Arc::new(cache) as Arc<dyn TileCache>),
                Err(err) => {
                    warn!(error = %err, "page cache unavailable, rendering uncached");
                    None
                }
            }
        });

        let renderer = Arc::new(renderer);
        let mut loader = DocumentLoader::new(&*renderer);
        if let Some(cache) = cache.as_deref() {
            loader = loader.with_cache(cache);
        }
        if let Some(on_progress) = on_progress {
            loader = loader.with_progress(on_progress);
        }
        let pages = loader.load().map_err(ReaderError::DocumentOpen)?;
        let page_count = pages.len();

        let mut controller = ViewportController::new(config.viewer_config(), pages);
        if let Some(page) = config.initial_page.filter(|page| *page < page_count) {
            controller.set_anchor(Anchor::page_start(page));
        }

        let engine = TileEngine::new(renderer, cache.clone(), EngineConfig::from(&config))
            .map_err(ReaderError::WorkerSpawn)?;

        info!(pages = page_count, cached = cache.is_some(), "document opened");
        Ok(Reader {
            config,
            clock: clock.unwrap_or_else(|| Arc::new(SystemClock::new()) as Arc<dyn Clock>),
            controller,
            engine,
            synced: None,
        })
    }
}

/// An open document: viewport state plus rendered pages.
///
/// Drive it from one thread. Feed input events to the gesture methods, call
/// [`tick`](Self::tick) every frame while [`needs_frame`](Self::needs_frame)
/// is true, and draw [`state`](Self::state) with the bitmaps of
/// [`page`](Self::page).
pub struct Reader {
    config: ReaderConfig,
    clock: Arc<dyn Clock>,
    controller: ViewportController,
    engine: TileEngine,
    /// Layout the engine was last updated with
    synced: Option<Arc<LayoutState>>,
}

impl Reader {
    pub fn builder<'a, R>(renderer: R) -> ReaderBuilder<'a, R>
    where
        R: Renderer + PageInfoProvider + 'static,
    {
        ReaderBuilder {
            renderer,
            config: ReaderConfig::default(),
            cache: None,
            document_key: None,
            clock: None,
            on_progress: None,
        }
    }

    /// Open with `config` and no explicit cache.
    pub fn open<R>(renderer: R, config: ReaderConfig) -> ReaderResult<Self>
    where
        R: Renderer + PageInfoProvider + 'static,
    {
        Self::builder(renderer).with_config(config).open()
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn state(&self) -> Arc<LayoutState> {
        self.controller.state()
    }

    pub fn page_count(&self) -> usize {
        self.controller.page_count()
    }

    pub fn controller(&self) -> &ViewportController {
        &self.controller
    }

    pub fn engine(&self) -> &TileEngine {
        &self.engine
    }

    /// Render state of a loaded page
    pub fn page(&self, index: usize) -> Option<&PageRuntime> {
        self.engine.page(index)
    }

    pub fn visible_pages(&self) -> Vec<usize> {
        self.controller.visible_pages()
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: Fn(&Arc<LayoutState>) + Send + Sync + 'static,
    {
        self.controller.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.controller.unsubscribe(id)
    }

    // Gestures

    pub fn on_pan_start(&mut self) {
        self.controller.on_pan_start();
    }

    pub fn on_pan(&mut self, delta: Vec2) -> bool {
        let now = self.clock.now_ms();
        let changed = self.controller.on_pan(delta, now);
        self.sync(now);
        changed
    }

    pub fn on_pan_end(&mut self) -> bool {
        let now = self.clock.now_ms();
        self.controller.on_pan_end(now)
    }

    pub fn on_zoom(&mut self, factor: f32, centroid: Vec2) -> bool {
        let changed = self.controller.on_zoom(factor, centroid);
        self.sync(self.clock.now_ms());
        changed
    }

    pub fn on_double_tap(&mut self, centroid: Vec2) -> bool {
        let now = self.clock.now_ms();
        self.controller.on_double_tap(centroid, now)
    }

    // Layout

    pub fn on_viewport_resize(&mut self, viewport: Size) -> bool {
        let spacing = self.controller.state().spacing;
        self.relayout(|controller| controller.on_viewport_resize(viewport, spacing))
    }

    pub fn set_spacing(&mut self, spacing: f32) -> bool {
        self.relayout(|controller| controller.set_spacing(spacing))
    }

    pub fn set_orientation(&mut self, orientation: Orientation) -> bool {
        let changed = self.controller.set_orientation(orientation);
        if changed {
            self.engine.clear_fragments();
            self.engine.invalidate_full_bitmaps();
        }
        self.sync(self.clock.now_ms());
        changed
    }

    /// Jump to the start of page `index`.
    ///
    /// # Errors
    ///
    /// [`ViewportError::InvalidPageIndex`] if `index` is out of range; the
    /// position is left untouched.
    pub fn scroll_to_page(&mut self, index: usize) -> Result<(), ViewportError> {
        self.controller.scroll_to_page(index)?;
        self.sync(self.clock.now_ms());
        Ok(())
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        self.controller.snapshot()
    }

    /// Return to a saved position. Before the first layout the position is
    /// kept pending and applied once the viewport is measured.
    pub fn restore(&mut self, snapshot: &ViewerSnapshot) {
        let orientation = self.controller.state().orientation;
        self.controller.restore(snapshot);
        if orientation != snapshot.orientation {
            self.engine.clear_fragments();
            self.engine.invalidate_full_bitmaps();
        }
        self.sync(self.clock.now_ms());
    }

    // Frames

    /// Advance animations, start due renders and apply finished ones.
    /// Returns `true` when something on screen changed.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now_ms();
        let moved = self.controller.tick(now);
        self.sync(now);
        let rendered = self.engine.tick(now);
        moved || rendered
    }

    /// Whether [`tick`](Self::tick) still has work to do
    pub fn needs_frame(&self) -> bool {
        self.controller.is_animating() || self.engine.has_pending_work()
    }

    /// Cancel all rendering and release the document.
    pub fn dispose(&mut self) {
        self.controller.cancel_animations();
        self.engine.dispose();
        self.synced = None;
        info!("reader disposed");
    }

    fn relayout(&mut self, change: impl FnOnce(&mut ViewportController) -> bool) -> bool {
        let changed = change(&mut self.controller);
        if changed {
            self.engine.invalidate_full_bitmaps();
        }
        self.sync(self.clock.now_ms());
        changed
    }

    /// Push the current layout to the engine if it changed since last time.
    fn sync(&mut self, now_ms: u64) {
        let state = self.controller.state();
        if self
            .synced
            .as_ref()
            .is_some_and(|synced| Arc::ptr_eq(synced, &state))
        {
            return;
        }

        let demands = page_demands(&state, self.config.prefetch_margin);
        self.engine.update(&demands, now_ms);
        self.synced = Some(state);
    }
}
