//! Page tile engine
//!
//! Keeps one [`PageRuntime`] per loaded page and drives two render streams
//! for each: a full-page bitmap at layout resolution and a high-resolution
//! fragment of the visible sub-rect while zoomed in. Both streams are
//! debounced and cancellable. Jobs run on a [`WorkerPool`]; results come
//! back over a channel and are applied only in [`TileEngine::tick`], so all
//! page state is mutated from the thread that owns the engine.
//!
//! Every dispatched job carries a generation. Superseding a stream cancels
//! its job and moves the accepted generation on, so late results of an old
//! job are dropped and the caller never sees overlapping output for a page.

use crate::config::ReaderConfig;
use crate::page::{Fragment, FragmentDemand, PageDemand, PageRuntime, PageStatus};
use flume::{Receiver, Sender};
use pageflow_cache::TileCache;
use pageflow_render::{fit_to_budget, Bitmap, RenderError, Renderer};
use pageflow_scheduler::{
    CancellationToken, Job, JobExecutor, JobPriority, JobScheduler, JobType, SchedulerStats,
    WorkerPool, WorkerPoolConfig,
};
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use tracing::{debug, info, warn};
use viewer_core::{loaded_pages, visible_fragment, visible_pages, LayoutState};

/// Tunables of the tile engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub full_page_debounce_ms: u64,
    pub fragment_debounce_ms: u64,
    pub workers: WorkerPoolConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&ReaderConfig::default())
    }
}

impl From<&ReaderConfig> for EngineConfig {
    fn from(config: &ReaderConfig) -> Self {
        Self {
            full_page_debounce_ms: config.full_page_debounce_ms,
            fragment_debounce_ms: config.fragment_debounce_ms,
            workers: config.worker_pool_config(),
        }
    }
}

/// Which stream of a page a result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Full,
    Fragment,
}

/// Worker-to-engine message
#[derive(Debug)]
enum RenderOutcome {
    Full {
        page: usize,
        generation: u64,
        bitmap: Bitmap,
        /// Served from the cache; a fresh render of the same job follows
        cached: bool,
    },
    Fragment {
        page: usize,
        generation: u64,
        bitmap: Bitmap,
    },
    Failed {
        page: usize,
        generation: u64,
        stream: Stream,
        error: RenderError,
    },
}

/// Submits jobs and hands out generations
struct Dispatcher {
    scheduler: Arc<JobScheduler>,
    next_generation: u64,
}

impl Dispatcher {
    fn generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn priority(page: &PageRuntime) -> JobPriority {
        if page.visible {
            JobPriority::Visible
        } else {
            JobPriority::Prefetch
        }
    }

    fn full(&mut self, page: &mut PageRuntime, size: (u32, u32)) {
        if let Some(job) = page.full.job.take() {
            self.scheduler.cancel_job(job);
            debug!(page = page.index(), "superseded full page render");
        }

        let generation = self.generation();
        let (job, _) = self.scheduler.submit(
            Self::priority(page),
            JobType::RenderPage {
                page_index: page.index(),
                width: size.0,
                height: size.1,
                generation,
            },
        );
        debug!(
            page = page.index(),
            width = size.0,
            height = size.1,
            generation,
            "dispatched full page render"
        );

        page.full.job = Some(job);
        page.full.live = Some(generation);
        page.full.requested = Some(size);
    }

    fn fragment(&mut self, page: &mut PageRuntime, demand: FragmentDemand) {
        if let Some(job) = page.fragments.job.take() {
            self.scheduler.cancel_job(job);
            debug!(page = page.index(), "superseded fragment render");
        }

        let generation = self.generation();
        let (job, _) = self.scheduler.submit(
            JobPriority::Visible,
            JobType::RenderFragment {
                page_index: page.index(),
                page_width: demand.page_width,
                page_height: demand.page_height,
                region: demand.region(),
                zoom: demand.zoom,
                generation,
            },
        );
        debug!(
            page = page.index(),
            zoom = demand.zoom,
            generation,
            "dispatched fragment render"
        );

        page.fragments.job = Some(job);
        page.fragments.live = Some(generation);
        page.fragments.requested = Some(demand);
        page.deferred_fragment = None;
    }
}

/// Asynchronous, debounced, cancellable renderer of page bitmaps.
///
/// The owner feeds it the current set of page demands with
/// [`update`](Self::update) whenever the layout changes and calls
/// [`tick`](Self::tick) once per frame.
///
/// # Example
///
/// ```
/// use pageflow_core::{EngineConfig, PageDemand, TileEngine};
/// use pageflow_render::{GatedRenderer, SyntheticDocument};
/// use std::sync::Arc;
///
/// let renderer = Arc::new(GatedRenderer::new(SyntheticDocument::uniform(2, 1.4)));
/// let mut engine = TileEngine::new(renderer, None, EngineConfig::default()).unwrap();
///
/// engine.update(
///     &[PageDemand { index: 0, width: 100, height: 140, visible: true, fragment: None }],
///     0,
/// );
/// // ... call engine.tick(now) every frame and draw engine.page(0)
/// engine.dispose();
/// ```
pub struct TileEngine {
    config: EngineConfig,
    dispatcher: Dispatcher,
    pool: Option<WorkerPool>,
    results: Receiver<RenderOutcome>,
    pages: HashMap<usize, PageRuntime>,
}

impl TileEngine {
    /// Start the render workers.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a worker thread cannot be spawned.
    pub fn new(
        renderer: Arc<dyn Renderer>,
        cache: Option<Arc<dyn TileCache>>,
        config: EngineConfig,
    ) -> io::Result<Self> {
        let scheduler = Arc::new(JobScheduler::new());
        let (sender, results) = flume::unbounded();
        let executor = executor(renderer, cache, sender);
        let pool = WorkerPool::new(scheduler.clone(), executor, config.workers.clone())?;

        Ok(Self {
            config,
            dispatcher: Dispatcher {
                scheduler,
                next_generation: 0,
            },
            pool: Some(pool),
            results,
            pages: HashMap::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn page(&self, index: usize) -> Option<&PageRuntime> {
        self.pages.get(&index)
    }

    /// Indices of all loaded pages, ascending
    pub fn loaded_pages(&self) -> Vec<usize> {
        let mut pages: Vec<usize> = self.pages.keys().copied().collect();
        pages.sort_unstable();
        pages
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.dispatcher.scheduler.stats()
    }

    /// Whether any render is queued, running or waiting for its window
    pub fn has_pending_work(&self) -> bool {
        self.pages.values().any(PageRuntime::is_busy)
    }

    /// Earliest time a debounced render becomes due
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.pages
            .values()
            .flat_map(|page| {
                [
                    page.full.debounce.deadline_ms(),
                    page.fragments.debounce.deadline_ms(),
                ]
            })
            .flatten()
            .min()
    }

    pub fn is_disposed(&self) -> bool {
        self.pool.is_none()
    }

    /// Apply the current page demands.
    ///
    /// Pages missing from `demands` are disposed and their work cancelled.
    /// A page seen for the first time renders immediately; later size
    /// changes wait for the full-page debounce window. Fragment changes
    /// always wait for the fragment window.
    pub fn update(&mut self, demands: &[PageDemand], now_ms: u64) {
        if self.is_disposed() {
            return;
        }

        let wanted: HashSet<usize> = demands.iter().map(|demand| demand.index).collect();
        let scheduler = &self.dispatcher.scheduler;
        self.pages.retain(|index, page| {
            let keep = wanted.contains(index);
            if !keep {
                page.dispose(scheduler);
                debug!(page = *index, "page unloaded");
            }
            keep
        });

        for demand in demands {
            let fresh = !self.pages.contains_key(&demand.index);
            let page = self
                .pages
                .entry(demand.index)
                .or_insert_with(|| PageRuntime::new(demand.index));
            page.visible = demand.visible;

            let size = (demand.width.max(1), demand.height.max(1));
            if fresh {
                self.dispatcher.full(page, size);
            } else {
                page.full.submit(size, now_ms, self.config.full_page_debounce_ms);
            }

            match demand.fragment {
                Some(fragment) if page.covers(&fragment) => {
                    page.clear_fragment(&self.dispatcher.scheduler);
                    page.active_fragment = None;
                }
                Some(fragment) => {
                    page.active_fragment = Some(fragment);
                    page.deferred_fragment = None;
                    page.fragments
                        .submit(fragment, now_ms, self.config.fragment_debounce_ms);
                }
                None => {
                    page.clear_fragment(&self.dispatcher.scheduler);
                    page.active_fragment = None;
                }
            }
        }
    }

    /// Apply finished renders and start debounced ones that are due.
    ///
    /// Returns `true` when any page changed what it shows.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if self.is_disposed() {
            return false;
        }

        let mut changed = false;
        while let Ok(outcome) = self.results.try_recv() {
            changed |= self.apply(outcome);
        }

        for page in self.pages.values_mut() {
            if let Some(size) = page.full.debounce.poll(now_ms) {
                self.dispatcher.full(page, size);
            }

            if let Some(fragment) = page.fragments.debounce.poll(now_ms) {
                if page.covers(&fragment) {
                    changed |= page.fragment.take().is_some();
                } else if page.full_bitmap.is_none() {
                    page.deferred_fragment = Some(fragment);
                } else {
                    self.dispatcher.fragment(page, fragment);
                }
            }
        }

        changed
    }

    /// Force every page to re-render its full bitmap on the next demand.
    /// Current bitmaps stay on screen until replaced.
    pub fn invalidate_full_bitmaps(&mut self) {
        let scheduler = &self.dispatcher.scheduler;
        for page in self.pages.values_mut() {
            page.full.cancel(scheduler);
        }
        debug!(pages = self.pages.len(), "invalidated full page bitmaps");
    }

    /// Drop every fragment and cancel fragment work.
    pub fn clear_fragments(&mut self) {
        let scheduler = &self.dispatcher.scheduler;
        for page in self.pages.values_mut() {
            page.clear_fragment(scheduler);
            page.active_fragment = None;
        }
        debug!("cleared fragments");
    }

    /// Cancel all work, stop the workers and drop every page.
    ///
    /// Blocks until running jobs return. Further calls are no-ops.
    pub fn dispose(&mut self) {
        let Some(pool) = self.pool.take() else {
            return;
        };

        self.dispatcher.scheduler.clear();
        pool.shutdown();
        self.pages.clear();
        self.results.drain().for_each(drop);
        info!("tile engine disposed");
    }

    fn apply(&mut self, outcome: RenderOutcome) -> bool {
        match outcome {
            RenderOutcome::Full {
                page,
                generation,
                bitmap,
                cached,
            } => {
                let Some(runtime) = self.pages.get_mut(&page) else {
                    return false;
                };
                if !runtime.full.accepts(generation) {
                    debug!(page, generation, "dropped stale full page result");
                    return false;
                }
                if !cached {
                    runtime.full.job = None;
                }
                runtime.full_bitmap = Some(Arc::new(bitmap));
                runtime.status = PageStatus::Ready;

                if let Some(active) = runtime.active_fragment {
                    if runtime.covers(&active) {
                        runtime.clear_fragment(&self.dispatcher.scheduler);
                        runtime.active_fragment = None;
                    }
                }
                if let Some(deferred) = runtime.deferred_fragment.take() {
                    if !runtime.covers(&deferred) {
                        self.dispatcher.fragment(runtime, deferred);
                    }
                }
                true
            }
            RenderOutcome::Fragment {
                page,
                generation,
                bitmap,
            } => {
                let Some(runtime) = self.pages.get_mut(&page) else {
                    return false;
                };
                if !runtime.fragments.accepts(generation) {
                    debug!(page, generation, "dropped stale fragment result");
                    return false;
                }
                runtime.fragments.job = None;
                let Some(demand) = runtime.fragments.requested else {
                    return false;
                };
                // The renderer may have lowered the density to stay in budget
                let zoom = if demand.rect.width() > 0.0 {
                    bitmap.width as f32 / demand.rect.width()
                } else {
                    demand.zoom
                };
                runtime.fragment = Some(Fragment {
                    rect: demand.rect,
                    zoom,
                    bitmap: Arc::new(bitmap),
                });
                true
            }
            RenderOutcome::Failed {
                page,
                generation,
                stream,
                error,
            } => {
                let Some(runtime) = self.pages.get_mut(&page) else {
                    return false;
                };
                let pipeline_accepts = match stream {
                    Stream::Full => runtime.full.accepts(generation),
                    Stream::Fragment => runtime.fragments.accepts(generation),
                };
                if !pipeline_accepts {
                    return false;
                }

                warn!(page, ?stream, error = %error, "render failed");
                match stream {
                    Stream::Full => {
                        runtime.full.job = None;
                        runtime.full.requested = None;
                        if runtime.full_bitmap.is_none() {
                            runtime.status = PageStatus::Failed;
                            return true;
                        }
                        false
                    }
                    Stream::Fragment => {
                        runtime.fragments.job = None;
                        runtime.fragments.requested = None;
                        false
                    }
                }
            }
        }
    }
}

impl Drop for TileEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Demands for every loaded page of `state`.
///
/// Full pages are wanted at their layout size. Visible pages also want the
/// on-screen sub-rect as a fragment while zoomed in.
pub fn page_demands(state: &LayoutState, prefetch_margin: f32) -> Vec<PageDemand> {
    if !state.is_laid_out() {
        return Vec::new();
    }

    let visible: HashSet<usize> = visible_pages(state).into_iter().collect();
    loaded_pages(state, prefetch_margin)
        .into_iter()
        .filter_map(|index| {
            let position = state.position(index)?;
            let size = position.size();
            let is_visible = visible.contains(&index);

            let fragment = if is_visible && state.zoom > 1.0 {
                visible_fragment(state, position).map(|rect| FragmentDemand {
                    page_width: size.width,
                    page_height: size.height,
                    rect,
                    zoom: state.zoom,
                })
            } else {
                None
            };

            Some(PageDemand {
                index,
                width: size.width.round().max(1.0) as u32,
                height: size.height.round().max(1.0) as u32,
                visible: is_visible,
                fragment,
            })
        })
        .collect()
}

fn executor(
    renderer: Arc<dyn Renderer>,
    cache: Option<Arc<dyn TileCache>>,
    results: Sender<RenderOutcome>,
) -> JobExecutor {
    Arc::new(move |job: &Job, token: &CancellationToken| match job.job_type {
        JobType::RenderPage {
            page_index,
            width,
            height,
            generation,
        } => render_full_page(
            renderer.as_ref(),
            cache.as_deref(),
            &results,
            page_index,
            (width, height),
            generation,
            token,
        ),
        JobType::RenderFragment {
            page_index,
            page_width,
            page_height,
            region,
            zoom,
            generation,
        } => {
            if token.is_cancelled() {
                return;
            }
            let outcome = match renderer.render_fragment(
                page_index,
                page_width,
                page_height,
                region,
                zoom,
                token,
            ) {
                Ok(_) if token.is_cancelled() => return,
                Ok(bitmap) => RenderOutcome::Fragment {
                    page: page_index,
                    generation,
                    bitmap,
                },
                Err(err) if err.is_cancelled() => return,
                Err(error) => RenderOutcome::Failed {
                    page: page_index,
                    generation,
                    stream: Stream::Fragment,
                    error,
                },
            };
            let _ = results.send(outcome);
        }
    })
}

/// Full-page job: cached bitmap first when it has the right size, then a
/// fresh render that replaces it in the cache.
fn render_full_page(
    renderer: &dyn Renderer,
    cache: Option<&dyn TileCache>,
    results: &Sender<RenderOutcome>,
    page: usize,
    size: (u32, u32),
    generation: u64,
    token: &CancellationToken,
) {
    if let Some(cache) = cache {
        let expected = fit_to_budget(size.0, size.1);
        match cache.get(page) {
            Ok(Some(bitmap)) if (bitmap.width, bitmap.height) == expected => {
                if token.is_cancelled() {
                    return;
                }
                let _ = results.send(RenderOutcome::Full {
                    page,
                    generation,
                    bitmap,
                    cached: true,
                });
            }
            Ok(_) => {}
            Err(err) => warn!(page, error = %err, "tile cache read failed"),
        }
    }

    if token.is_cancelled() {
        return;
    }

    match renderer.render_page(page, size.0, size.1, token) {
        Ok(bitmap) => {
            if token.is_cancelled() {
                return;
            }
            if let Some(cache) = cache {
                if let Err(err) = cache.put(page, &bitmap) {
                    warn!(page, error = %err, "tile cache write failed");
                }
            }
            let _ = results.send(RenderOutcome::Full {
                page,
                generation,
                bitmap,
                cached: false,
            });
        }
        Err(err) if err.is_cancelled() => debug!(page, generation, "full page render cancelled"),
        Err(error) => {
            let _ = results.send(RenderOutcome::Failed {
                page,
                generation,
                stream: Stream::Full,
                error,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use viewer_core::{Bounds, Orientation, PageDescriptor, Size, Vec2};

    fn state(orientation: Orientation) -> LayoutState {
        let pages = (0..10).map(|i| PageDescriptor::new(i, 1.5)).collect();
        let mut state = LayoutState::new(pages, 8.0, orientation, Bounds::new(0.5, 100.0));
        state.viewport_size = Some(Size::new(400.0, 600.0));
        state.relayout()
    }

    #[test]
    fn test_no_demands_before_layout() {
        let pages = vec![PageDescriptor::new(0, 1.5)];
        let state = LayoutState::new(pages, 8.0, Orientation::Vertical, Bounds::new(0.5, 100.0));
        assert!(page_demands(&state, 0.3).is_empty());
    }

    #[test]
    fn test_full_pages_at_layout_size() {
        let demands = page_demands(&state(Orientation::Vertical), 0.3);

        // The prefetch margin pulls in page 1 without making it visible
        assert_eq!(demands.len(), 2);
        assert_eq!((demands[0].width, demands[0].height), (400, 600));
        assert!(demands[0].visible);
        assert!(!demands[1].visible);
        assert!(demands.iter().all(|demand| demand.fragment.is_none()));
    }

    #[test]
    fn test_zoomed_in_visible_page_wants_fragment() {
        let mut state = state(Orientation::Vertical);
        state.zoom = 2.0;
        state.offset = Vec2::new(-100.0, -150.0);

        let demands = page_demands(&state, 0.3);
        assert_eq!(demands.len(), 1);

        let fragment = demands[0].fragment.unwrap();
        assert_eq!(fragment.rect, viewer_core::Rect::new(100.0, 150.0, 300.0, 450.0));
        assert_eq!(fragment.zoom, 2.0);
        assert_eq!(fragment.target_width(), 800.0);
    }

    #[test]
    fn test_random_positions_keep_fragments_inside_visible_pages() {
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let orientation = if rng.gen_bool(0.5) {
                Orientation::Vertical
            } else {
                Orientation::Horizontal
            };
            let mut state = state(orientation);
            state.zoom = rng.gen_range(0.5..8.0);
            state.offset = Vec2::new(rng.gen_range(-4000.0..0.0), rng.gen_range(-6500.0..0.0));
            let state = state.coerced();

            let visible = visible_pages(&state);
            for demand in page_demands(&state, 0.3) {
                assert_eq!(demand.visible, visible.contains(&demand.index));
                match demand.fragment {
                    Some(fragment) => {
                        assert!(demand.visible && state.zoom > 1.0);
                        assert!(fragment.rect.left >= -0.01 && fragment.rect.top >= -0.01);
                        assert!(fragment.rect.right <= fragment.page_width + 0.01);
                        assert!(fragment.rect.bottom <= fragment.page_height + 0.01);
                    }
                    None => assert!(!demand.visible || state.zoom <= 1.0),
                }
            }
        }
    }
}
