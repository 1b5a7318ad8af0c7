//! Per-page render state owned by the tile engine

use pageflow_render::Bitmap;
use pageflow_scheduler::{Debouncer, FragmentRegion, JobId, JobScheduler};
use std::sync::Arc;
use viewer_core::Rect;

/// What the UI should draw for a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageStatus {
    /// Nothing rendered yet
    #[default]
    Placeholder,
    /// A full-page bitmap is available
    Ready,
    /// The last render failed and nothing else is available. The next
    /// demand for the page retries.
    Failed,
}

/// High-resolution render of the part of a page that is on screen
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Placement in page-local layout units
    pub rect: Rect,
    /// Pixels per layout unit the bitmap was actually rendered at; lower
    /// than the requested zoom when the renderer had to stay in budget
    pub zoom: f32,
    pub bitmap: Arc<Bitmap>,
}

/// What the engine should produce for one loaded page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageDemand {
    pub index: usize,
    /// Full-page raster size in pixels
    pub width: u32,
    pub height: u32,
    pub visible: bool,
    /// Present only for visible pages while zoomed in
    pub fragment: Option<FragmentDemand>,
}

/// A visible sub-rect of a page wanted at `zoom`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentDemand {
    /// Page size in layout units
    pub page_width: f32,
    pub page_height: f32,
    /// Page-local rect in layout units
    pub rect: Rect,
    pub zoom: f32,
}

impl FragmentDemand {
    /// Horizontal pixel density the fragment would be rendered at, as a
    /// full-page width.
    pub fn target_width(&self) -> f32 {
        self.page_width * self.zoom
    }

    pub(crate) fn region(&self) -> FragmentRegion {
        FragmentRegion {
            left: self.rect.left,
            top: self.rect.top,
            right: self.rect.right,
            bottom: self.rect.bottom,
        }
    }
}

/// One debounced, cancellable render stream (full page or fragment)
#[derive(Debug)]
pub(crate) struct Pipeline<T> {
    pub debounce: Debouncer<T>,
    /// Job currently queued or running
    pub job: Option<JobId>,
    /// Generation whose results are still wanted
    pub live: Option<u64>,
    /// Input of the last dispatched job; cleared on failure so the next
    /// demand retries
    pub requested: Option<T>,
}

impl<T: Clone + PartialEq> Pipeline<T> {
    fn new() -> Self {
        Self {
            debounce: Debouncer::new(),
            job: None,
            live: None,
            requested: None,
        }
    }

    /// Queue `value` behind the debounce window unless it is already
    /// requested or pending.
    pub fn submit(&mut self, value: T, now_ms: u64, window_ms: u64) {
        if self.requested.as_ref() == Some(&value) {
            self.debounce.cancel();
        } else if self.debounce.peek() != Some(&value) {
            self.debounce.submit(value, now_ms, window_ms);
        }
    }

    pub fn accepts(&self, generation: u64) -> bool {
        self.live == Some(generation)
    }

    /// Cancel whatever is queued, running or waiting in the debounce window.
    pub fn cancel(&mut self, scheduler: &JobScheduler) {
        self.debounce.cancel();
        if let Some(job) = self.job.take() {
            scheduler.cancel_job(job);
        }
        self.live = None;
        self.requested = None;
    }

    pub fn is_busy(&self) -> bool {
        self.job.is_some() || self.debounce.is_pending()
    }
}

/// Render state of one loaded page.
///
/// Created when the page enters the loaded range and dropped when it leaves
/// it; bitmaps are derived and disposable.
#[derive(Debug)]
pub struct PageRuntime {
    index: usize,
    pub(crate) status: PageStatus,
    pub(crate) visible: bool,
    pub(crate) full_bitmap: Option<Arc<Bitmap>>,
    pub(crate) fragment: Option<Fragment>,
    pub(crate) active_fragment: Option<FragmentDemand>,
    pub(crate) full: Pipeline<(u32, u32)>,
    pub(crate) fragments: Pipeline<FragmentDemand>,
    /// Fragment that came out of its debounce window before any full
    /// bitmap existed
    pub(crate) deferred_fragment: Option<FragmentDemand>,
}

impl PageRuntime {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            status: PageStatus::Placeholder,
            visible: false,
            full_bitmap: None,
            fragment: None,
            active_fragment: None,
            full: Pipeline::new(),
            fragments: Pipeline::new(),
            deferred_fragment: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn status(&self) -> PageStatus {
        self.status
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn full_bitmap(&self) -> Option<&Arc<Bitmap>> {
        self.full_bitmap.as_ref()
    }

    pub fn fragment(&self) -> Option<&Fragment> {
        self.fragment.as_ref()
    }

    /// The fragment the page currently wants, if any
    pub fn active_fragment(&self) -> Option<&FragmentDemand> {
        self.active_fragment.as_ref()
    }

    /// Whether the full bitmap is already at least as dense as `demand`,
    /// making a fragment render pointless.
    pub(crate) fn covers(&self, demand: &FragmentDemand) -> bool {
        self.full_bitmap
            .as_ref()
            .is_some_and(|bitmap| bitmap.width as f32 >= demand.target_width())
    }

    /// Stop fragment work and forget the shown fragment.
    pub(crate) fn clear_fragment(&mut self, scheduler: &JobScheduler) {
        self.fragments.cancel(scheduler);
        self.fragment = None;
        self.deferred_fragment = None;
    }

    /// Cancel all pending work for this page.
    pub(crate) fn dispose(&mut self, scheduler: &JobScheduler) {
        self.full.cancel(scheduler);
        self.clear_fragment(scheduler);
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.full.is_busy() || self.fragments.is_busy() || self.deferred_fragment.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageflow_scheduler::{JobPriority, JobType};

    fn demand(zoom: f32) -> FragmentDemand {
        FragmentDemand {
            page_width: 400.0,
            page_height: 560.0,
            rect: Rect::new(0.0, 0.0, 100.0, 100.0),
            zoom,
        }
    }

    #[test]
    fn test_new_page_is_placeholder() {
        let page = PageRuntime::new(3);
        assert_eq!(page.index(), 3);
        assert_eq!(page.status(), PageStatus::Placeholder);
        assert!(page.full_bitmap().is_none());
        assert!(!page.is_busy());
    }

    #[test]
    fn test_covers_compares_pixel_density() {
        let mut page = PageRuntime::new(0);
        assert!(!page.covers(&demand(2.0)));

        page.full_bitmap = Some(Arc::new(Bitmap::filled(800, 1120, [0; 4])));
        assert!(page.covers(&demand(2.0)));
        assert!(!page.covers(&demand(2.5)));
    }

    #[test]
    fn test_pipeline_submit_skips_requested_value() {
        let mut pipeline: Pipeline<(u32, u32)> = Pipeline::new();
        pipeline.requested = Some((10, 10));

        pipeline.submit((10, 10), 0, 300);
        assert!(!pipeline.debounce.is_pending());

        pipeline.submit((20, 20), 0, 300);
        assert_eq!(pipeline.debounce.peek(), Some(&(20, 20)));

        // Going back to the requested size drops the pending one
        pipeline.submit((10, 10), 50, 300);
        assert!(!pipeline.debounce.is_pending());
    }

    #[test]
    fn test_pipeline_resubmitting_pending_value_keeps_deadline() {
        let mut pipeline: Pipeline<(u32, u32)> = Pipeline::new();
        pipeline.submit((20, 20), 0, 300);
        pipeline.submit((20, 20), 200, 300);
        assert_eq!(pipeline.debounce.deadline_ms(), Some(300));
    }

    #[test]
    fn test_dispose_cancels_queued_job() {
        let scheduler = JobScheduler::new();
        let (job, token) = scheduler.submit(
            JobPriority::Visible,
            JobType::RenderPage {
                page_index: 0,
                width: 10,
                height: 10,
                generation: 1,
            },
        );

        let mut page = PageRuntime::new(0);
        page.full.job = Some(job);
        page.full.live = Some(1);

        page.dispose(&scheduler);

        assert!(token.is_cancelled());
        assert!(!page.full.accepts(1));
        assert!(!scheduler.has_pending_jobs());
    }
}
