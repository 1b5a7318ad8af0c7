use crate::bounds::{self, OffsetBounds};
use crate::geometry::{Bounds, Rect, Size, Vec2};
use crate::layout::{compute_layout, Orientation, PageDescriptor, PagePosition};
use std::sync::Arc;

/// Snapshot of everything the viewport knows. Replaced wholesale on each
/// update; derived quantities (bounds, visible pages) are computed on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutState {
    /// `None` until the first measurement.
    pub viewport_size: Option<Size>,
    pub spacing: f32,
    pub orientation: Orientation,
    pub full_size: Size,
    pub pages: Arc<Vec<PageDescriptor>>,
    pub page_positions: Arc<Vec<PagePosition>>,
    pub offset: Vec2,
    pub zoom: f32,
    /// User zoom limits; the effective range also depends on fit scale.
    pub zoom_limits: Bounds,
}

impl LayoutState {
    pub fn new(
        pages: Vec<PageDescriptor>,
        spacing: f32,
        orientation: Orientation,
        zoom_limits: Bounds,
    ) -> Self {
        Self {
            viewport_size: None,
            spacing,
            orientation,
            full_size: Size::ZERO,
            pages: Arc::new(pages),
            page_positions: Arc::new(Vec::new()),
            offset: Vec2::ZERO,
            zoom: 1.0,
            zoom_limits,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn viewport(&self) -> Size {
        self.viewport_size.unwrap_or(Size::ZERO)
    }

    pub fn is_laid_out(&self) -> bool {
        self.viewport_size.is_some_and(|size| !size.is_empty())
            && self.page_positions.len() == self.pages.len()
    }

    pub fn bounds(&self) -> OffsetBounds {
        bounds::compute_bounds(self.orientation, self.zoom, self.full_size, self.viewport())
    }

    pub fn zoom_bounds(&self) -> Bounds {
        bounds::compute_zoom_bounds(
            self.orientation,
            self.full_size,
            self.viewport(),
            self.zoom_limits.min,
            self.zoom_limits.max,
        )
    }

    /// Offset component along the scroll axis.
    pub fn scroll_offset(&self) -> f32 {
        match self.orientation {
            Orientation::Vertical => self.offset.y,
            Orientation::Horizontal => self.offset.x,
        }
    }

    pub fn with_scroll_offset(&self, value: f32) -> Vec2 {
        match self.orientation {
            Orientation::Vertical => Vec2::new(self.offset.x, value),
            Orientation::Horizontal => Vec2::new(value, self.offset.y),
        }
    }

    /// Content-space rectangle currently inside the viewport.
    pub fn viewport_rect(&self) -> Rect {
        Rect::from_origin_size(-self.offset, self.viewport() / self.zoom)
    }

    /// Zoom clamped into its bounds, then offset clamped into the bounds of
    /// that zoom.
    pub fn coerced(&self) -> LayoutState {
        let (zoom, offset) = bounds::coerce(
            self.orientation,
            self.full_size,
            self.viewport(),
            self.zoom_limits,
            self.zoom,
            self.offset,
        );
        LayoutState {
            zoom,
            offset,
            ..self.clone()
        }
    }

    /// Recompute page positions for the current pages, viewport, spacing and
    /// orientation. Offset and zoom are left as they are.
    pub fn relayout(&self) -> LayoutState {
        let layout = compute_layout(&self.pages, self.viewport(), self.spacing, self.orientation);
        LayoutState {
            full_size: layout.full_size,
            page_positions: Arc::new(layout.positions),
            ..self.clone()
        }
    }

    pub fn position(&self, index: usize) -> Option<&PagePosition> {
        self.page_positions.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> LayoutState {
        let pages = (0..10).map(|i| PageDescriptor::new(i, 1.4)).collect();
        let limits = Bounds::new(0.5, 100.0);
        let mut state = LayoutState::new(pages, 20.0, Orientation::Vertical, limits);
        state.viewport_size = Some(Size::new(1000.0, 2000.0));
        state.relayout()
    }

    #[test]
    fn relayout_fills_positions() {
        let state = state();
        assert!(state.is_laid_out());
        assert_eq!(state.full_size.height, 14180.0);
        assert_eq!(state.position(2).map(|p| p.start), Some(2840.0));
    }

    #[test]
    fn coerce_is_idempotent() {
        let mut state = state();
        state.zoom = 250.0;
        state.offset = Vec2::new(300.0, -99_999.0);

        let once = state.coerced();
        let twice = once.coerced();
        assert_eq!(once, twice);
        assert_eq!(once.zoom, 100.0);
        assert!(once.bounds().contains(once.offset));
    }

    #[test]
    fn viewport_rect_follows_offset_and_zoom() {
        let mut state = state();
        state.zoom = 2.0;
        state.offset = Vec2::new(-100.0, -3000.0);
        assert_eq!(state.viewport_rect(), Rect::new(100.0, 3000.0, 600.0, 4000.0));
        assert_eq!(state.scroll_offset(), -3000.0);
        assert_eq!(state.with_scroll_offset(-10.0), Vec2::new(-100.0, -10.0));
    }
}
