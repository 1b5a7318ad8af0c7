//! Position anchors.
//!
//! An anchor names the page under the viewport origin and how far into that
//! page the origin sits. Capturing one before a re-layout and resolving it
//! after keeps the same content in view across resizes and orientation flips.

use crate::geometry::Vec2;
use crate::state::LayoutState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub page_index: usize,
    /// Position of the viewport origin inside the page along the scroll axis,
    /// `0.0` at the page start and `1.0` at its end.
    pub fraction: f32,
}

impl Anchor {
    pub fn new(page_index: usize, fraction: f32) -> Self {
        Self {
            page_index,
            fraction: fraction.clamp(0.0, 1.0),
        }
    }

    pub fn page_start(page_index: usize) -> Self {
        Self::new(page_index, 0.0)
    }
}

/// Anchor for the first page overlapping the viewport, or `None` when nothing
/// is visible (unmeasured viewport, empty document).
pub fn create_anchor(state: &LayoutState) -> Option<Anchor> {
    if !state.is_laid_out() {
        return None;
    }

    let viewport = state.viewport_rect();
    let page = state
        .page_positions
        .iter()
        .find(|position| position.rect.overlaps(&viewport))?;

    let extent = page.extent();
    if extent <= 0.0 {
        return Some(Anchor::page_start(page.index));
    }

    let origin = -state.scroll_offset();
    Some(Anchor::new(page.index, (origin - page.start) / extent))
}

/// Offset placing `anchor` at the viewport origin in `state`, clamped to the
/// bounds of `state`. A page index past the end resolves to the last page.
pub fn resolve_anchor(anchor: &Anchor, state: &LayoutState) -> Vec2 {
    let Some(last) = state.page_positions.len().checked_sub(1) else {
        return state.offset;
    };

    let page = &state.page_positions[anchor.page_index.min(last)];
    let scroll = -(page.start + page.extent() * anchor.fraction);
    state.bounds().clamp(state.with_scroll_offset(scroll))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bounds, Size};
    use crate::layout::{Orientation, PageDescriptor};

    fn state(viewport: Size, orientation: Orientation) -> LayoutState {
        let pages = (0..10).map(|i| PageDescriptor::new(i, 1.4)).collect();
        let mut state = LayoutState::new(pages, 20.0, orientation, Bounds::new(0.5, 100.0));
        state.viewport_size = Some(viewport);
        state.relayout()
    }

    #[test]
    fn anchor_is_none_before_measurement() {
        let pages = vec![PageDescriptor::new(0, 1.0)];
        let state = LayoutState::new(pages, 0.0, Orientation::Vertical, Bounds::new(0.5, 100.0));
        assert_eq!(create_anchor(&state), None);
    }

    #[test]
    fn anchor_round_trip_reproduces_offset() {
        let mut state = state(Size::new(1000.0, 2000.0), Orientation::Vertical);
        state.offset = Vec2::new(0.0, -7000.0);

        let anchor = create_anchor(&state).unwrap();
        assert_eq!(anchor.page_index, 4);
        assert!((anchor.fraction - (7000.0 - 5680.0) / 1400.0).abs() < 1e-5);

        let resolved = resolve_anchor(&anchor, &state);
        assert!((resolved.y - state.offset.y).abs() < 1e-2);
    }

    #[test]
    fn anchor_resolves_into_resized_layout() {
        let mut state = state(Size::new(1000.0, 2000.0), Orientation::Vertical);
        state.offset = Vec2::new(0.0, -7000.0);
        let anchor = create_anchor(&state).unwrap();

        let mut resized = state.clone();
        resized.viewport_size = Some(Size::new(500.0, 1000.0));
        let resized = resized.relayout();
        let offset = resolve_anchor(&anchor, &resized);

        let page = resized.position(4).unwrap();
        let fraction = (-offset.y - page.start) / page.extent();
        assert!((fraction - anchor.fraction).abs() < 1e-3);
    }

    #[test]
    fn resolve_clamps_page_index_and_bounds() {
        let state = state(Size::new(1000.0, 2000.0), Orientation::Vertical);
        let offset = resolve_anchor(&Anchor::new(42, 1.0), &state);
        assert_eq!(offset.y, state.bounds().vertical.min);
    }

    #[test]
    fn fraction_is_clamped() {
        assert_eq!(Anchor::new(1, 1.7).fraction, 1.0);
        assert_eq!(Anchor::new(1, -0.2).fraction, 0.0);
    }
}
