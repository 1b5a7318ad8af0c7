use crate::geometry::Rect;
use crate::layout::{Orientation, PagePosition};
use crate::state::LayoutState;

/// Pages whose rect overlaps `area`. Positions are sorted along the scroll
/// axis, so the scan starts at the first page that does not end before it.
fn pages_overlapping(state: &LayoutState, area: &Rect) -> Vec<usize> {
    let (area_start, area_end) = match state.orientation {
        Orientation::Vertical => (area.top, area.bottom),
        Orientation::Horizontal => (area.left, area.right),
    };

    let positions = state.page_positions.as_slice();
    let first = positions.partition_point(|position| position.end <= area_start);

    positions[first..]
        .iter()
        .take_while(|position| position.start < area_end)
        .filter(|position| position.rect.overlaps(area))
        .map(|position| position.index)
        .collect()
}

/// Pages overlapping the viewport inflated by `margin` times its extent on
/// each side. These are eligible for full-page rendering.
pub fn loaded_pages(state: &LayoutState, margin: f32) -> Vec<usize> {
    if !state.is_laid_out() {
        return Vec::new();
    }

    let viewport = state.viewport_rect();
    let inflated = viewport.inflate(viewport.width() * margin, viewport.height() * margin);
    pages_overlapping(state, &inflated)
}

/// Pages overlapping the exact viewport. These are eligible for fragments.
pub fn visible_pages(state: &LayoutState) -> Vec<usize> {
    if !state.is_laid_out() {
        return Vec::new();
    }

    pages_overlapping(state, &state.viewport_rect())
}

/// Part of the page inside the viewport, in page-local layout units
/// (origin at the page's top-left corner).
pub fn visible_fragment(state: &LayoutState, position: &PagePosition) -> Option<Rect> {
    let visible = position.rect.intersect(&state.viewport_rect())?;
    Some(visible.translate(-position.rect.top_left()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bounds, Size, Vec2};
    use crate::layout::PageDescriptor;

    fn state(orientation: Orientation) -> LayoutState {
        let pages = (0..10).map(|i| PageDescriptor::new(i, 1.4)).collect();
        let mut state = LayoutState::new(pages, 20.0, orientation, Bounds::new(0.5, 100.0));
        state.viewport_size = Some(Size::new(1000.0, 2000.0));
        state.relayout()
    }

    #[test]
    fn visible_pages_track_the_viewport() {
        let mut state = state(Orientation::Vertical);
        assert_eq!(visible_pages(&state), vec![0, 1]);

        state.offset = Vec2::new(0.0, -7000.0);
        assert_eq!(visible_pages(&state), vec![4, 5, 6]);
    }

    #[test]
    fn loaded_pages_include_the_prefetch_margin() {
        let mut state = state(Orientation::Vertical);
        state.offset = Vec2::new(0.0, -7000.0);

        // Viewport 7000..9000 inflated by 600 on each side: 6400..9600
        assert_eq!(loaded_pages(&state, 0.3), vec![4, 5, 6]);
        assert_eq!(loaded_pages(&state, 0.5), vec![4, 5, 6, 7]);
        assert!(loaded_pages(&state, 0.0) == visible_pages(&state));
    }

    #[test]
    fn gap_between_pages_is_not_visible() {
        let mut state = state(Orientation::Vertical);
        state.zoom = 200.0;
        state.offset = Vec2::new(0.0, -1405.0);
        assert!(visible_pages(&state).is_empty());
    }

    #[test]
    fn fragment_is_page_local() {
        let mut state = state(Orientation::Vertical);
        state.zoom = 2.0;
        state.offset = Vec2::new(-250.0, -1500.0);

        let page = *state.position(1).unwrap();
        let fragment = visible_fragment(&state, &page).unwrap();
        assert_eq!(fragment, Rect::new(250.0, 80.0, 750.0, 1080.0));

        let far = *state.position(8).unwrap();
        assert_eq!(visible_fragment(&state, &far), None);
    }

    #[test]
    fn horizontal_visibility_runs_along_x() {
        let mut state = state(Orientation::Horizontal);
        assert_eq!(visible_pages(&state), vec![0]);

        state.offset = Vec2::new(-500.0, 0.0);
        assert_eq!(visible_pages(&state), vec![0, 1]);
    }

    #[test]
    fn unmeasured_state_has_no_pages() {
        let pages = vec![PageDescriptor::new(0, 1.0)];
        let state = LayoutState::new(pages, 0.0, Orientation::Vertical, Bounds::new(0.5, 100.0));
        assert!(loaded_pages(&state, 0.3).is_empty());
        assert!(visible_pages(&state).is_empty());
    }
}
