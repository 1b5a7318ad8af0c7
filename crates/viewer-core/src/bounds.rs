//! Bounds algebra for offset and zoom.
//!
//! Content is drawn at `screen = (content + offset) * zoom`, so the part of the
//! content inside the viewport is `viewport / zoom` wide starting at `-offset`.
//! Every function here is pure; the controller re-derives bounds from the
//! current state instead of caching them.

use crate::geometry::{Bounds, Size, Vec2};
use crate::layout::Orientation;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetBounds {
    pub horizontal: Bounds,
    pub vertical: Bounds,
}

impl OffsetBounds {
    pub fn clamp(&self, offset: Vec2) -> Vec2 {
        Vec2::new(
            self.horizontal.clamp(offset.x),
            self.vertical.clamp(offset.y),
        )
    }

    pub fn contains(&self, offset: Vec2) -> bool {
        self.horizontal.contains(offset.x) && self.vertical.contains(offset.y)
    }
}

/// Offset range along one axis.
///
/// When the zoomed content is shorter than the viewport the range collapses to
/// the offset that centers it; otherwise the content may scroll until its far
/// edge reaches the far edge of the viewport.
pub fn axis_bounds(full_extent: f32, viewport_extent: f32, zoom: f32) -> Bounds {
    let visible = viewport_extent / zoom;
    if visible >= full_extent {
        Bounds::point(visible / 2.0 - full_extent / 2.0)
    } else {
        Bounds::new(-(full_extent - visible), 0.0)
    }
}

/// Offset bounds for both axes.
///
/// Both the scroll axis and the cross axis follow [`axis_bounds`]; the
/// orientation only decides which of the two is long enough to scroll at 1x.
pub fn compute_bounds(
    _orientation: Orientation,
    zoom: f32,
    full_size: Size,
    viewport: Size,
) -> OffsetBounds {
    if viewport.is_empty() || full_size.is_empty() || zoom <= 0.0 {
        return OffsetBounds {
            horizontal: Bounds::point(0.0),
            vertical: Bounds::point(0.0),
        };
    }

    OffsetBounds {
        horizontal: axis_bounds(full_size.width, viewport.width, zoom),
        vertical: axis_bounds(full_size.height, viewport.height, zoom),
    }
}

/// Zoom range: never below fit scale on the primary axis (capped at 1x), never
/// below `user_min`, never above `user_max`.
pub fn compute_zoom_bounds(
    orientation: Orientation,
    full_size: Size,
    viewport: Size,
    user_min: f32,
    user_max: f32,
) -> Bounds {
    // Until measured there is no fit scale; only the user limits apply
    let fit_ratio = if viewport.is_empty() || full_size.is_empty() {
        0.0
    } else {
        match orientation {
            Orientation::Vertical => viewport.height / full_size.height,
            Orientation::Horizontal => viewport.width / full_size.width,
        }
    };

    let min = user_min.max(fit_ratio.min(1.0));
    Bounds::new(min, user_max.max(min))
}

/// Offset change that keeps the content point under `centroid` fixed on
/// screen while zoom goes from `old_zoom` to `new_zoom`.
pub fn centroid_offset_correction(old_zoom: f32, new_zoom: f32, centroid: Vec2) -> Vec2 {
    centroid * (1.0 / new_zoom - 1.0 / old_zoom)
}

/// Clamp zoom first, then clamp offset into the bounds of the clamped zoom.
pub fn coerce(
    orientation: Orientation,
    full_size: Size,
    viewport: Size,
    zoom_limits: Bounds,
    zoom: f32,
    offset: Vec2,
) -> (f32, Vec2) {
    let zoom_bounds = compute_zoom_bounds(
        orientation,
        full_size,
        viewport,
        zoom_limits.min,
        zoom_limits.max,
    );
    let zoom = zoom_bounds.clamp(zoom);
    let offset = compute_bounds(orientation, zoom, full_size, viewport).clamp(offset);
    (zoom, offset)
}
