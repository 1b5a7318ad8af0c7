use crate::layout::Orientation;

pub const DEFAULT_MIN_ZOOM: f32 = 0.5;
pub const DEFAULT_MAX_ZOOM: f32 = 100.0;

/// Layout and gesture tuning consumed by [`ViewportController`](crate::ViewportController).
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub spacing: f32,
    pub orientation: Orientation,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Prefetch margin as a fraction of the viewport extent on each side.
    pub prefetch_margin: f32,
    /// Decay constant of a fling, per second.
    pub friction: f32,
    /// A fling stops once its on-screen speed drops below this (px/s).
    pub fling_stop_velocity: f32,
    pub velocity_window_ms: u64,
    /// Zoom levels a double tap steps through; past the last it returns to the first.
    pub double_tap_ladder: Vec<f32>,
    pub spring_stiffness: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            spacing: 8.0,
            orientation: Orientation::Vertical,
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            prefetch_margin: 0.3,
            friction: 4.0,
            fling_stop_velocity: 20.0,
            velocity_window_ms: 100,
            double_tap_ladder: vec![1.0, 2.0, 3.0],
            spring_stiffness: 400.0,
        }
    }
}

impl ViewerConfig {
    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: f32, max_zoom: f32) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_prefetch_margin(mut self, margin: f32) -> Self {
        self.prefetch_margin = margin;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_double_tap_ladder(mut self, ladder: Vec<f32>) -> Self {
        self.double_tap_ladder = ladder;
        self
    }

    /// Next zoom level for a double tap at `zoom`.
    pub fn double_tap_target(&self, zoom: f32) -> f32 {
        const EPSILON: f32 = 1e-3;
        let Some(first) = self.double_tap_ladder.first().copied() else {
            return 1.0;
        };

        self.double_tap_ladder
            .iter()
            .copied()
            .find(|level| *level > zoom + EPSILON)
            .unwrap_or(first)
    }
}
