//! Viewport engine for paginated documents.
//!
//! Pure layout and bounds math plus the gesture state machine that owns the
//! current [`LayoutState`]. Nothing here renders or blocks; the tile engine
//! in `pageflow-core` consumes the visible-page sets this crate computes.

mod anchor;
mod animation;
mod bounds;
mod config;
mod controller;
mod error;
mod geometry;
mod layout;
mod snapshot;
mod state;
mod velocity;
mod visibility;

pub use anchor::{create_anchor, resolve_anchor, Anchor};
pub use animation::{DecayAnimation, SpringAnimation, SPRING_SETTLE_THRESHOLD};
pub use bounds::{
    axis_bounds, centroid_offset_correction, coerce, compute_bounds, compute_zoom_bounds,
    OffsetBounds,
};
pub use config::{ViewerConfig, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM};
pub use controller::{SubscriptionId, ViewportController};
pub use error::ViewportError;
pub use geometry::{Bounds, Rect, Size, Vec2};
pub use layout::{compute_layout, Layout, Orientation, PageDescriptor, PagePosition};
pub use snapshot::ViewerSnapshot;
pub use state::LayoutState;
pub use velocity::VelocityTracker;
pub use visibility::{loaded_pages, visible_fragment, visible_pages};
