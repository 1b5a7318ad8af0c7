//! Viewport / gesture state machine.
//!
//! [`ViewportController`] owns the current [`LayoutState`] and is the only
//! thing allowed to replace it. Every transition produces a state that is
//! already clamped to its bounds, then publishes it to subscribers.
//!
//! Time is passed in explicitly (`now_ms`); animations advance on
//! [`ViewportController::tick`], which the owner calls once per frame.

use crate::anchor::{create_anchor, resolve_anchor, Anchor};
use crate::animation::{DecayAnimation, SpringAnimation, SPRING_SETTLE_THRESHOLD};
use crate::bounds::centroid_offset_correction;
use crate::config::ViewerConfig;
use crate::error::ViewportError;
use crate::geometry::{Bounds, Rect, Size, Vec2};
use crate::layout::{Orientation, PageDescriptor};
use crate::snapshot::ViewerSnapshot;
use crate::state::LayoutState;
use crate::velocity::VelocityTracker;
use crate::visibility;
use std::sync::Arc;
use tracing::debug;

pub type SubscriptionId = u64;

type Observer = Box<dyn Fn(&Arc<LayoutState>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

pub struct ViewportController {
    config: ViewerConfig,
    state: Arc<LayoutState>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: SubscriptionId,
    velocity: VelocityTracker,
    decay_x: Option<DecayAnimation>,
    decay_y: Option<DecayAnimation>,
    spring: Option<SpringAnimation>,
    pending_anchor: Option<Anchor>,
}

impl ViewportController {
    pub fn new(config: ViewerConfig, pages: Vec<PageDescriptor>) -> Self {
        let state = LayoutState::new(
            pages,
            config.spacing,
            config.orientation,
            Bounds::new(config.min_zoom, config.max_zoom),
        );

        Self {
            velocity: VelocityTracker::new(config.velocity_window_ms),
            config,
            state: Arc::new(state),
            observers: Vec::new(),
            next_subscription: 1,
            decay_x: None,
            decay_y: None,
            spring: None,
            pending_anchor: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn state(&self) -> Arc<LayoutState> {
        self.state.clone()
    }

    pub fn page_count(&self) -> usize {
        self.state.page_count()
    }

    /// Register an observer. It is called with the current state right away
    /// and then after every change.
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: Fn(&Arc<LayoutState>) + Send + Sync + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        observer(&self.state);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    fn publish(&mut self, next: LayoutState) -> bool {
        if next == *self.state {
            return false;
        }

        self.state = Arc::new(next);
        for (_, observer) in &self.observers {
            observer(&self.state);
        }
        true
    }

    // Gestures

    pub fn on_pan_start(&mut self) {
        self.cancel_animations();
        self.velocity.reset();
    }

    /// Move content by a screen-space `delta`. Returns `false` when the offset
    /// did not move (e.g. at a scroll boundary) so the gesture can bubble.
    pub fn on_pan(&mut self, delta: Vec2, timestamp_ms: u64) -> bool {
        let offset = self.state.bounds().clamp(self.state.offset + delta / self.state.zoom);
        self.velocity.add(timestamp_ms, offset);

        if offset == self.state.offset {
            return false;
        }

        let next = LayoutState {
            offset,
            ..(*self.state).clone()
        };
        self.publish(next)
    }

    /// Start a fling from the tracked velocity. Returns `true` if any axis is
    /// now animating.
    pub fn on_pan_end(&mut self, now_ms: u64) -> bool {
        let velocity = self.velocity.velocity();
        self.velocity.reset();

        let zoom = self.state.zoom;
        let stop = self.config.fling_stop_velocity;
        let friction = self.config.friction;
        let offset = self.state.offset;

        if velocity.x.abs() * zoom >= stop {
            self.decay_x = Some(DecayAnimation::start(now_ms, offset.x, velocity.x, friction));
        }
        if velocity.y.abs() * zoom >= stop {
            self.decay_y = Some(DecayAnimation::start(now_ms, offset.y, velocity.y, friction));
        }

        self.decay_x.is_some() || self.decay_y.is_some()
    }

    /// Scale by `zoom_factor` keeping the content under `centroid` in place.
    pub fn on_zoom(&mut self, zoom_factor: f32, centroid: Vec2) -> bool {
        if let Some(spring) = self.spring.take() {
            spring.cancel();
        }

        let next = zoom_about(&self.state, self.state.zoom * zoom_factor, centroid);
        self.publish(next)
    }

    /// Spring zoom to the next ladder level. Returns `false` if already there.
    pub fn on_double_tap(&mut self, centroid: Vec2, now_ms: u64) -> bool {
        self.cancel_animations();

        let zoom = self.state.zoom;
        let target = self
            .state
            .zoom_bounds()
            .clamp(self.config.double_tap_target(zoom));
        if (target - zoom).abs() < SPRING_SETTLE_THRESHOLD {
            return false;
        }

        debug!(from = zoom, to = target, "double tap zoom");
        self.spring = Some(SpringAnimation::start(
            now_ms,
            zoom,
            target,
            self.config.spring_stiffness,
            centroid,
        ));
        true
    }

    /// Advance running animations to `now_ms`. Returns `true` if the state
    /// changed.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if !self.is_animating() {
            return false;
        }

        let mut next = (*self.state).clone();

        if let Some(spring) = self.spring.take() {
            if !spring.is_cancelled() {
                let settled = spring.is_settled(now_ms);
                let zoom = if settled {
                    spring.target()
                } else {
                    spring.value_at(now_ms)
                };
                next = zoom_about(&next, zoom, spring.centroid());
                if !settled {
                    self.spring = Some(spring);
                }
            }
        }

        let stop = self.config.fling_stop_velocity;
        advance_decay(&mut self.decay_x, Axis::Horizontal, &mut next, now_ms, stop);
        advance_decay(&mut self.decay_y, Axis::Vertical, &mut next, now_ms, stop);

        self.publish(next)
    }

    pub fn is_animating(&self) -> bool {
        self.spring.is_some() || self.decay_x.is_some() || self.decay_y.is_some()
    }

    pub fn cancel_animations(&mut self) {
        for decay in [self.decay_x.take(), self.decay_y.take()].into_iter().flatten() {
            decay.cancel();
        }
        if let Some(spring) = self.spring.take() {
            spring.cancel();
        }
    }

    // Layout changes

    /// Re-layout for a new viewport size and spacing, keeping the anchored page
    /// under the origin. Returns `true` if page positions were recomputed, which
    /// makes full-page bitmaps rendered at the old resolution stale.
    pub fn on_viewport_resize(&mut self, viewport: Size, spacing: f32) -> bool {
        let state = &self.state;
        if state.viewport_size == Some(viewport) && state.spacing == spacing && state.is_laid_out()
        {
            return false;
        }

        self.cancel_animations();
        let anchor = self.take_anchor();
        let next = LayoutState {
            viewport_size: Some(viewport),
            spacing,
            ..(*self.state).clone()
        }
        .relayout();

        debug!(
            width = viewport.width,
            height = viewport.height,
            spacing,
            "viewport resized"
        );
        self.apply_anchor(next, anchor);
        true
    }

    /// Switch between vertical scrolling and horizontal paging. Zoom resets to
    /// 1x. Returns `true` if the orientation changed, which invalidates fragment
    /// rects.
    pub fn set_orientation(&mut self, orientation: Orientation) -> bool {
        if self.state.orientation == orientation {
            return false;
        }

        self.cancel_animations();
        let anchor = self.take_anchor();
        let next = LayoutState {
            orientation,
            zoom: 1.0,
            ..(*self.state).clone()
        }
        .relayout();

        debug!(?orientation, ?anchor, "orientation changed");
        self.apply_anchor(next, anchor);
        true
    }

    pub fn set_spacing(&mut self, spacing: f32) -> bool {
        match self.state.viewport_size {
            Some(viewport) => self.on_viewport_resize(viewport, spacing),
            None => {
                let next = LayoutState {
                    spacing,
                    ..(*self.state).clone()
                };
                self.publish(next)
            }
        }
    }

    /// Jump to the start of page `index` at 1x zoom.
    pub fn scroll_to_page(&mut self, index: usize) -> Result<(), ViewportError> {
        let page_count = self.state.page_count();
        if index >= page_count {
            return Err(ViewportError::InvalidPageIndex { index, page_count });
        }

        self.cancel_animations();

        // Before the first layout the page start stays pending
        let next = LayoutState {
            zoom: 1.0,
            ..(*self.state).clone()
        };
        debug!(page = index, "scroll to page");
        self.apply_anchor(next, Some(Anchor::page_start(index)));
        Ok(())
    }

    // Anchors and snapshots

    /// Anchor of the current position; a pending anchor wins until it has been
    /// resolved against a real layout.
    pub fn anchor(&self) -> Option<Anchor> {
        self.pending_anchor.or_else(|| create_anchor(&self.state))
    }

    pub fn pending_anchor(&self) -> Option<Anchor> {
        self.pending_anchor
    }

    /// Place `anchor` at the viewport origin now, or at the first layout if
    /// the viewport has not been measured yet.
    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.cancel_animations();
        let next = (*self.state).clone();
        self.apply_anchor(next, Some(anchor));
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        ViewerSnapshot {
            anchor: self.anchor(),
            orientation: self.state.orientation,
            zoom: self.state.zoom,
        }
    }

    pub fn restore(&mut self, snapshot: &ViewerSnapshot) {
        self.cancel_animations();

        let mut next = (*self.state).clone();
        if next.orientation != snapshot.orientation {
            next.orientation = snapshot.orientation;
            next = next.relayout();
        }
        next.zoom = snapshot.zoom;

        let anchor = snapshot.anchor.or_else(|| self.take_anchor());
        self.apply_anchor(next, anchor);
    }

    fn take_anchor(&mut self) -> Option<Anchor> {
        self.pending_anchor
            .take()
            .or_else(|| create_anchor(&self.state))
    }

    fn apply_anchor(&mut self, next: LayoutState, anchor: Option<Anchor>) {
        let mut next = next.coerced();

        if !next.is_laid_out() {
            self.pending_anchor = anchor;
            self.publish(next);
            return;
        }

        if let Some(anchor) = anchor {
            next.offset = resolve_anchor(&anchor, &next);
        }
        self.publish(next.coerced());
    }

    // Derived views

    pub fn loaded_pages(&self) -> Vec<usize> {
        visibility::loaded_pages(&self.state, self.config.prefetch_margin)
    }

    pub fn visible_pages(&self) -> Vec<usize> {
        visibility::visible_pages(&self.state)
    }

    /// Page-local rect of page `index` currently on screen.
    pub fn visible_fragment(&self, index: usize) -> Option<Rect> {
        let position = self.state.position(index)?;
        visibility::visible_fragment(&self.state, position)
    }
}

fn zoom_about(state: &LayoutState, zoom: f32, centroid: Vec2) -> LayoutState {
    let zoom = state.zoom_bounds().clamp(zoom);
    let offset = state.offset + centroid_offset_correction(state.zoom, zoom, centroid);
    LayoutState {
        zoom,
        offset,
        ..state.clone()
    }
    .coerced()
}

/// One frame of a per-axis fling. The animation ends when it slows below
/// `stop_velocity` on screen or runs into a bound.
fn advance_decay(
    slot: &mut Option<DecayAnimation>,
    axis: Axis,
    state: &mut LayoutState,
    now_ms: u64,
    stop_velocity: f32,
) {
    let Some(decay) = slot.take() else {
        return;
    };
    if decay.is_cancelled() {
        return;
    }

    let bounds = state.bounds();
    let axis_bounds = match axis {
        Axis::Horizontal => bounds.horizontal,
        Axis::Vertical => bounds.vertical,
    };

    let value = decay.value_at(now_ms);
    let clamped = axis_bounds.clamp(value);
    match axis {
        Axis::Horizontal => state.offset.x = clamped,
        Axis::Vertical => state.offset.y = clamped,
    }

    let hit_bound = clamped != value;
    let too_slow = decay.velocity_at(now_ms).abs() * state.zoom < stop_velocity;
    if hit_bound || too_slow {
        decay.cancel();
    } else {
        *slot = Some(decay);
    }
}
