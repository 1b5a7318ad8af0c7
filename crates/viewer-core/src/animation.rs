//! Frame-driven animations.
//!
//! Animations do not own a timer. The controller samples them with the
//! current time on every tick and stops them through their token.

use crate::geometry::Vec2;
use pageflow_scheduler::CancellationToken;

/// Distance from the target at which a spring snaps and finishes.
pub const SPRING_SETTLE_THRESHOLD: f32 = 1e-3;

/// Exponentially decaying motion along one axis.
///
/// `v(t) = v0 * e^(-k t)` and `x(t) = x0 + v0 / k * (1 - e^(-k t))`.
#[derive(Debug, Clone)]
pub struct DecayAnimation {
    start_ms: u64,
    origin: f32,
    initial_velocity: f32,
    friction: f32,
    token: CancellationToken,
}

impl DecayAnimation {
    pub fn start(now_ms: u64, origin: f32, initial_velocity: f32, friction: f32) -> Self {
        Self {
            start_ms: now_ms,
            origin,
            initial_velocity,
            friction: friction.max(f32::EPSILON),
            token: CancellationToken::new(),
        }
    }

    fn elapsed_secs(&self, now_ms: u64) -> f32 {
        now_ms.saturating_sub(self.start_ms) as f32 / 1000.0
    }

    pub fn value_at(&self, now_ms: u64) -> f32 {
        let t = self.elapsed_secs(now_ms);
        self.origin + self.initial_velocity / self.friction * (1.0 - (-self.friction * t).exp())
    }

    pub fn velocity_at(&self, now_ms: u64) -> f32 {
        self.initial_velocity * (-self.friction * self.elapsed_secs(now_ms)).exp()
    }

    /// Where the motion would come to rest with no bounds in the way.
    pub fn target(&self) -> f32 {
        self.origin + self.initial_velocity / self.friction
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Critically damped spring from `from` to `target`, used for double-tap zoom.
///
/// `x(t) = T + (x0 - T)(1 + w t) e^(-w t)` with `w = sqrt(stiffness)`; it
/// approaches the target without overshooting.
#[derive(Debug, Clone)]
pub struct SpringAnimation {
    start_ms: u64,
    from: f32,
    target: f32,
    omega: f32,
    centroid: Vec2,
    token: CancellationToken,
}

impl SpringAnimation {
    pub fn start(now_ms: u64, from: f32, target: f32, stiffness: f32, centroid: Vec2) -> Self {
        Self {
            start_ms: now_ms,
            from,
            target,
            omega: stiffness.max(f32::EPSILON).sqrt(),
            centroid,
            token: CancellationToken::new(),
        }
    }

    pub fn value_at(&self, now_ms: u64) -> f32 {
        let t = now_ms.saturating_sub(self.start_ms) as f32 / 1000.0;
        let wt = self.omega * t;
        self.target + (self.from - self.target) * (1.0 + wt) * (-wt).exp()
    }

    pub fn is_settled(&self, now_ms: u64) -> bool {
        (self.value_at(now_ms) - self.target).abs() < SPRING_SETTLE_THRESHOLD
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Screen point kept fixed while the spring drives zoom.
    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
