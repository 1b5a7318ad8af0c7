use crate::geometry::Vec2;
use std::collections::VecDeque;

/// Rolling window of `(timestamp, offset)` samples used to estimate fling
/// velocity when a pan ends.
#[derive(Debug, Clone)]
pub struct VelocityTracker {
    window_ms: u64,
    samples: VecDeque<(u64, Vec2)>,
}

impl VelocityTracker {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            samples: VecDeque::new(),
        }
    }

    pub fn add(&mut self, timestamp_ms: u64, position: Vec2) {
        // Out-of-order input restarts tracking
        if self.samples.back().is_some_and(|(last, _)| *last > timestamp_ms) {
            self.samples.clear();
        }

        self.samples.push_back((timestamp_ms, position));

        let oldest_allowed = timestamp_ms.saturating_sub(self.window_ms);
        while self.samples.front().is_some_and(|(t, _)| *t < oldest_allowed) {
            self.samples.pop_front();
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Least-squares slope of position over time, in units per second.
    pub fn velocity(&self) -> Vec2 {
        if self.samples.len() < 2 {
            return Vec2::ZERO;
        }

        let n = self.samples.len() as f64;
        let t0 = self.samples[0].0;
        let (mut sum_t, mut sum_x, mut sum_y) = (0.0_f64, 0.0_f64, 0.0_f64);
        for (t, p) in &self.samples {
            sum_t += (t - t0) as f64 / 1000.0;
            sum_x += p.x as f64;
            sum_y += p.y as f64;
        }
        let (mean_t, mean_x, mean_y) = (sum_t / n, sum_x / n, sum_y / n);

        let (mut var_t, mut cov_x, mut cov_y) = (0.0_f64, 0.0_f64, 0.0_f64);
        for (t, p) in &self.samples {
            let dt = (t - t0) as f64 / 1000.0 - mean_t;
            var_t += dt * dt;
            cov_x += dt * (p.x as f64 - mean_x);
            cov_y += dt * (p.y as f64 - mean_y);
        }

        if var_t <= f64::EPSILON {
            return Vec2::ZERO;
        }

        Vec2::new((cov_x / var_t) as f32, (cov_y / var_t) as f32)
    }
}
