//! Time-window debouncing
//!
//! A [`Debouncer`] holds at most one pending value. Submitting a new value
//! replaces the old one and restarts the window, so a burst of updates
//! collapses to the last value once the burst goes quiet.

/// Coalesces rapidly changing inputs into the last value of a burst
///
/// The debouncer is passive: it never spawns timers. The owner calls
/// [`poll`](Debouncer::poll) from its frame loop and acts on whatever comes out.
///
/// # Example
///
/// ```
/// use pageflow_scheduler::Debouncer;
///
/// let mut debouncer = Debouncer::new();
/// debouncer.submit(1, 0, 200);
/// debouncer.submit(2, 30, 200);
///
/// assert_eq!(debouncer.poll(200), None);
/// assert_eq!(debouncer.poll(230), Some(2));
/// assert_eq!(debouncer.poll(500), None);
/// ```
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    pending: Option<Pending<T>>,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    deadline_ms: u64,
}

impl<T> Debouncer<T> {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Replace the pending value and restart the window at `now_ms`
    ///
    /// A zero window makes the value available to the very next poll.
    pub fn submit(&mut self, value: T, now_ms: u64, window_ms: u64) {
        self.pending = Some(Pending {
            value,
            deadline_ms: now_ms.saturating_add(window_ms),
        });
    }

    /// Take the pending value if its window has elapsed
    pub fn poll(&mut self, now_ms: u64) -> Option<T> {
        match &self.pending {
            Some(pending) if now_ms >= pending.deadline_ms => {
                self.pending.take().map(|pending| pending.value)
            }
            _ => None,
        }
    }

    /// Drop the pending value, if any. Returns `true` if something was dropped.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Time at which the pending value becomes available
    pub fn deadline_ms(&self) -> Option<u64> {
        self.pending.as_ref().map(|pending| pending.deadline_ms)
    }

    /// The value waiting for its window, without taking it
    pub fn peek(&self) -> Option<&T> {
        self.pending.as_ref().map(|pending| &pending.value)
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_collapses_to_last_value() {
        let mut debouncer = Debouncer::new();
        for (i, now) in [0u64, 10, 20, 30, 40].into_iter().enumerate() {
            debouncer.submit(i, now, 200);
            assert_eq!(debouncer.poll(now), None);
        }

        assert_eq!(debouncer.deadline_ms(), Some(240));
        assert_eq!(debouncer.poll(239), None);
        assert_eq!(debouncer.poll(240), Some(4));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_zero_window_is_immediate() {
        let mut debouncer = Debouncer::default();
        debouncer.submit("size", 100, 0);
        assert_eq!(debouncer.peek(), Some(&"size"));
        assert_eq!(debouncer.poll(100), Some("size"));
    }

    #[test]
    fn test_cancel_drops_pending_value() {
        let mut debouncer = Debouncer::new();
        assert!(!debouncer.cancel());

        debouncer.submit(5, 0, 300);
        assert!(debouncer.cancel());
        assert_eq!(debouncer.poll(1_000), None);
    }

    #[test]
    fn test_resubmit_restarts_window() {
        let mut debouncer = Debouncer::new();
        debouncer.submit(1, 0, 300);
        debouncer.submit(2, 250, 300);

        assert_eq!(debouncer.poll(300), None);
        assert_eq!(debouncer.poll(550), Some(2));
    }
}
