//! Cancellation tokens for render jobs, animations and debounce windows
//!
//! A token is a shared flag: the owner of a piece of work cancels it, the code
//! doing the work polls it at every step and bails out early. Render workers,
//! kinetic decay animations and the double-tap spring all use the same type,
//! so "superseded" means the same thing everywhere.

use crate::JobId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

/// Cancellation token for cooperative cancellation
///
/// Workers periodically check `is_cancelled()` to decide whether to stop.
/// Clones share the same underlying flag.
///
/// # Example
///
/// ```
/// use pageflow_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
///
/// // A superseding request cancels the previous one
/// token.cancel();
/// assert!(worker_token.is_cancelled());
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, active token
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a token that is already cancelled
    ///
    /// Handy as the "nothing running" placeholder for an animation slot.
    pub fn cancelled() -> Self {
        let token = Self::new();
        token.cancel();
        token
    }

    /// Cancel this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if this token (or any clone) has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Registry associating job IDs with their cancellation tokens
///
/// The scheduler uses this to cancel jobs by ID, whether they are still queued
/// or already running on a worker.
///
/// # Example
///
/// ```
/// use pageflow_scheduler::{CancellationRegistry, JobId};
///
/// let registry = CancellationRegistry::new();
///
/// let job_id: JobId = 1;
/// let token = registry.register(job_id);
///
/// registry.cancel(job_id);
/// assert!(token.is_cancelled());
/// ```
pub struct CancellationRegistry {
    tokens: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
}

impl CancellationRegistry {
    /// Create a new empty cancellation registry
    pub fn new() -> Self {
        Self {
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a job and return a clone of its fresh token
    pub fn register(&self, job_id: JobId) -> CancellationToken {
        let token = CancellationToken::new();
        let mut tokens = self.tokens.lock().unwrap();
        tokens.insert(job_id, token.clone());
        token
    }

    /// Cancel a job by ID
    ///
    /// Returns `true` if the job was registered.
    pub fn cancel(&self, job_id: JobId) -> bool {
        let tokens = self.tokens.lock().unwrap();
        match tokens.get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered job, returning how many there were
    pub fn cancel_all(&self) -> usize {
        let tokens = self.tokens.lock().unwrap();
        for token in tokens.values() {
            token.cancel();
        }
        tokens.len()
    }

    /// Remove a job from the registry (completed or dropped from the queue)
    pub fn unregister(&self, job_id: JobId) -> bool {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.remove(&job_id).is_some()
    }

    /// Get the token for a job, if it is still registered
    pub fn get(&self, job_id: JobId) -> Option<CancellationToken> {
        let tokens = self.tokens.lock().unwrap();
        tokens.get(&job_id).cloned()
    }

    /// Number of registered jobs
    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tokens.lock().unwrap().is_empty()
    }

    /// Remove all tokens without cancelling them
    pub fn clear(&self) {
        self.tokens.lock().unwrap().clear();
    }
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_basic() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());

        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_cancelled_constructor() {
        let token = CancellationToken::cancelled();
        assert!(token.is_cancelled());
        assert!(format!("{:?}", token).contains("true"));
    }

    #[test]
    fn test_registry_cancel() {
        let registry = CancellationRegistry::new();
        let token = registry.register(1);

        assert!(registry.cancel(1));
        assert!(token.is_cancelled());
        assert!(!registry.cancel(999));
    }

    #[test]
    fn test_registry_cancel_all() {
        let registry = CancellationRegistry::new();
        let tokens: Vec<_> = (1..=3).map(|id| registry.register(id)).collect();

        assert_eq!(registry.cancel_all(), 3);
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
    }

    #[test]
    fn test_registry_unregister_and_get() {
        let registry = CancellationRegistry::new();
        let token = registry.register(7);

        let fetched = registry.get(7).unwrap();
        token.cancel();
        assert!(fetched.is_cancelled());

        assert!(registry.unregister(7));
        assert!(!registry.unregister(7));
        assert!(registry.get(7).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_clear_keeps_tokens_active() {
        let registry = CancellationRegistry::default();
        let token = registry.register(1);
        registry.register(2);
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
        assert!(!token.is_cancelled());
    }
}
