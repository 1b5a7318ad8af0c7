//! Job scheduler implementation
//!
//! Manages render job submission, priority-based execution ordering and the
//! job lifecycle (queued, running, completed or cancelled).

use crate::cancel::{CancellationRegistry, CancellationToken};
use crate::priority::{Job, JobId, JobPriority, JobType, PriorityQueue};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Job scheduler statistics
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Total jobs submitted
    pub jobs_submitted: u64,

    /// Total jobs completed (including jobs that ran and noticed cancellation)
    pub jobs_completed: u64,

    /// Total jobs removed from the queue before running
    pub jobs_cancelled: u64,

    /// Current queue size
    pub queue_size: usize,
}

impl SchedulerStats {
    /// Number of jobs that are queued or running
    pub fn pending_jobs(&self) -> u64 {
        self.jobs_submitted - self.jobs_completed - self.jobs_cancelled
    }
}

/// Job scheduler with priority queue
///
/// Thread-safe: the tile engine submits and cancels from the main context,
/// worker threads pull and complete.
///
/// # Example
///
/// ```
/// use pageflow_scheduler::{JobScheduler, JobPriority, JobType};
///
/// let scheduler = JobScheduler::new();
///
/// let (job_id, token) = scheduler.submit(JobPriority::Prefetch, JobType::RenderPage {
///     page_index: 3,
///     width: 800,
///     height: 1120,
///     generation: 1,
/// });
///
/// // A newer size arrived before the job started
/// scheduler.cancel_job(job_id);
/// assert!(token.is_cancelled());
/// assert!(scheduler.next_job().is_none());
/// ```
pub struct JobScheduler {
    queue: PriorityQueue,
    state: Arc<Mutex<SchedulerState>>,
    cancellation: CancellationRegistry,
}

struct SchedulerState {
    stats: SchedulerStats,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            state: Arc::new(Mutex::new(SchedulerState {
                stats: SchedulerStats::default(),
            })),
            cancellation: CancellationRegistry::new(),
        }
    }

    /// Submit a job to the scheduler
    ///
    /// Returns the job ID and the token the worker will observe. The token is
    /// registered before the job becomes visible to workers.
    pub fn submit(&self, priority: JobPriority, job_type: JobType) -> (JobId, CancellationToken) {
        let job_id = self.queue.next_id();
        let token = self.cancellation.register(job_id);
        self.queue.insert(job_id, priority, job_type);

        self.state.lock().unwrap().stats.jobs_submitted += 1;

        (job_id, token)
    }

    /// Take the highest priority job from the queue
    ///
    /// The job's token stays registered until `complete_job()` so that it can
    /// still be cancelled while it runs.
    pub fn next_job(&self) -> Option<Job> {
        self.queue.pop()
    }

    /// Mark a job as completed and unregister its token
    pub fn complete_job(&self, job_id: JobId) {
        self.state.lock().unwrap().stats.jobs_completed += 1;
        self.cancellation.unregister(job_id);
    }

    /// Cancel a specific job by ID
    ///
    /// A queued job is removed; a running job only has its token cancelled and
    /// the worker is expected to notice. Returns `true` if the job was found.
    pub fn cancel_job(&self, job_id: JobId) -> bool {
        let token_cancelled = self.cancellation.cancel(job_id);
        let removed = self.queue.remove_if(|job| job.id == job_id);

        if removed.is_empty() {
            return token_cancelled;
        }

        self.state.lock().unwrap().stats.jobs_cancelled += removed.len() as u64;
        self.cancellation.unregister(job_id);
        debug!(job = job_id, "cancelled queued job");
        true
    }

    /// Number of queued jobs
    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    /// Check if any job is queued
    pub fn has_pending_jobs(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Cancel every queued and running job
    pub fn clear(&self) {
        let removed = self.queue.remove_if(|_| true);

        self.cancellation.cancel_all();
        for job in &removed {
            self.cancellation.unregister(job.id);
        }

        if !removed.is_empty() {
            self.state.lock().unwrap().stats.jobs_cancelled += removed.len() as u64;
        }
        debug!(queued = removed.len(), "cleared scheduler");
    }

    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        let mut stats = self.state.lock().unwrap().stats.clone();
        stats.queue_size = self.queue.len();
        stats
    }

    /// Peek at the next job without removing it
    pub fn peek_next_job(&self) -> Option<Job> {
        self.queue.peek()
    }

    /// Get the cancellation token for a queued or running job
    pub fn get_cancellation_token(&self, job_id: JobId) -> Option<CancellationToken> {
        self.cancellation.get(job_id)
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}
