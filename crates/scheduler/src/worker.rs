//! Render worker pool for parallel job execution.
//!
//! A fixed number of named threads pull jobs from a shared [`JobScheduler`],
//! run them through an executor callback and mark them complete. Jobs whose
//! token was cancelled while they sat in the queue are skipped without
//! invoking the executor.

use crate::{CancellationToken, Job, JobScheduler};
use std::io;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Callback function for job execution.
///
/// The callback receives the job and its cancellation token. It should check
/// `token.is_cancelled()` between expensive steps and return early once the
/// job has been superseded.
pub type JobExecutor = Arc<dyn Fn(&Job, &CancellationToken) + Send + Sync>;

/// Configuration for the render worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads to spawn.
    /// Default: number of logical CPU cores.
    pub num_workers: usize,

    /// How long an idle worker sleeps before looking at the queue again.
    /// Default: 5ms.
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus(),
            poll_interval: Duration::from_millis(5),
        }
    }
}

impl WorkerPoolConfig {
    /// Create a new worker pool configuration.
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
            ..Self::default()
        }
    }

    /// Set the poll interval for workers.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Render worker pool for parallel job execution.
///
/// # Example
///
/// ```
/// use pageflow_scheduler::{
///     CancellationToken, Job, JobPriority, JobScheduler, JobType, WorkerPool, WorkerPoolConfig,
/// };
/// use std::sync::Arc;
///
/// let scheduler = Arc::new(JobScheduler::new());
///
/// let executor = Arc::new(|job: &Job, token: &CancellationToken| {
///     if let JobType::RenderPage { page_index, width, height, .. } = job.job_type {
///         if token.is_cancelled() {
///             return;
///         }
///         println!("rendering page {} at {}x{}", page_index, width, height);
///     }
/// });
///
/// let pool = WorkerPool::new(scheduler.clone(), executor, WorkerPoolConfig::new(2)).unwrap();
///
/// scheduler.submit(JobPriority::Visible, JobType::RenderPage {
///     page_index: 0,
///     width: 600,
///     height: 840,
///     generation: 1,
/// });
///
/// pool.shutdown();
/// ```
pub struct WorkerPool {
    workers: Vec<Worker>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Create and start a new worker pool.
    ///
    /// # Arguments
    ///
    /// * `scheduler` - Job scheduler to pull jobs from
    /// * `executor` - Job executor callback for executing jobs
    /// * `config` - Worker pool configuration
    ///
    /// # Errors
    ///
    /// Returns the OS error if a worker thread cannot be spawned. Workers that
    /// were already started are stopped before returning.
    pub fn new(
        scheduler: Arc<JobScheduler>,
        executor: JobExecutor,
        config: WorkerPoolConfig,
    ) -> io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(config.num_workers);

        for id in 0..config.num_workers {
            let spawned = Worker::spawn(
                id,
                scheduler.clone(),
                executor.clone(),
                shutdown.clone(),
                config.poll_interval,
            );
            match spawned {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    shutdown.store(true, Ordering::Release);
                    for worker in workers {
                        worker.join();
                    }
                    return Err(err);
                }
            }
        }

        debug!(workers = config.num_workers, "started render worker pool");
        Ok(Self { workers, shutdown })
    }

    /// Get the number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Shutdown the worker pool gracefully.
    ///
    /// Blocks until every worker has finished its current job and exited.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::Release);

        for worker in self.workers {
            worker.join();
        }
        debug!("render worker pool stopped");
    }
}

/// A single worker thread in the worker pool.
struct Worker {
    id: usize,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(
        id: usize,
        scheduler: Arc<JobScheduler>,
        executor: JobExecutor,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> io::Result<Self> {
        let thread = thread::Builder::new()
            .name(format!("pageflow-render-{}", id))
            .spawn(move || Self::run(scheduler, executor, shutdown, poll_interval))?;

        Ok(Self {
            id,
            thread: Some(thread),
        })
    }

    /// Main worker loop: pull, execute, complete; sleep when idle.
    fn run(
        scheduler: Arc<JobScheduler>,
        executor: JobExecutor,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) {
        while !shutdown.load(Ordering::Acquire) {
            let Some(job) = scheduler.next_job() else {
                thread::sleep(poll_interval);
                continue;
            };

            let token = scheduler
                .get_cancellation_token(job.id)
                .unwrap_or_default();

            if !token.is_cancelled() {
                executor(&job, &token);
            }

            scheduler.complete_job(job.id);
        }
    }

    fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(worker = self.id, "render worker panicked");
            }
        }
    }
}

/// Number of logical CPU cores, used as the default worker count.
fn num_cpus() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JobId, JobPriority, JobType};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Instant;

    fn page(page_index: usize) -> JobType {
        JobType::RenderPage {
            page_index,
            width: 10,
            height: 14,
            generation: 1,
        }
    }

    fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    #[test]
    fn test_worker_pool_config() {
        let config = WorkerPoolConfig::default();
        assert!(config.num_workers > 0);

        let config = WorkerPoolConfig::new(0).with_poll_interval(Duration::from_millis(50));
        assert_eq!(config.num_workers, 1);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_worker_pool_creation() {
        let scheduler = Arc::new(JobScheduler::new());
        let executor = Arc::new(|_job: &Job, _token: &CancellationToken| {});

        let pool = WorkerPool::new(scheduler, executor, WorkerPoolConfig::new(2)).unwrap();
        assert_eq!(pool.num_workers(), 2);

        pool.shutdown();
    }

    #[test]
    fn test_worker_pool_executes_jobs() {
        let scheduler = Arc::new(JobScheduler::new());
        let executed = Arc::new(AtomicUsize::new(0));
        let executed_clone = executed.clone();

        let executor = Arc::new(move |_job: &Job, _token: &CancellationToken| {
            executed_clone.fetch_add(1, Ordering::SeqCst);
        });

        let pool = WorkerPool::new(scheduler.clone(), executor, WorkerPoolConfig::new(2)).unwrap();

        for i in 0..5 {
            scheduler.submit(JobPriority::Visible, page(i));
        }

        assert!(wait_until(Duration::from_secs(2), || {
            executed.load(Ordering::SeqCst) == 5
        }));

        pool.shutdown();
        assert_eq!(scheduler.stats().jobs_completed, 5);
    }

    #[test]
    fn test_worker_pool_skips_cancelled_jobs() {
        let scheduler = Arc::new(JobScheduler::new());
        let gate = Arc::new(Mutex::new(()));
        let executed = Arc::new(Mutex::new(Vec::new()));

        let held = gate.lock().unwrap();
        let executor = {
            let gate = gate.clone();
            let executed = executed.clone();
            Arc::new(move |job: &Job, token: &CancellationToken| {
                let _guard = gate.lock().unwrap();
                if !token.is_cancelled() {
                    executed.lock().unwrap().push(job.job_type.page_index());
                }
            })
        };

        let pool = WorkerPool::new(scheduler.clone(), executor, WorkerPoolConfig::new(1)).unwrap();

        let (first, _) = scheduler.submit(JobPriority::Visible, page(0));
        assert!(wait_until(Duration::from_secs(2), || {
            !scheduler.has_pending_jobs()
        }));

        // Page 0 is running (blocked on the gate); queue two more and supersede one
        let (second, _) = scheduler.submit(JobPriority::Visible, page(1));
        scheduler.submit(JobPriority::Visible, page(2));
        scheduler.cancel_job(first);
        scheduler.cancel_job(second);
        drop(held);

        assert!(wait_until(Duration::from_secs(2), || {
            scheduler.stats().pending_jobs() == 0
        }));
        pool.shutdown();

        assert_eq!(*executed.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_worker_pool_priority_ordering() {
        let scheduler = Arc::new(JobScheduler::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_clone = order.clone();

        let executor = Arc::new(move |job: &Job, _token: &CancellationToken| {
            order_clone.lock().unwrap().push(job.priority);
        });

        // Queue before the pool starts so the single worker sees both at once
        scheduler.submit(JobPriority::Prefetch, page(3));
        scheduler.submit(JobPriority::Visible, page(1));

        let pool = WorkerPool::new(scheduler.clone(), executor, WorkerPoolConfig::new(1)).unwrap();
        assert!(wait_until(Duration::from_secs(2), || {
            order.lock().unwrap().len() == 2
        }));
        pool.shutdown();

        assert_eq!(
            *order.lock().unwrap(),
            vec![JobPriority::Visible, JobPriority::Prefetch]
        );
    }

    #[test]
    fn test_busy_workers_run_every_submitted_job() {
        let scheduler = Arc::new(JobScheduler::new());
        let executed = Arc::new(AtomicUsize::new(0));
        let executed_clone = executed.clone();

        let executor = Arc::new(move |_job: &Job, token: &CancellationToken| {
            assert!(!token.is_cancelled());
            executed_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Idle workers spin on the queue while jobs are being submitted
        let config = WorkerPoolConfig::new(8).with_poll_interval(Duration::ZERO);
        let pool = WorkerPool::new(scheduler.clone(), executor, config).unwrap();

        let ids: Vec<JobId> = (0..20_000)
            .map(|i| scheduler.submit(JobPriority::Visible, page(i % 16)).0)
            .collect();

        assert!(wait_until(Duration::from_secs(20), || {
            scheduler.stats().jobs_completed == 20_000
        }));
        pool.shutdown();

        assert_eq!(executed.load(Ordering::SeqCst), 20_000);
        assert!(ids
            .iter()
            .all(|id| scheduler.get_cancellation_token(*id).is_none()));
    }
}
