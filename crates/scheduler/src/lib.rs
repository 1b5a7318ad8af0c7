//! Pageflow Scheduler Library
//!
//! Render job scheduling with a priority queue and cancellable workers.
//!
//! This crate provides the execution plumbing the viewer's tile engine runs on:
//! jobs are organized by priority (visible pages before prefetched pages) and
//! executed in priority order with FIFO ordering within each priority level.
//! It also carries the time primitives the engine is driven by: an injectable
//! [`Clock`] and a time-window [`Debouncer`].
//!
//! # Example
//!
//! ```
//! use pageflow_scheduler::{JobScheduler, JobPriority, JobType};
//!
//! let scheduler = JobScheduler::new();
//!
//! // Submit a high-priority full-page render
//! let (job_id, token) = scheduler.submit(
//!     JobPriority::Visible,
//!     JobType::RenderPage {
//!         page_index: 0,
//!         width: 1000,
//!         height: 1400,
//!         generation: 1,
//!     },
//! );
//!
//! // Get the next job to execute
//! if let Some(job) = scheduler.next_job() {
//!     println!("Executing job {}", job.id);
//!     // Worker can check token.is_cancelled() during execution
//!     scheduler.complete_job(job.id);
//! }
//!
//! // A newer request supersedes a job that has not started yet
//! let (stale, stale_token) = scheduler.submit(
//!     JobPriority::Prefetch,
//!     JobType::RenderPage {
//!         page_index: 1,
//!         width: 1000,
//!         height: 1400,
//!         generation: 2,
//!     },
//! );
//! scheduler.cancel_job(stale);
//! assert!(stale_token.is_cancelled());
//! # let _ = (job_id, token);
//! ```

mod cancel;
mod clock;
mod debounce;
mod priority;
mod scheduler;
mod worker;

// Re-export public API
pub use cancel::{CancellationRegistry, CancellationToken};
pub use clock::{Clock, ManualClock, SystemClock};
pub use debounce::Debouncer;
pub use priority::{FragmentRegion, Job, JobId, JobPriority, JobType};
pub use scheduler::{JobScheduler, SchedulerStats};
pub use worker::{JobExecutor, WorkerPool, WorkerPoolConfig};
