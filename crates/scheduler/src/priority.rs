//! Priority-based job queue
//!
//! Render jobs for visible pages run before jobs for pages that are only
//! prefetched. Within one priority level jobs run in submission order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};

/// Job priority levels
///
/// Higher numeric values have higher priority and are executed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobPriority {
    /// Page is inside the prefetch margin but not on screen
    Prefetch = 0,

    /// Page overlaps the viewport
    Visible = 1,
}

/// Unique job identifier
pub type JobId = u64;

/// Page-local rectangle of a fragment render, in unzoomed layout units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentRegion {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl FragmentRegion {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Job type enumeration
///
/// Every job carries the generation of the pipeline that issued it so that
/// results of superseded requests can be recognised and dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum JobType {
    /// Rasterize a whole page at a target pixel size
    RenderPage {
        page_index: usize,
        width: u32,
        height: u32,
        generation: u64,
    },

    /// Rasterize a sub-rectangle of a page at `zoom` times its layout size
    RenderFragment {
        page_index: usize,
        page_width: f32,
        page_height: f32,
        region: FragmentRegion,
        zoom: f32,
        generation: u64,
    },
}

impl JobType {
    /// Index of the page this job renders
    pub fn page_index(&self) -> usize {
        match self {
            JobType::RenderPage { page_index, .. } => *page_index,
            JobType::RenderFragment { page_index, .. } => *page_index,
        }
    }

    /// Pipeline generation the job was issued for
    pub fn generation(&self) -> u64 {
        match self {
            JobType::RenderPage { generation, .. } => *generation,
            JobType::RenderFragment { generation, .. } => *generation,
        }
    }
}

/// A scheduled job with priority
///
/// Jobs are ordered by priority (higher first), then by insertion order
/// (earlier first).
#[derive(Debug, Clone)]
pub struct Job {
    /// Unique job identifier
    pub id: JobId,

    /// Job priority level
    pub priority: JobPriority,

    /// Job type and parameters
    pub job_type: JobType,

    /// Insertion order (used for FIFO within same priority)
    insertion_order: u64,
}

impl Job {
    /// Create a new job
    pub fn new(id: JobId, priority: JobPriority, job_type: JobType, insertion_order: u64) -> Self {
        Self {
            id,
            priority,
            job_type,
            insertion_order,
        }
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            // BinaryHeap is a max heap, so earlier insertion must compare greater
            Ordering::Equal => other.insertion_order.cmp(&self.insertion_order),
            other => other,
        }
    }
}

/// Thread-safe priority queue for jobs
pub struct PriorityQueue {
    state: Arc<Mutex<QueueState>>,
}

struct QueueState {
    heap: BinaryHeap<Job>,
    next_job_id: JobId,
    insertion_counter: u64,
}

impl PriorityQueue {
    /// Create a new empty priority queue
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_job_id: 1,
                insertion_counter: 0,
            })),
        }
    }

    /// Push a job onto the queue, returning its newly assigned ID
    pub fn push(&self, priority: JobPriority, job_type: JobType) -> JobId {
        let job_id = self.next_id();
        self.insert(job_id, priority, job_type);
        job_id
    }

    /// Reserve an ID for a job that is inserted later with
    /// [`insert`](Self::insert)
    pub fn next_id(&self) -> JobId {
        let mut state = self.state.lock().unwrap();
        let job_id = state.next_job_id;
        state.next_job_id += 1;
        job_id
    }

    /// Queue a job under an ID from [`next_id`](Self::next_id)
    pub fn insert(&self, job_id: JobId, priority: JobPriority, job_type: JobType) {
        let mut state = self.state.lock().unwrap();
        let insertion_order = state.insertion_counter;
        state.insertion_counter += 1;

        state
            .heap
            .push(Job::new(job_id, priority, job_type, insertion_order));
    }

    /// Pop the highest priority job from the queue
    pub fn pop(&self) -> Option<Job> {
        self.state.lock().unwrap().heap.pop()
    }

    /// Peek at the highest priority job without removing it
    pub fn peek(&self) -> Option<Job> {
        self.state.lock().unwrap().heap.peek().cloned()
    }

    /// Number of queued jobs
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().heap.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().heap.is_empty()
    }

    /// Clear all jobs from the queue
    pub fn clear(&self) {
        self.state.lock().unwrap().heap.clear();
    }

    /// Remove all jobs matching a predicate
    ///
    /// Returns the removed jobs.
    pub fn remove_if<F>(&self, predicate: F) -> Vec<Job>
    where
        F: Fn(&Job) -> bool,
    {
        let mut state = self.state.lock().unwrap();
        let (removed, remaining): (Vec<Job>, Vec<Job>) =
            std::mem::take(&mut state.heap).into_iter().partition(|job| predicate(job));
        state.heap = remaining.into_iter().collect();
        removed
    }

    /// All queued jobs, in arbitrary order
    pub fn jobs(&self) -> Vec<Job> {
        self.state.lock().unwrap().heap.iter().cloned().collect()
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}
