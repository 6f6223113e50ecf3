//! Bounded-concurrency task group.
//!
//! A [`TaskGroup`] runs one work function over many contexts on a fixed
//! `rayon` worker pool. Admission is a fair counting semaphore: `submit`
//! blocks the producer until fewer than `max_concurrent` tasks are
//! outstanding, which makes it the pipeline's only backpressure point.
//!
//! ```text
//! submit(ctx) ──► Semaphore::acquire_owned (blocks when full)
//!                      │
//!                      ▼
//!               rayon::spawn ──► work(ctx) ──► drop(permit)
//! ```
//!
//! Work-function failures are the work function's business: it records them
//! on its context. The scheduler never sees an error from a running task, and
//! a panic is caught by the pool and logged.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info};

use crate::error::{CodecError, CodecResult};

/// Decrements the in-flight counter when a task ends, panicking or not.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Fixed worker pool with semaphore admission.
pub struct TaskGroup<C: Send + 'static> {
    label: String,
    work: Arc<dyn Fn(C) + Send + Sync>,
    admission: Arc<Semaphore>,
    max_concurrent: usize,
    in_flight: Arc<AtomicUsize>,
    pool: rayon::ThreadPool,
}

impl<C: Send + 'static> TaskGroup<C> {
    /// Creates a group with `workers` threads admitting at most
    /// `max_concurrent` outstanding tasks.
    pub fn new<F>(label: impl Into<String>, work: F, max_concurrent: usize, workers: usize) -> CodecResult<Self>
    where
        F: Fn(C) + Send + Sync + 'static,
    {
        let label: String = label.into();
        if max_concurrent == 0 || max_concurrent > Semaphore::MAX_PERMITS {
            return Err(CodecError::internal(format!(
                "{}: max_concurrent must be between 1 and {}, got {}",
                label,
                Semaphore::MAX_PERMITS,
                max_concurrent
            )));
        }
        let workers = workers.max(1);

        let thread_label = label.clone();
        let panic_label = label.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |i| format!("{}-{}", thread_label, i))
            .panic_handler(move |payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(group = %panic_label, panic = %message, "Task panicked");
            })
            .build()
            .map_err(|e| CodecError::internal(format!("{}: failed to build worker pool: {}", label, e)))?;

        info!(
            group = %label,
            max_concurrent,
            workers,
            "Created task group"
        );

        Ok(Self {
            label,
            work: Arc::new(work),
            admission: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            in_flight: Arc::new(AtomicUsize::new(0)),
            pool,
        })
    }

    /// Blocks until a slot is free, then runs the work function on `context`
    /// asynchronously.
    pub fn submit(&self, context: C) -> CodecResult<()> {
        let permit = self.admit()?;
        self.in_flight.fetch_add(1, Ordering::AcqRel);

        let work = Arc::clone(&self.work);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        self.pool.spawn(move || run(work, context, permit, guard));
        Ok(())
    }

    fn admit(&self) -> CodecResult<OwnedSemaphorePermit> {
        futures::executor::block_on(Arc::clone(&self.admission).acquire_owned())
            .map_err(|_| CodecError::internal(format!("{}: admission closed", self.label)))
    }

    /// Blocks until every submitted task has finished.
    pub fn wait_for_completion(&self) -> CodecResult<()> {
        let all = self.max_concurrent as u32;
        let permits = futures::executor::block_on(self.admission.acquire_many(all))
            .map_err(|_| CodecError::internal(format!("{}: admission closed", self.label)))?;
        drop(permits);
        debug!(group = %self.label, "Task group idle");
        Ok(())
    }

    /// Tasks admitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Free admission slots right now.
    pub fn available(&self) -> usize {
        self.admission.available_permits()
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

fn run<C>(work: Arc<dyn Fn(C) + Send + Sync>, context: C, permit: OwnedSemaphorePermit, guard: InFlightGuard) {
    // Locals drop in reverse order: the counter falls before the slot opens.
    let _permit = permit;
    let _guard = guard;
    work(context);
}

impl<C: Send + 'static> std::fmt::Debug for TaskGroup<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGroup")
            .field("label", &self.label)
            .field("max_concurrent", &self.max_concurrent)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
