//! Multi-queue thread-pool scheduler
//!
//! One worker pool, five queues with distinct delivery contracts:
//!
//! - inbox: [`AsyncTask`]s run once on a worker, then move to the outbox
//! - outbox: finished async tasks waiting for [`Scheduler::advance`] to run
//!   their `done` on the owning thread
//! - parallel: [`ParallelTask`]s fanned out as shared-ownership proxies;
//!   dropping the last proxy fires `exhausted` exactly once, so the join
//!   is the reference count itself
//! - continuous: [`ContinuousTask`]s re-armed after every run until they
//!   ask for removal
//! - delete: deferred destructors, drained only on the owning thread
//!
//! Workers yield on empty queues; pushes spin-retry against the bounded
//! capacity. [`Scheduler::drop_everything`] fences all workers, drains every
//! queue on the owning thread, and resumes.
//!
//! Author: Moroya Sakamoto

pub mod domain;

pub use domain::{DomainTaskChain, IndexRange, IterDomain, LeafChain, TaskDomain};

use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;
use thiserror::Error;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

/// Bound on every queue; pushes spin once it is hit
const QUEUE_CAPACITY: usize = 1024;

/// Recoverable scheduler misuse
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler was torn down and refuses new work
    #[error("scheduler is no longer live")]
    Terminated,
}

/// A one-shot background job with a main-thread completion step
pub trait AsyncTask: Send {
    /// Executed once on a worker thread
    fn run(&mut self);
    /// Executed on the owning thread during [`Scheduler::advance`]
    fn done(&mut self);
    /// Called instead of `done` when the scheduler drains before completion
    fn abort(&mut self) {}
}

/// What a continuous task wants next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuousStatus {
    /// Re-arm immediately
    Working,
    /// Re-arm, but the worker may nap first
    Converged,
    /// Drop the task
    Remove,
}

/// A job that re-runs until it asks to stop
pub trait ContinuousTask: Send {
    /// One iteration
    fn run(&mut self) -> ContinuousStatus;
}

/// A job shared by several workers at once
///
/// `run` is re-entered concurrently from up to `max_parallelism` workers;
/// the task carves up its own domain internally. `exhausted` runs exactly
/// once, on whichever thread drops the last proxy.
pub trait ParallelTask: Send + Sync {
    /// Concurrent worker entry point
    fn run(&self);
    /// Fired after the last worker releases the task
    fn exhausted(&mut self, scheduler: &Scheduler) {
        let _ = scheduler;
    }
    /// Upper bound on concurrent workers, clamped to the pool size
    fn max_parallelism(&self) -> usize {
        usize::MAX
    }
}

// Shared-ownership proxy for one parallel task. Every clone of the Arc sits
// in the parallel queue or in a worker's hands; the Drop of the final clone
// is the join point.
struct ParallelDispatch {
    task: Option<Box<dyn ParallelTask>>,
    scheduler: Scheduler,
}

impl ParallelDispatch {
    fn run(&self) {
        if let Some(task) = &self.task {
            task.run();
        }
    }
}

impl Drop for ParallelDispatch {
    fn drop(&mut self) {
        if let Some(mut task) = self.task.take() {
            task.exhausted(&self.scheduler);
        }
    }
}

type Deferred = Box<dyn FnOnce() + Send>;

/// Queue depths and pool shape, for logs and tests
#[derive(Debug, Clone, Copy)]
pub struct SchedulerStats {
    /// Worker threads (zero in single-thread mode)
    pub workers: usize,
    /// Pending async tasks
    pub inbox: usize,
    /// Finished async tasks awaiting `advance`
    pub outbox: usize,
    /// Outstanding parallel proxies
    pub parallel: usize,
    /// Armed continuous tasks
    pub continuous: usize,
    /// Pending deferred destructors
    pub delete: usize,
}

/// Scheduler construction knobs
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerConfig {
    /// Spawn no workers; `advance` performs the work instead
    pub force_single_thread: bool,
}

struct Inner {
    live: AtomicBool,
    fence: AtomicBool,
    draining: AtomicBool,
    paused: AtomicUsize,
    worker_count: usize,
    main_thread: ThreadId,
    inbox: ArrayQueue<Box<dyn AsyncTask>>,
    outbox: ArrayQueue<Box<dyn AsyncTask>>,
    parallel: ArrayQueue<Arc<ParallelDispatch>>,
    continuous: ArrayQueue<Box<dyn ContinuousTask>>,
    delete: ArrayQueue<Deferred>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Cloneable handle to one scheduler instance
///
/// The thread that called [`Scheduler::setup`] owns the instance: `advance`,
/// async enqueue, `drop_everything`, and `teardown` belong to it alone.
/// Parallel submission is open to any thread, which is what lets a finished
/// chain stage submit its successor from a worker.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

fn push_spin<T>(queue: &ArrayQueue<T>, mut item: T) {
    loop {
        match queue.push(item) {
            Ok(()) => return,
            Err(back) => {
                item = back;
                thread::yield_now();
            }
        }
    }
}

fn worker_loop(scheduler: Scheduler) {
    let inner = &scheduler.inner;
    while inner.live.load(Ordering::Acquire) {
        if inner.fence.load(Ordering::Acquire) {
            inner.paused.fetch_add(1, Ordering::AcqRel);
            while inner.fence.load(Ordering::Acquire) && inner.live.load(Ordering::Acquire) {
                thread::yield_now();
            }
            inner.paused.fetch_sub(1, Ordering::AcqRel);
            continue;
        }
        if !scheduler.run_one() {
            thread::yield_now();
        }
    }
}

impl Scheduler {
    /// Start a scheduler and its worker pool
    ///
    /// The pool leaves one hardware thread for the caller, with a floor of
    /// two workers on small machines.
    pub fn setup(config: &SchedulerConfig) -> Scheduler {
        let worker_count = if config.force_single_thread {
            0
        } else {
            (num_cpus::get().saturating_sub(1)).max(2)
        };
        let scheduler = Scheduler {
            inner: Arc::new(Inner {
                live: AtomicBool::new(true),
                fence: AtomicBool::new(false),
                draining: AtomicBool::new(false),
                paused: AtomicUsize::new(0),
                worker_count,
                main_thread: thread::current().id(),
                inbox: ArrayQueue::new(QUEUE_CAPACITY),
                outbox: ArrayQueue::new(QUEUE_CAPACITY),
                parallel: ArrayQueue::new(QUEUE_CAPACITY),
                continuous: ArrayQueue::new(QUEUE_CAPACITY),
                delete: ArrayQueue::new(QUEUE_CAPACITY),
                workers: Mutex::new(Vec::new()),
            }),
        };
        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let handle = scheduler.clone();
            workers.push(thread::spawn(move || worker_loop(handle)));
        }
        *scheduler.inner.workers.lock() = workers;
        log::info!("scheduler up with {} workers", worker_count);
        scheduler
    }

    /// Whether the scheduler is accepting work
    pub fn live(&self) -> bool {
        self.inner.live.load(Ordering::Acquire)
    }

    /// Worker threads backing this scheduler
    pub fn worker_count(&self) -> usize {
        self.inner.worker_count
    }

    /// Current queue depths
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            workers: self.inner.worker_count,
            inbox: self.inner.inbox.len(),
            outbox: self.inner.outbox.len(),
            parallel: self.inner.parallel.len(),
            continuous: self.inner.continuous.len(),
            delete: self.inner.delete.len(),
        }
    }

    fn assert_owner(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.inner.main_thread,
            "owner-thread operation called from a worker"
        );
    }

    /// Submit a one-shot async task
    pub fn enqueue(&self, task: Box<dyn AsyncTask>) -> Result<(), SchedulerError> {
        self.assert_owner();
        if !self.live() {
            return Err(SchedulerError::Terminated);
        }
        push_spin(&self.inner.inbox, task);
        Ok(())
    }

    /// Submit a parallel task, fanning it out across the pool
    ///
    /// Fan-out width is the smaller of the pool size and the task's own
    /// `max_parallelism`, and at least one either way. Callable from worker
    /// threads; during a drain the task is discarded instead.
    pub fn enqueue_parallel(&self, task: Box<dyn ParallelTask>) {
        if self.inner.draining.load(Ordering::Acquire) || !self.live() {
            return;
        }
        let fanout = self
            .inner
            .worker_count
            .max(1)
            .min(task.max_parallelism())
            .max(1);
        let dispatch = Arc::new(ParallelDispatch {
            task: Some(task),
            scheduler: self.clone(),
        });
        for _ in 0..fanout {
            push_spin(&self.inner.parallel, Arc::clone(&dispatch));
        }
    }

    /// Arm a continuous task
    pub fn enqueue_continuous(&self, task: Box<dyn ContinuousTask>) -> Result<(), SchedulerError> {
        self.assert_owner();
        if !self.live() {
            return Err(SchedulerError::Terminated);
        }
        push_spin(&self.inner.continuous, task);
        Ok(())
    }

    /// Defer dropping `value` to the owning thread's next `advance`
    pub fn defer_drop<T: Send + 'static>(&self, value: T) {
        push_spin(&self.inner.delete, Box::new(move || drop(value)));
    }

    // One unit of worker-side work. Parallel tasks win over async so chain
    // stages keep the pool saturated.
    fn run_one(&self) -> bool {
        if let Some(dispatch) = self.inner.parallel.pop() {
            dispatch.run();
            // Dropping the proxy may fire `exhausted`.
            drop(dispatch);
            return true;
        }
        if let Some(mut task) = self.inner.inbox.pop() {
            task.run();
            push_spin(&self.inner.outbox, task);
            return true;
        }
        if let Some(mut task) = self.inner.continuous.pop() {
            match task.run() {
                ContinuousStatus::Working => push_spin(&self.inner.continuous, task),
                ContinuousStatus::Converged => {
                    push_spin(&self.inner.continuous, task);
                    thread::sleep(Duration::from_millis(1));
                }
                ContinuousStatus::Remove => drop(task),
            }
            return true;
        }
        false
    }

    /// Owner-thread pump
    ///
    /// Runs completions and deferred destructors; in single-thread mode it
    /// also performs one unit of worker work first.
    pub fn advance(&self) {
        self.assert_owner();
        if self.inner.worker_count == 0 {
            self.run_one();
        }
        while let Some(mut task) = self.inner.outbox.pop() {
            log::debug!("async task complete");
            task.done();
        }
        while let Some(deferred) = self.inner.delete.pop() {
            deferred();
        }
    }

    // Park every worker at the fence before draining.
    fn raise_fence(&self) {
        self.inner.fence.store(true, Ordering::Release);
        while self.inner.paused.load(Ordering::Acquire) < self.inner.worker_count {
            thread::yield_now();
        }
    }

    fn drain(&self) {
        self.inner.draining.store(true, Ordering::Release);
        while let Some(deferred) = self.inner.delete.pop() {
            deferred();
        }
        while let Some(task) = self.inner.continuous.pop() {
            drop(task);
        }
        while let Some(dispatch) = self.inner.parallel.pop() {
            // The final proxy still fires `exhausted`; its baton pass is
            // swallowed by the draining flag.
            drop(dispatch);
        }
        while let Some(mut task) = self.inner.inbox.pop() {
            task.abort();
        }
        while let Some(mut task) = self.inner.outbox.pop() {
            task.abort();
        }
        self.inner.draining.store(false, Ordering::Release);
    }

    /// Abandon all queued work, keeping the pool alive
    pub fn drop_everything(&self) {
        self.assert_owner();
        log::info!("scheduler dropping all queued work");
        self.raise_fence();
        self.drain();
        self.inner.fence.store(false, Ordering::Release);
    }

    /// Drain everything and stop the pool
    ///
    /// The handle stays valid but refuses further work.
    pub fn teardown(&self) {
        self.assert_owner();
        log::info!("scheduler shutting down");
        self.raise_fence();
        self.drain();
        self.inner.live.store(false, Ordering::Release);
        self.inner.fence.store(false, Ordering::Release);
        let workers = std::mem::take(&mut *self.inner.workers.lock());
        for worker in workers {
            let _ = worker.join();
        }
    }
}
