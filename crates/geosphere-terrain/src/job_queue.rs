//! Job queues and per-consumer job clients.
//!
//! A [`JobQueue`] runs opaque [`Task`]s somewhere: on a pool of worker
//! threads ([`AsyncJobQueue`]) or only when the owner asks
//! ([`SyncJobQueue`]). A [`JobClient`] sits on top of a queue, turns typed
//! [`Job`]s into tasks, and hands their outputs back on the owning thread
//! through [`JobClient::drain`], separating finished jobs from cancelled ones.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use dashmap::DashMap;

/// A unit of work that can run on any thread.
///
/// `on_run` may only touch data owned by the job itself.
pub trait Job: Send + 'static {
    type Output: Send + 'static;

    fn on_run(self) -> Self::Output;
}

/// Type-erased work item accepted by a [`JobQueue`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Errors raised when submitting work.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job queue is shut down")]
    QueueClosed,
    #[error("job queue is full ({capacity} tasks pending)")]
    QueueFull { capacity: usize },
    #[error("failed to spawn job worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Something that executes tasks.
pub trait JobQueue: Send + Sync {
    /// Queue a task for execution.
    fn push(&self, task: Task) -> Result<(), JobError>;

    /// Tasks queued or running but not yet finished.
    fn pending(&self) -> usize;
}

/// Worker-thread pool fed by a bounded crossbeam channel.
pub struct AsyncJobQueue {
    /// Channel sender for submitting tasks; `None` after shutdown.
    task_sender: Option<Sender<Task>>,
    /// Handles to the worker threads (for shutdown).
    worker_handles: Vec<JoinHandle<()>>,
    /// Maximum number of queued tasks.
    capacity: usize,
    /// Tasks queued or executing.
    pending: Arc<AtomicUsize>,
}

impl AsyncJobQueue {
    /// Spawn `thread_count` workers (at least one) sharing a queue of `capacity` tasks.
    pub fn new(thread_count: usize, capacity: usize) -> Result<Self, JobError> {
        let capacity = capacity.max(1);
        let (task_tx, task_rx) = crossbeam_channel::bounded::<Task>(capacity);
        let pending = Arc::new(AtomicUsize::new(0));

        let thread_count = thread_count.max(1);
        let mut handles = Vec::with_capacity(thread_count);
        for i in 0..thread_count {
            let rx = task_rx.clone();
            let pending = Arc::clone(&pending);
            let handle = std::thread::Builder::new()
                .name(format!("geopatch-worker-{i}"))
                .spawn(move || {
                    while let Ok(task) = rx.recv() {
                        task();
                        pending.fetch_sub(1, Ordering::AcqRel);
                    }
                })?;
            handles.push(handle);
        }
        tracing::debug!(threads = thread_count, capacity, "started job workers");

        Ok(Self {
            task_sender: Some(task_tx),
            worker_handles: handles,
            capacity,
            pending,
        })
    }

    /// Thread count based on CPU cores, leaving headroom for the main thread.
    pub fn with_defaults() -> Result<Self, JobError> {
        let cpus = num_cpus::get().max(2);
        Self::new((cpus - 1).max(1), 1024)
    }

    pub fn thread_count(&self) -> usize {
        self.worker_handles.len()
    }

    /// Close the queue and join every worker. Tasks already queued still run.
    pub fn shutdown(&mut self) {
        self.task_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl JobQueue for AsyncJobQueue {
    fn push(&self, task: Task) -> Result<(), JobError> {
        let sender = self.task_sender.as_ref().ok_or(JobError::QueueClosed)?;
        self.pending.fetch_add(1, Ordering::AcqRel);
        sender.try_send(task).map_err(|e| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            match e {
                TrySendError::Full(_) => JobError::QueueFull {
                    capacity: self.capacity,
                },
                TrySendError::Disconnected(_) => JobError::QueueClosed,
            }
        })
    }

    fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

impl Drop for AsyncJobQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A queue whose tasks only run when the owner calls [`run_jobs`](Self::run_jobs).
///
/// Makes tree updates reproducible in tests and tools that do not want threads.
#[derive(Default)]
pub struct SyncJobQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl SyncJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run up to `max` queued tasks in submission order. Returns how many ran.
    pub fn run_jobs(&self, max: usize) -> usize {
        let mut ran = 0;
        while ran < max {
            // The lock is released before running so tasks may push more work.
            let next = self.lock().pop_front();
            let Some(task) = next else { break };
            task();
            ran += 1;
        }
        ran
    }

    /// Run until the queue is empty.
    pub fn run_all(&self) -> usize {
        self.run_jobs(usize::MAX)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JobQueue for SyncJobQueue {
    fn push(&self, task: Task) -> Result<(), JobError> {
        self.lock().push_back(task);
        Ok(())
    }

    fn pending(&self) -> usize {
        self.lock().len()
    }
}

/// Identifies one ordered job within its [`JobClient`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// Owner's handle to an in-flight job. Dropping it cancels the job.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    cancelled: Arc<AtomicBool>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Mark the job cancelled. Its output will be discarded when drained.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A drained job output.
#[derive(Debug)]
pub enum Completion<T> {
    /// The job finished and its owner still wants the result.
    Finished(JobId, T),
    /// The job was cancelled while in flight. Dropping the output is the
    /// owner's cancellation hook.
    Cancelled(JobId, T),
}

/// Submits typed jobs to a shared queue and collects their outputs.
pub struct JobClient<T> {
    queue: Arc<dyn JobQueue>,
    result_sender: Sender<(JobId, T)>,
    result_receiver: Receiver<(JobId, T)>,
    /// Cancellation flag per ordered, not yet drained job.
    active_jobs: DashMap<JobId, Arc<AtomicBool>>,
    next_id: u64,
}

impl<T: Send + 'static> JobClient<T> {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        let (result_sender, result_receiver) = crossbeam_channel::unbounded();
        Self {
            queue,
            result_sender,
            result_receiver,
            active_jobs: DashMap::new(),
            next_id: 0,
        }
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    /// Submit `job`. The returned handle must be kept alive for the output
    /// to be delivered as [`Completion::Finished`].
    pub fn order<J>(&mut self, job: J) -> Result<JobHandle, JobError>
    where
        J: Job<Output = T>,
    {
        let id = JobId(self.next_id);
        self.next_id += 1;

        let cancelled = Arc::new(AtomicBool::new(false));
        self.active_jobs.insert(id, Arc::clone(&cancelled));

        let sender = self.result_sender.clone();
        let task: Task = Box::new(move || {
            let output = job.on_run();
            // The client may already be gone; then nobody wants the output.
            let _ = sender.send((id, output));
        });

        if let Err(err) = self.queue.push(task) {
            self.active_jobs.remove(&id);
            return Err(err);
        }
        Ok(JobHandle { id, cancelled })
    }

    /// Collect every output produced since the last call, in completion order.
    pub fn drain(&mut self) -> Vec<Completion<T>> {
        let mut results = Vec::new();
        while let Ok((id, output)) = self.result_receiver.try_recv() {
            let cancelled = self
                .active_jobs
                .remove(&id)
                .is_none_or(|(_, flag)| flag.load(Ordering::Acquire));
            if cancelled {
                tracing::trace!(job = %id, "discarding cancelled job output");
                results.push(Completion::Cancelled(id, output));
            } else {
                results.push(Completion::Finished(id, output));
            }
        }
        results
    }

    /// Jobs ordered but not yet drained, cancelled ones included.
    pub fn in_flight(&self) -> usize {
        self.active_jobs.len()
    }

    /// Returns `true` if `id` has been ordered and not yet drained.
    pub fn is_pending(&self, id: JobId) -> bool {
        self.active_jobs.contains_key(&id)
    }

    /// Mark every in-flight job cancelled.
    pub fn cancel_all(&self) {
        for entry in self.active_jobs.iter() {
            entry.value().store(true, Ordering::Release);
        }
    }
}
