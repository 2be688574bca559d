use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use typed_builder::TypedBuilder;

/// Pool size used when the configured one is unusable.
pub const DEFAULT_WORKERS: usize = 10;
/// Queue length used when the configured one is unusable.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
/// Budget every task gets, independent of whoever submitted it.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(10);

type BoxTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct Job {
    name: &'static str,
    task: BoxTask,
}

/// Configuration for a [`TaskRunner`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct TaskRunnerConfig {
    /// Number of workers draining the queue. Zero falls back to
    /// [`DEFAULT_WORKERS`].
    #[builder(default = DEFAULT_WORKERS)]
    pub workers: usize,
    /// Maximum number of queued, not yet running tasks.
    #[builder(default = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    /// Timeout applied to every task individually.
    #[builder(default = DEFAULT_TASK_TIMEOUT)]
    pub task_timeout: Duration,
}

impl Default for TaskRunnerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Why a task was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The queue is full.
    Saturated,
    /// The runner has been shut down.
    Closed,
}

/// Outcome of [`TaskRunner::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    /// The task was dropped without running. Already logged.
    Rejected(RejectReason),
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted)
    }
}

struct Inner {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    task_timeout: Duration,
}

/// A fixed group of workers running fire-and-forget tasks.
///
/// Tasks go into a bounded queue. Submitting never waits: when the queue is
/// full or the runner is closed, the task is logged and dropped. Callers
/// must not rely on any task having run.
///
/// The handle is cheap to clone; all clones share the same pool.
#[derive(Clone)]
pub struct TaskRunner {
    inner: Arc<Inner>,
}

impl TaskRunner {
    /// Spawns the workers on the current tokio runtime.
    pub fn start(config: TaskRunnerConfig) -> Self {
        let worker_count = if config.workers == 0 {
            warn!(
                configured = config.workers,
                fallback = DEFAULT_WORKERS,
                "invalid worker pool size, using default"
            );
            DEFAULT_WORKERS
        } else {
            config.workers
        };

        let queue_capacity = if config.queue_capacity == 0 {
            warn!(
                configured = config.queue_capacity,
                fallback = DEFAULT_QUEUE_CAPACITY,
                "invalid task queue capacity, using default"
            );
            DEFAULT_QUEUE_CAPACITY
        } else {
            config.queue_capacity
        };

        let (sender, receiver) = mpsc::channel(queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers = (0..worker_count)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    Arc::clone(&receiver),
                    config.task_timeout,
                ))
            })
            .collect();

        info!(
            workers = worker_count,
            queue_capacity,
            task_timeout_ms = config.task_timeout.as_millis() as u64,
            "task runner started"
        );

        Self {
            inner: Arc::new(Inner {
                sender: Mutex::new(Some(sender)),
                workers: Mutex::new(workers),
                worker_count,
                task_timeout: config.task_timeout,
            }),
        }
    }

    /// Number of workers in the pool.
    pub fn worker_count(&self) -> usize {
        self.inner.worker_count
    }

    /// Per-task timeout.
    pub fn task_timeout(&self) -> Duration {
        self.inner.task_timeout
    }

    /// Queues a task without waiting.
    ///
    /// `name` identifies the task in logs. A rejected task is logged here
    /// and never runs.
    pub fn submit<F>(&self, name: &'static str, task: F) -> Submission
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self.inner.sender.lock();
        let Some(sender) = sender.as_ref() else {
            warn!(task = name, "task runner is closed, dropping task");
            return Submission::Rejected(RejectReason::Closed);
        };

        let job = Job {
            name,
            task: Box::pin(task),
        };

        match sender.try_send(job) {
            Ok(()) => {
                trace!(task = name, "task queued");
                Submission::Accepted
            }
            Err(TrySendError::Full(job)) => {
                warn!(task = job.name, "task queue is saturated, dropping task");
                Submission::Rejected(RejectReason::Saturated)
            }
            Err(TrySendError::Closed(job)) => {
                warn!(task = job.name, "task queue is closed, dropping task");
                Submission::Rejected(RejectReason::Closed)
            }
        }
    }

    /// Stops accepting tasks, lets the workers finish everything already
    /// queued, and waits for them.
    ///
    /// Calling it more than once is harmless.
    pub async fn shutdown(&self) {
        drop(self.inner.sender.lock().take());

        let workers = std::mem::take(&mut *self.inner.workers.lock());
        if workers.is_empty() {
            return;
        }

        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "task worker ended abnormally");
            }
        }
        info!("task runner stopped");
    }
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("worker_count", &self.inner.worker_count)
            .field("task_timeout", &self.inner.task_timeout)
            .field("closed", &self.inner.sender.lock().is_none())
            .finish()
    }
}

async fn worker_loop(
    worker: usize,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    task_timeout: Duration,
) {
    loop {
        let job = {
            let mut queue = queue.lock().await;
            queue.recv().await
        };

        let Some(job) = job else {
            break;
        };

        run_job(worker, job, task_timeout).await;
    }

    debug!(worker, "task worker stopped");
}

/// Runs one job on its own tokio task so a panic or a timeout only ends
/// that job, never the worker.
async fn run_job(worker: usize, job: Job, task_timeout: Duration) {
    let Job { name, task } = job;
    let mut handle = tokio::spawn(task);

    match tokio::time::timeout(task_timeout, &mut handle).await {
        Ok(Ok(())) => {
            trace!(worker, task = name, "task completed");
        }
        Ok(Err(e)) if e.is_panic() => {
            error!(worker, task = name, "task panicked");
        }
        Ok(Err(e)) => {
            warn!(worker, task = name, error = %e, "task was cancelled");
        }
        Err(_) => {
            handle.abort();
            warn!(
                worker,
                task = name,
                timeout_ms = task_timeout.as_millis() as u64,
                "task timed out"
            );
        }
    }
}
