use super::{supervisor::Supervisor, CancelToken, Message, PollMode};
use crate::common::{RandomDelay, ResultRecord, Task, Work};
use crate::error::{Error, Result};
use crate::queue::SharedQueue;
use crate::sink::ResultSink;
use crossbeam::channel::Sender;
use crossbeam::sync::WaitGroup;
use serde::Serialize;
use slog::{debug, error, info, o, warn, Logger};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Called by a worker right after it claims a task, before the work runs.
pub type DispatchHook = Arc<dyn Fn(usize, &Task) + Send + Sync>;

/// A fixed number of workers draining one `SharedQueue` into one `ResultSink`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use taskpool::common::Task;
/// use taskpool::queue::SharedQueue;
/// use taskpool::sink::ResultSink;
/// use taskpool::thread_pool::Pool;
///
/// let pool = Pool::builder()
///     .workers(2)
///     .work(|_: &Task| -> taskpool::Result<()> { Ok(()) })
///     .build()
///     .unwrap();
/// let queue = Arc::new(SharedQueue::with_tasks(3));
/// let sink = Arc::new(ResultSink::new());
/// let summary = pool.run(&queue, &sink).unwrap();
/// assert_eq!(summary.completed, 3);
/// assert_eq!(sink.len(), 3);
/// ```
pub struct Pool {
    size: usize,
    mode: PollMode,
    work: Arc<dyn Work>,
    on_dispatch: Option<DispatchHook>,
    max_revives: usize,
    cancel: CancelToken,
    logger: Logger,
}

pub struct PoolBuilder {
    size: usize,
    mode: PollMode,
    work: Arc<dyn Work>,
    on_dispatch: Option<DispatchHook>,
    max_revives: usize,
    logger: Logger,
}

impl PoolBuilder {
    pub fn workers(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn mode(mut self, mode: PollMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn work<W: Work + 'static>(mut self, work: W) -> Self {
        self.work = Arc::new(work);
        self
    }

    pub fn on_dispatch<F>(mut self, hook: F) -> Self
    where
        F: Fn(usize, &Task) + Send + Sync + 'static,
    {
        self.on_dispatch = Some(Arc::new(hook));
        self
    }

    /// How many panicked workers one run may replace. Unlimited by default.
    pub fn max_revives(mut self, max_revives: usize) -> Self {
        self.max_revives = max_revives;
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn build(self) -> Result<Pool> {
        if self.size == 0 {
            return Err(Error::invalid_config(
                "worker count must be at least 1".to_string(),
            ));
        }
        Ok(Pool {
            size: self.size,
            mode: self.mode,
            work: self.work,
            on_dispatch: self.on_dispatch,
            max_revives: self.max_revives,
            cancel: CancelToken::new(),
            logger: self.logger,
        })
    }
}

/// Counts for one `Pool::run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub workers: usize,
    pub completed: usize,
    pub failed: usize,
    // workers replaced after a panic
    pub revived: usize,
}

impl Pool {
    pub const DEFAULT_WORKERS: usize = 5;

    pub fn builder() -> PoolBuilder {
        PoolBuilder {
            size: Pool::DEFAULT_WORKERS,
            mode: PollMode::default(),
            work: Arc::new(RandomDelay::default()),
            on_dispatch: None,
            max_revives: usize::MAX,
            logger: Logger::root(slog::Discard, o!()),
        }
    }

    /// A pool of `size` workers doing the default random-delay work.
    pub fn new(size: usize) -> Result<Self> {
        Pool::builder().workers(size).build()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Token shared with every run of this pool. Once cancelled it stays cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run all workers against `queue` and `sink`, returning once every
    /// worker, replacements included, has finished.
    ///
    /// Fails if a worker could not be started, or if a panicked worker could
    /// not be replaced and tasks were left in the queue without a record.
    pub fn run(&self, queue: &Arc<SharedQueue>, sink: &Arc<ResultSink>) -> Result<Summary> {
        let tally = Arc::new(Tally::default());
        // stops this run only, the pool stays usable
        let abort = CancelToken::new();
        let context = WorkerContext {
            queue: Arc::clone(queue),
            sink: Arc::clone(sink),
            work: Arc::clone(&self.work),
            on_dispatch: self.on_dispatch.clone(),
            mode: self.mode,
            cancel: self.cancel.clone(),
            abort: abort.clone(),
            tally: Arc::clone(&tally),
        };
        info!(self.logger, "starting pool";
            "workers" => self.size,
            "queued" => queue.len(),
            "mode" => format!("{:?}", self.mode)
        );

        let barrier = WaitGroup::new();
        let mut supervisor = Supervisor::new(context, self.max_revives, self.logger.clone());

        for id in 1..=self.size {
            if let Err(err) = supervisor.spawn(id, barrier.clone()) {
                error!(self.logger, "unable to start worker"; "worker" => id, "error" => %err);
                // stop the workers already running before reporting
                abort.cancel();
                queue.wake_all();
                supervisor.watch(&barrier);
                barrier.wait();
                supervisor.join();
                return Err(err);
            }
        }

        supervisor.watch(&barrier);
        // every worker handle has been released past this point
        barrier.wait();
        let (revived, lost) = supervisor.join();

        if let Some(err) = lost {
            let stranded = queue.len();
            if stranded > 0 {
                error!(self.logger, "tasks left without a worker"; "stranded" => stranded, "error" => %err);
                return Err(err);
            }
            warn!(self.logger, "worker lost after the queue drained"; "error" => %err);
        }

        let summary = Summary {
            workers: self.size,
            completed: tally.completed.load(Ordering::SeqCst),
            failed: tally.failed.load(Ordering::SeqCst),
            revived,
        };
        info!(self.logger, "pool finished";
            "completed" => summary.completed,
            "failed" => summary.failed,
            "revived" => summary.revived
        );
        Ok(summary)
    }
}

#[derive(Default)]
pub(crate) struct Tally {
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl Tally {
    pub(crate) fn record(&self, record: &ResultRecord) {
        if record.is_completed() {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Everything a worker shares with the rest of the pool.
#[derive(Clone)]
pub(crate) struct WorkerContext {
    queue: Arc<SharedQueue>,
    sink: Arc<ResultSink>,
    work: Arc<dyn Work>,
    on_dispatch: Option<DispatchHook>,
    mode: PollMode,
    cancel: CancelToken,
    abort: CancelToken,
    tally: Arc<Tally>,
}

impl WorkerContext {
    pub(crate) fn append(&self, record: ResultRecord) {
        self.tally.record(&record);
        self.sink.append(record);
    }

    fn stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.abort.is_cancelled()
    }

    fn next_task(&self) -> Option<Task> {
        match self.mode {
            PollMode::Drain => self.queue.get_task(),
            PollMode::Wait => self.queue.wait_task_until(|| self.stopped()),
        }
    }
}

// Held by a worker thread for its whole life. Dropping it tells the
// supervisor how the worker ended and releases the barrier handle.
struct WorkerGuard {
    id: usize,
    // task being processed, reported if the worker panics
    current: Option<Task>,
    notifier: Sender<Message>,
    _barrier: WaitGroup,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        let message = if thread::panicking() {
            Message::Dead {
                worker: self.id,
                task: self.current.take(),
            }
        } else {
            Message::Exited(self.id)
        };
        // the supervisor keeps a sender alive, so this only fails if it is gone
        let _ = self.notifier.send(message);
    }
}

pub(crate) struct Worker {
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(
        id: usize,
        context: WorkerContext,
        notifier: Sender<Message>,
        barrier: WaitGroup,
        logger: Logger,
    ) -> Result<Worker> {
        let thread = thread::Builder::new()
            .name(format!("taskpool-worker-{}", id))
            .spawn(move || {
                let guard = WorkerGuard {
                    id,
                    current: None,
                    notifier,
                    _barrier: barrier,
                };
                do_work(guard, context, logger);
            })?;

        Ok(Worker {
            thread: Some(thread),
        })
    }

    pub(crate) fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            // a panic has already been reported through the guard
            let _ = thread.join();
        }
    }
}

// poll, process and record until the queue runs dry
fn do_work(mut guard: WorkerGuard, context: WorkerContext, logger: Logger) {
    debug!(logger, "worker started");
    loop {
        if context.stopped() {
            info!(logger, "worker cancelled");
            break;
        }
        let task = match context.next_task() {
            Some(task) => task,
            None => break,
        };
        guard.current = Some(task);
        if let Some(hook) = &context.on_dispatch {
            hook(guard.id, &task);
        }
        debug!(logger, "processing"; "task" => task.id);

        let record = match context.work.process(&task) {
            Ok(()) => ResultRecord::completed(guard.id, task.id),
            Err(err) => {
                warn!(logger, "task failed"; "task" => task.id, "error" => %err);
                ResultRecord::failed(guard.id, task.id, err.to_string())
            }
        };
        context.append(record);
        guard.current = None;
    }
    debug!(logger, "worker done");
}
