use crate::common::Task;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod pool;
mod supervisor;
pub use pool::{DispatchHook, Pool, PoolBuilder, Summary};

/// How a worker claims its next task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Exit as soon as the queue is empty. Tasks must all be queued before `run`.
    Drain,
    /// Block until a task arrives; exit once the queue is closed and empty.
    Wait,
}

impl Default for PollMode {
    fn default() -> Self {
        PollMode::Drain
    }
}

/// Lifecycle notices sent from workers to the supervisor.
#[derive(Debug)]
pub(crate) enum Message {
    // left the polling loop normally
    Exited(usize),
    // panicked, possibly holding a task
    Dead { worker: usize, task: Option<Task> },
}

/// Asks workers to stop before claiming their next task.
///
/// Workers blocked in `PollMode::Wait` only notice after the queue is closed
/// or woken.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
