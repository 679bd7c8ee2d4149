use crate::common::Task;
use crate::error::{Error, ErrorKind, Result};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// FIFO of pending tasks shared by every worker of a pool.
///
/// Each task handed out by `get_task` or `wait_task` is removed under the
/// lock, so it reaches exactly one caller.
///
/// ```
/// use taskpool::common::Task;
/// use taskpool::queue::SharedQueue;
///
/// let queue = SharedQueue::new();
/// queue.add_task(Task::new(1)).unwrap();
/// assert_eq!(queue.get_task(), Some(Task::new(1)));
/// assert_eq!(queue.get_task(), None);
/// ```
pub struct SharedQueue {
    state: Mutex<QueueState>,
    // signalled on every push and on close
    available: Condvar,
}

struct QueueState {
    tasks: VecDeque<Task>,
    closed: bool,
}

impl SharedQueue {
    pub fn new() -> Self {
        SharedQueue {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// A queue holding tasks `1..=count`.
    pub fn with_tasks(count: u64) -> Self {
        let queue = SharedQueue::new();
        {
            let mut state = queue.lock();
            state.tasks.extend((1..=count).map(Task::new));
        }
        queue
    }

    /// Append a task to the tail. Only fails once the queue is closed.
    pub fn add_task(&self, task: Task) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(Error::from(ErrorKind::QueueClosed(task.id)));
        }
        state.tasks.push_back(task);
        self.available.notify_one();
        Ok(())
    }

    /// Remove and return the head, or `None` when nothing is queued right now.
    pub fn get_task(&self) -> Option<Task> {
        self.lock().tasks.pop_front()
    }

    /// Block until a task arrives, or return `None` once closed and empty.
    pub fn wait_task(&self) -> Option<Task> {
        self.wait_task_until(|| false)
    }

    /// Like `wait_task`, but also gives up when `stop` returns true. `stop` is
    /// checked on every wake-up, see `wake_all`.
    pub fn wait_task_until<F>(&self, stop: F) -> Option<Task>
    where
        F: Fn() -> bool,
    {
        let mut state = self.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.closed || stop() {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// No more tasks will be added. Wakes every blocked `wait_task`.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.available.notify_all();
    }

    /// Wake every blocked waiter without closing the queue.
    pub fn wake_all(&self) {
        let _state = self.lock();
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    // every critical section is a single push or pop, so a poisoned
    // state is still consistent
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SharedQueue {
    fn default() -> Self {
        SharedQueue::new()
    }
}
