use crate::error::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread;
use std::time::Duration;

/// A unit of work, identified by its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Task {
    pub id: u64,
}

impl Task {
    pub fn new(id: u64) -> Self {
        Task { id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Failed(String),
}

/// What one worker produced for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub worker: usize,
    pub task: u64,
    pub outcome: Outcome,
}

impl ResultRecord {
    pub fn completed(worker: usize, task: u64) -> Self {
        ResultRecord {
            worker,
            task,
            outcome: Outcome::Completed,
        }
    }

    pub fn failed(worker: usize, task: u64, reason: String) -> Self {
        ResultRecord {
            worker,
            task,
            outcome: Outcome::Failed(reason),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == Outcome::Completed
    }
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Completed => write!(f, "Worker {} completed task {}", self.worker, self.task),
            Outcome::Failed(reason) => write!(
                f,
                "Worker {} failed task {}: {}",
                self.worker, self.task, reason
            ),
        }
    }
}

/// The work a worker performs for every task it claims.
///
/// Implemented for closures, so tests can pass `|_: &Task| Ok(())`.
pub trait Work: Send + Sync {
    fn process(&self, task: &Task) -> Result<()>;
}

impl<F> Work for F
where
    F: Fn(&Task) -> Result<()> + Send + Sync,
{
    fn process(&self, task: &Task) -> Result<()> {
        self(task)
    }
}

/// Sleeps for a uniformly random duration in `[0, max)`.
#[derive(Debug, Clone, Copy)]
pub struct RandomDelay {
    max: Duration,
}

impl RandomDelay {
    pub fn new(max: Duration) -> Self {
        RandomDelay { max }
    }

    pub fn from_millis(max_ms: u64) -> Self {
        RandomDelay::new(Duration::from_millis(max_ms))
    }

    fn pick(&self) -> Duration {
        let max_ms = self.max.as_millis() as u64;
        // an empty range would panic in gen_range
        if max_ms == 0 {
            return Duration::from_millis(0);
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}

impl Default for RandomDelay {
    fn default() -> Self {
        RandomDelay::from_millis(1000)
    }
}

impl Work for RandomDelay {
    fn process(&self, _task: &Task) -> Result<()> {
        let delay = self.pick();
        if delay > Duration::from_millis(0) {
            thread::sleep(delay);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn record_renders_like_the_output_lines() {
        assert_eq!(
            ResultRecord::completed(2, 7).to_string(),
            "Worker 2 completed task 7"
        );
        assert_eq!(
            ResultRecord::failed(1, 3, "boom".to_string()).to_string(),
            "Worker 1 failed task 3: boom"
        );
    }

    #[test]
    fn random_delay_stays_below_max() {
        let delay = RandomDelay::from_millis(5);
        for _ in 0..100 {
            assert!(delay.pick() < Duration::from_millis(5));
        }
        assert_eq!(RandomDelay::from_millis(0).pick(), Duration::from_millis(0));
    }

    #[test]
    fn closures_are_work() {
        let work = |task: &Task| {
            if task.id % 2 == 0 {
                Ok(())
            } else {
                Err(Error::task_failed(format!("odd task {}", task.id)))
            }
        };
        assert!(work.process(&Task::new(2)).is_ok());
        assert!(work.process(&Task::new(3)).is_err());
    }

    #[test]
    fn record_serializes_outcome() {
        let json = serde_json::to_string(&ResultRecord::completed(1, 2)).unwrap();
        assert_eq!(json, r#"{"worker":1,"task":2,"outcome":"completed"}"#);
    }
}
