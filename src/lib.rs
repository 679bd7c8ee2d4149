//! A bounded worker pool: a fixed number of threads drain a shared task queue
//! and append one result record per task to a shared sink.

pub mod common;
pub mod error;
pub mod queue;
pub mod sink;
pub mod thread_pool;

pub use common::{Outcome, RandomDelay, ResultRecord, Task, Work};
pub use error::{Error, ErrorKind, Result};
pub use queue::SharedQueue;
pub use sink::ResultSink;
pub use thread_pool::{CancelToken, Pool, PollMode, Summary};
