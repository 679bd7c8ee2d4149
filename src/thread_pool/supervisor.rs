use crossbeam::channel::{unbounded, Receiver, Sender};
use crossbeam::sync::WaitGroup;
use slog::{debug, error, o, warn, Logger};

use super::{
    pool::{Worker, WorkerContext},
    Message,
};
use crate::common::ResultRecord;
use crate::error::{Error, ErrorKind, Result};

/// It supervises workers: records what a panicked worker was holding and
/// starts a replacement under the same id.
pub struct Supervisor {
    workers: Vec<Worker>,
    context: WorkerContext,
    receiver: Receiver<Message>,
    sender: Sender<Message>,
    logger: Logger,
    // workers started and not yet reported back
    live: usize,
    revived: usize,
    max_revives: usize,
    // first worker that could not be replaced
    lost: Option<Error>,
}

impl Supervisor {
    pub(crate) fn new(context: WorkerContext, max_revives: usize, logger: Logger) -> Self {
        let (sender, receiver) = unbounded::<Message>();
        Supervisor {
            workers: Vec::new(),
            context,
            receiver,
            sender,
            logger,
            live: 0,
            revived: 0,
            max_revives,
            lost: None,
        }
    }

    pub fn spawn(&mut self, id: usize, barrier: WaitGroup) -> Result<()> {
        let worker = Worker::spawn(
            id,
            self.context.clone(),
            self.sender.clone(),
            barrier,
            self.logger.new(o!("worker" => id)),
        )?;
        self.workers.push(worker);
        self.live += 1;
        Ok(())
    }

    // listen to channel until every worker has left
    pub fn watch(&mut self, barrier: &WaitGroup) {
        while self.live > 0 {
            let message = match self.receiver.recv() {
                Ok(message) => message,
                Err(_) => break,
            };
            match message {
                Message::Exited(worker) => {
                    self.live -= 1;
                    debug!(self.logger, "worker exited"; "worker" => worker, "live" => self.live);
                }
                Message::Dead { worker, task } => {
                    self.live -= 1;
                    warn!(self.logger, "worker panicked"; "worker" => worker);
                    if let Some(task) = task {
                        self.context.append(ResultRecord::failed(
                            worker,
                            task.id,
                            "worker panicked".to_string(),
                        ));
                    }
                    // spawn a new worker if previous one is dead
                    let revive = if self.revived < self.max_revives {
                        self.spawn(worker, barrier.clone())
                    } else {
                        Err(Error::from(ErrorKind::WorkerLost(worker)))
                    };
                    match revive {
                        Ok(()) => self.revived += 1,
                        Err(err) => {
                            error!(self.logger, "unable to revive worker"; "worker" => worker, "error" => %err);
                            if self.lost.is_none() {
                                self.lost = Some(err);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Join every thread ever started. Returns how many workers were revived
    /// and the first revive that failed.
    pub fn join(mut self) -> (usize, Option<Error>) {
        for worker in &mut self.workers {
            worker.join();
        }
        (self.revived, self.lost)
    }
}
