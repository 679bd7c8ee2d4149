use crate::common::ResultRecord;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Append-only collection of result records, shared by all workers.
pub struct ResultSink {
    records: Mutex<Vec<ResultRecord>>,
}

impl ResultSink {
    pub fn new() -> Self {
        ResultSink {
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn append(&self, record: ResultRecord) {
        self.lock().push(record);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the records in append order.
    pub fn records(&self) -> Vec<ResultRecord> {
        self.lock().clone()
    }

    /// Take every record, leaving the sink empty.
    pub fn drain(&self) -> Vec<ResultRecord> {
        std::mem::take(&mut *self.lock())
    }

    pub fn into_records(self) -> Vec<ResultRecord> {
        self.records
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ResultRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ResultSink {
    fn default() -> Self {
        ResultSink::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_appends_are_kept() {
        let sink = Arc::new(ResultSink::new());
        let handles: Vec<_> = (1..=4)
            .map(|worker| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for task in 0..250 {
                        sink.append(ResultRecord::completed(worker, task));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sink.len(), 1000);
    }

    #[test]
    fn drain_empties() {
        let sink = ResultSink::new();
        sink.append(ResultRecord::completed(1, 1));
        sink.append(ResultRecord::completed(1, 2));
        assert_eq!(sink.records().len(), 2);
        let drained = sink.drain();
        assert_eq!(drained[1].task, 2);
        assert!(sink.is_empty());
        assert!(sink.into_records().is_empty());
    }
}
