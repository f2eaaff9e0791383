//! Single hand-off point between the study and its worker threads.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::debug;

use super::instance::AnalysisInstance;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<AnalysisInstance>,
    processed: Vec<AnalysisInstance>,
    aborted: Vec<AnalysisInstance>,
    closed: bool,
    cancelled: bool,
}

/// Pending/processed/aborted counts at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: usize,
    pub processed: usize,
    pub aborted: usize,
}

/// Pending FIFO plus processed collection, guarded by one mutex.
///
/// Workers block on the condition variable only while pending is empty and
/// the queue is neither closed nor cancelled. The processed collection lives
/// behind the same mutex so outside observers can poll it safely mid-run.
#[derive(Debug, Default)]
pub struct SynchronisedQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl SynchronisedQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a pending instance. Producer side; call before `close`.
    pub fn push(&self, instance: AnalysisInstance) {
        let mut state = self.lock_state();
        state.pending.push_back(instance);
        self.available.notify_one();
    }

    /// Mark the producer side finished: once pending drains, dequeues
    /// return `None` instead of blocking.
    pub fn close(&self) {
        let mut state = self.lock_state();
        state.closed = true;
        self.available.notify_all();
    }

    /// Take the next pending instance, FIFO. Blocks while the queue is open
    /// and empty; returns `None` once it is drained-and-closed or cancelled.
    pub fn dequeue(&self) -> Option<AnalysisInstance> {
        let mut state = self.lock_state();
        loop {
            if state.cancelled {
                return None;
            }
            if let Some(instance) = state.pending.pop_front() {
                return Some(instance);
            }
            if state.closed {
                return None;
            }
            state = match self.available.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Move a finished instance into the processed collection.
    pub fn complete(&self, instance: AnalysisInstance) {
        let mut state = self.lock_state();
        state.processed.push(instance);
    }

    /// Cancel: drain all pending instances into the aborted list and wake
    /// every waiting worker. Idempotent; never waits on in-flight work.
    pub fn cancel(&self) {
        let mut state = self.lock_state();
        state.cancelled = true;
        if !state.pending.is_empty() {
            debug!(
                drained = state.pending.len(),
                "cancelling queue, draining pending instances"
            );
        }
        let drained: Vec<AnalysisInstance> = state.pending.drain(..).collect();
        state.aborted.extend(drained);
        self.available.notify_all();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.lock_state().cancelled
    }

    #[must_use]
    pub fn counts(&self) -> QueueCounts {
        let state = self.lock_state();
        QueueCounts {
            pending: state.pending.len(),
            processed: state.processed.len(),
            aborted: state.aborted.len(),
        }
    }

    /// Names of instances processed so far; safe to call mid-run.
    #[must_use]
    pub fn processed_names(&self) -> Vec<String> {
        self.lock_state()
            .processed
            .iter()
            .map(|i| i.name().to_string())
            .collect()
    }

    /// Read the processed collection under the queue lock.
    pub fn with_processed<T>(&self, f: impl FnOnce(&[AnalysisInstance]) -> T) -> T {
        let state = self.lock_state();
        f(&state.processed)
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::params::ParameterSet;
    use crate::results::ResultSet;
    use crate::study::analysis::{Analysis, StudyProgress};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    struct Noop;

    impl Analysis for Noop {
        fn clone_box(&self) -> Box<dyn Analysis> {
            Box::new(Noop)
        }

        fn run(
            &mut self,
            _config: &ParameterSet,
            _progress: &StudyProgress,
        ) -> Result<ResultSet, AnalysisError> {
            Ok(ResultSet::new())
        }
    }

    fn instance(name: &str) -> AnalysisInstance {
        AnalysisInstance::new(name.to_string(), ParameterSet::new(), Box::new(Noop))
    }

    #[test]
    fn test_dequeue_is_fifo() {
        let queue = SynchronisedQueue::new();
        queue.push(instance("a"));
        queue.push(instance("b"));
        queue.push(instance("c"));
        queue.close();

        assert_eq!(queue.dequeue().unwrap().name(), "a");
        assert_eq!(queue.dequeue().unwrap().name(), "b");
        assert_eq!(queue.dequeue().unwrap().name(), "c");
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_close_unblocks_empty_dequeue() {
        let queue = Arc::new(SynchronisedQueue::new());
        let worker = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue().is_none())
        };
        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert!(worker.join().unwrap());
    }

    #[test]
    fn test_cancel_drains_pending_and_unblocks() {
        let queue = Arc::new(SynchronisedQueue::new());
        queue.push(instance("a"));
        queue.push(instance("b"));

        queue.cancel();
        assert!(queue.dequeue().is_none());
        let counts = queue.counts();
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.aborted, 2);

        // Idempotent.
        queue.cancel();
        assert_eq!(queue.counts().aborted, 2);
    }

    #[test]
    fn test_processed_visible_mid_run() {
        let queue = SynchronisedQueue::new();
        queue.push(instance("a"));
        let inst = queue.dequeue().unwrap();
        queue.complete(inst);
        assert_eq!(queue.processed_names(), vec!["a".to_string()]);
        assert_eq!(queue.counts().processed, 1);
    }
}
