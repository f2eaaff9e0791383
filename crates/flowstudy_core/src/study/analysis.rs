//! The runnable-analysis interface and shared progress tracking.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use jiff::Timestamp;

use crate::error::AnalysisError;
use crate::params::ParameterSet;
use crate::results::ResultSet;

/// A unit of engineering work the scheduler can run.
///
/// Implementations are opaque to the scheduler: it clones one analysis per
/// parameter combination and hands each clone its fully resolved
/// configuration. Long-running implementations should poll
/// [`StudyProgress::is_cancelled`] at convenient interruption points and
/// return [`AnalysisError::Cancelled`].
pub trait Analysis: Send {
    /// Clone this analysis for one more sweep instance.
    fn clone_box(&self) -> Box<dyn Analysis>;

    /// Run synchronously, producing a result set or a computation error.
    fn run(
        &mut self,
        config: &ParameterSet,
        progress: &StudyProgress,
    ) -> Result<ResultSet, AnalysisError>;
}

impl Clone for Box<dyn Analysis> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Consumer of progress updates emitted while a queue is processed.
pub trait ProgressSink: Send + Sync {
    fn update(&self, timestamp: Timestamp, path: &str, value: f64);
}

/// Sink that discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn update(&self, _timestamp: Timestamp, _path: &str, _value: f64) {}
}

/// Progress tracking shared between a study, its workers and outside
/// observers.
///
/// Clones share the same counters and cancellation flag.
#[derive(Clone, Default)]
pub struct StudyProgress {
    /// Completed instances counter
    completed: Arc<AtomicUsize>,
    /// Total instances
    total: Arc<AtomicUsize>,
    /// Cancellation flag
    cancelled: Arc<AtomicBool>,
    /// Optional downstream sink for (timestamp, path, value) triples
    sink: Option<Arc<dyn ProgressSink>>,
}

impl StudyProgress {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicUsize::new(total)),
            cancelled: Arc::new(AtomicBool::new(false)),
            sink: None,
        }
    }

    /// Clone sharing the same atomics but forwarding updates to `sink`.
    #[must_use]
    pub fn with_sink(&self, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            completed: Arc::clone(&self.completed),
            total: Arc::clone(&self.total),
            cancelled: Arc::clone(&self.cancelled),
            sink: Some(sink),
        }
    }

    /// Get the number of completed instances
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get the total number of instances
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// Increment the completed counter
    pub fn increment(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset the counters for a new run
    pub fn reset(&self, total: usize) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    /// Request cooperative cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Check if cancellation was requested; analyses poll this at their
    /// interruption points
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Emit a progress triple, stamped with the current time.
    pub fn update(&self, path: &str, value: f64) {
        if let Some(sink) = &self.sink {
            sink.update(Timestamp::now(), path, value);
        }
    }
}

impl fmt::Debug for StudyProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudyProgress")
            .field("completed", &self.completed())
            .field("total", &self.total())
            .field("cancelled", &self.is_cancelled())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
