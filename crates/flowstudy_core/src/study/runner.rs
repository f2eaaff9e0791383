//! The parameter study driver: queue setup, worker pool, aggregation.

use std::cmp::Ordering;
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use crate::error::{ParameterError, StudyError};
use crate::params::{ParameterSet, ParameterValue};
use crate::results::{ResultElement, ResultSet, TabularResult};

use super::analysis::{Analysis, ProgressSink, StudyProgress};
use super::instance::AnalysisInstance;
use super::queue::{QueueCounts, SynchronisedQueue};

/// Lifecycle of a parameter study.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyState {
    Idle,
    QueueBuilt,
    Running,
    Completed,
    Cancelled,
}

impl StudyState {
    fn name(self) -> &'static str {
        match self {
            StudyState::Idle => "Idle",
            StudyState::QueueBuilt => "QueueBuilt",
            StudyState::Running => "Running",
            StudyState::Completed => "Completed",
            StudyState::Cancelled => "Cancelled",
        }
    }
}

/// Shared handle for cancelling and observing a study from other threads.
#[derive(Debug, Clone)]
pub struct StudyHandle {
    queue: Arc<SynchronisedQueue>,
    progress: StudyProgress,
}

impl StudyHandle {
    /// Request cooperative cancellation: drain the pending queue and raise
    /// the flag running analyses may poll. Returns immediately.
    pub fn cancel(&self) {
        info!("study cancellation requested");
        self.progress.cancel();
        self.queue.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.progress.is_cancelled()
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.progress.completed()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.progress.total()
    }

    #[must_use]
    pub fn counts(&self) -> QueueCounts {
        self.queue.counts()
    }

    /// Names of instances finished so far; safe to call mid-run.
    #[must_use]
    pub fn processed_names(&self) -> Vec<String> {
        self.queue.processed_names()
    }
}

/// Expands range parameters into a queue of analysis instances and runs
/// them with bounded parallelism.
pub struct ParameterStudy {
    name: String,
    template: Box<dyn Analysis>,
    template_config: ParameterSet,
    range_paths: Vec<String>,
    queue: Arc<SynchronisedQueue>,
    progress: StudyProgress,
    state: StudyState,
}

impl ParameterStudy {
    /// `range_paths` name the entries of `template_config` to sweep; each
    /// must hold a non-empty `DoubleRange`. Order determines instance
    /// naming and enumeration order.
    pub fn new(
        name: impl Into<String>,
        analysis: Box<dyn Analysis>,
        template_config: ParameterSet,
        range_paths: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            template: analysis,
            template_config,
            range_paths,
            queue: Arc::new(SynchronisedQueue::new()),
            progress: StudyProgress::new(0),
            state: StudyState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> StudyState {
        self.state
    }

    /// Handle for cancelling or polling this study from another thread.
    #[must_use]
    pub fn handle(&self) -> StudyHandle {
        StudyHandle {
            queue: Arc::clone(&self.queue),
            progress: self.progress.clone(),
        }
    }

    /// Expand the Cartesian product of all range parameters into pending
    /// instances. Returns the number of instances built.
    ///
    /// Enumeration is iterative with an explicit index vector (odometer,
    /// last parameter varies fastest), so deep sweeps cannot overflow the
    /// stack and the order is directly testable.
    pub fn setup_queue(&mut self) -> Result<usize, StudyError> {
        self.expect_state(StudyState::Idle)?;

        let mut candidate_sets: Vec<Vec<f64>> = Vec::with_capacity(self.range_paths.len());
        for path in &self.range_paths {
            let range = self.template_config.get_range(path)?;
            if range.is_empty() {
                return Err(ParameterError::EmptyRange(path.clone()).into());
            }
            candidate_sets.push(range.to_vec());
        }

        let total: usize = candidate_sets.iter().map(Vec::len).product();
        let mut indices = vec![0usize; candidate_sets.len()];

        loop {
            let mut config = self.template_config.clone();
            let mut name = self.name.clone();
            for ((path, candidates), &idx) in self
                .range_paths
                .iter()
                .zip(candidate_sets.iter())
                .zip(indices.iter())
            {
                let value = candidates[idx];
                config.insert(path, ParameterValue::Double(value))?;
                let label = path.rsplit('/').next().unwrap_or(path);
                name.push_str(&format!("__{label}={value}"));
            }
            self.queue
                .push(AnalysisInstance::new(name, config, self.template.clone_box()));

            // Increment indices, last dimension fastest (like counting with
            // mixed radix digits)
            let mut carry = true;
            for (idx, candidates) in indices.iter_mut().zip(candidate_sets.iter()).rev() {
                if carry {
                    *idx += 1;
                    if *idx >= candidates.len() {
                        *idx = 0;
                        // carry remains true
                    } else {
                        carry = false;
                    }
                }
            }

            // Wrapped all the way around: every combination emitted
            if carry {
                break;
            }
        }

        self.state = StudyState::QueueBuilt;
        debug!(study = %self.name, instances = total, "parameter sweep queue built");
        Ok(total)
    }

    /// Run all pending instances on `min(max_workers, pending)` worker
    /// threads, blocking until every worker has joined.
    ///
    /// Per-instance failures are recorded on the instance and do not affect
    /// siblings. Ends in `Completed`, or `Cancelled` if the cancel flag was
    /// raised while running.
    pub fn process_queue(
        &mut self,
        max_workers: usize,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> Result<(), StudyError> {
        self.expect_state(StudyState::QueueBuilt)?;

        let pending = self.queue.counts().pending;
        self.progress.reset(pending);
        let progress = match sink {
            Some(sink) => self.progress.with_sink(sink),
            None => self.progress.clone(),
        };

        self.state = StudyState::Running;
        self.queue.close();
        let workers = if pending == 0 {
            0
        } else {
            max_workers.clamp(1, pending)
        };
        info!(study = %self.name, workers, instances = pending, "processing analysis queue");

        thread::scope(|scope| {
            for worker_id in 0..workers {
                let queue = Arc::clone(&self.queue);
                let progress = progress.clone();
                scope.spawn(move || {
                    debug!(worker = worker_id, "worker started");
                    while let Some(mut instance) = queue.dequeue() {
                        debug!(worker = worker_id, instance = instance.name(), "running analysis");
                        instance.run(&progress);
                        match instance.result() {
                            Some(Err(e)) => {
                                warn!(instance = instance.name(), error = %e, "analysis failed");
                            }
                            _ => {
                                debug!(instance = instance.name(), "analysis finished");
                            }
                        }
                        progress.increment();
                        progress.update(instance.name(), 1.0);
                        queue.complete(instance);
                    }
                    debug!(worker = worker_id, "worker finished");
                });
            }
        });

        self.state = if self.progress.is_cancelled() || self.queue.is_cancelled() {
            info!(
                study = %self.name,
                processed = self.queue.counts().processed,
                "study cancelled"
            );
            StudyState::Cancelled
        } else {
            StudyState::Completed
        };
        Ok(())
    }

    /// Request cooperative cancellation (see [`StudyHandle::cancel`]).
    pub fn cancel(&self) {
        self.handle().cancel();
    }

    /// Aggregate every processed instance's results into one combined set,
    /// keyed by instance name. Failed instances appear as failure markers.
    ///
    /// Entries are keyed and sorted by name, so the aggregate is independent
    /// of the order in which workers finished.
    pub fn evaluate_runs(&self) -> Result<ResultSet, StudyError> {
        self.expect_finished()?;

        let combined = self.queue.with_processed(|instances| {
            let mut sorted: Vec<&AnalysisInstance> = instances.iter().collect();
            sorted.sort_by(|a, b| a.name().cmp(b.name()));

            let mut combined = ResultSet::new();
            for instance in sorted {
                let element = match instance.result() {
                    Some(Ok(results)) => ResultElement::Section(results.clone()),
                    Some(Err(e)) => ResultElement::Failure(e.to_string()),
                    None => ResultElement::Failure("instance was never run".to_string()),
                };
                combined.insert(instance.name(), element);
            }
            combined
        });
        Ok(combined)
    }

    /// Project processed instances into sweep-summary rows: the swept scalar
    /// at `param_path` in the first column, then the named scalar results.
    /// Missing results (including failed instances) appear as NaN. Rows are
    /// sorted by the parameter value.
    pub fn table(
        &self,
        description: &str,
        param_path: &str,
        result_names: &[&str],
    ) -> Result<TabularResult, StudyError> {
        self.expect_finished()?;

        let label = param_path.rsplit('/').next().unwrap_or(param_path);
        let mut columns = vec![label.to_string()];
        columns.extend(result_names.iter().map(|s| (*s).to_string()));

        let mut rows = self.queue.with_processed(|instances| {
            let mut rows = Vec::with_capacity(instances.len());
            for instance in instances {
                let x = instance.config().get_double(param_path)?;
                let mut row = Vec::with_capacity(result_names.len() + 1);
                row.push(x);
                for name in result_names {
                    let value = match instance.result() {
                        Some(Ok(results)) => results.scalar(name).unwrap_or(f64::NAN),
                        _ => f64::NAN,
                    };
                    row.push(value);
                }
                rows.push(row);
            }
            Ok::<_, StudyError>(rows)
        })?;

        rows.sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap_or(Ordering::Equal));

        Ok(TabularResult {
            description: description.to_string(),
            columns,
            rows,
        })
    }

    fn expect_state(&self, state: StudyState) -> Result<(), StudyError> {
        if self.state == state {
            Ok(())
        } else {
            Err(StudyError::InvalidState {
                expected: state.name(),
                actual: self.state.name(),
            })
        }
    }

    fn expect_finished(&self) -> Result<(), StudyError> {
        match self.state {
            StudyState::Completed | StudyState::Cancelled => Ok(()),
            other => Err(StudyError::InvalidState {
                expected: "Completed or Cancelled",
                actual: other.name(),
            }),
        }
    }
}
