//! Parametric sweep scheduler.
//!
//! A [`ParameterStudy`] takes a template configuration in which some entries
//! are range parameters (finite candidate sets), expands the Cartesian
//! product of those ranges into one [`AnalysisInstance`] per combination,
//! runs the instances on a bounded pool of worker threads reading a single
//! synchronized queue, and aggregates the per-instance result sets.
//!
//! The state machine is `Idle -> QueueBuilt -> Running -> {Completed |
//! Cancelled}`. Cancellation is cooperative: it drains the pending queue and
//! raises a flag running analyses may poll, but never preempts in-flight
//! work.
//!
//! # Example
//!
//! ```ignore
//! let mut study = ParameterStudy::new("polar", analysis, config, range_paths);
//! let n = study.setup_queue()?;            // product of all range sizes
//! let handle = study.handle();             // cancel/poll from other threads
//! study.process_queue(4, None)?;           // blocks until workers join
//! let combined = study.evaluate_runs()?;   // one entry per processed run
//! let polar = study.table("polar", "geometry/alpha", &["cl", "cd"])?;
//! ```

mod analysis;
mod instance;
mod queue;
mod runner;

pub use analysis::{Analysis, NullSink, ProgressSink, StudyProgress};
pub use instance::AnalysisInstance;
pub use queue::{QueueCounts, SynchronisedQueue};
pub use runner::{ParameterStudy, StudyHandle, StudyState};
