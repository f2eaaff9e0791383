//! One fully-resolved unit of work in a parametric sweep.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::AnalysisError;
use crate::params::ParameterSet;
use crate::results::ResultSet;

use super::analysis::{Analysis, StudyProgress};

/// One parameter combination of a sweep: a deterministic name, the fully
/// resolved configuration, an owned analysis, and the result filled in by
/// the worker that consumed it.
pub struct AnalysisInstance {
    name: String,
    config: ParameterSet,
    analysis: Box<dyn Analysis>,
    result: Option<Result<ResultSet, AnalysisError>>,
}

impl AnalysisInstance {
    pub(super) fn new(name: String, config: ParameterSet, analysis: Box<dyn Analysis>) -> Self {
        Self {
            name,
            config,
            analysis,
            result: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &ParameterSet {
        &self.config
    }

    /// The run's outcome; `None` until a worker has consumed the instance.
    #[must_use]
    pub fn result(&self) -> Option<&Result<ResultSet, AnalysisError>> {
        self.result.as_ref()
    }

    /// Run the analysis, recording its outcome. A panic inside the analysis
    /// is caught at this boundary and recorded as a failure, so sibling
    /// instances are unaffected.
    pub(super) fn run(&mut self, progress: &StudyProgress) {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.analysis.run(&self.config, progress)
        }));
        self.result = Some(match outcome {
            Ok(result) => result,
            Err(payload) => Err(AnalysisError::Panicked(panic_message(&payload))),
        });
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

impl fmt::Debug for AnalysisInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisInstance")
            .field("name", &self.name)
            .field(
                "result",
                &self.result.as_ref().map(|r| r.is_ok()),
            )
            .finish()
    }
}
