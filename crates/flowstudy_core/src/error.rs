use std::fmt;

/// Errors related to configuration parameter lookups
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterError {
    /// No entry exists at the requested path
    NotFound(String),
    /// An entry exists but holds a different concrete type
    WrongType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
    /// A range parameter has no candidate values to sweep
    EmptyRange(String),
    /// A path segment names a leaf entry where a subset was required
    NotASubset(String),
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterError::NotFound(path) => write!(f, "parameter '{path}' not found"),
            ParameterError::WrongType {
                path,
                expected,
                found,
            } => {
                write!(f, "parameter '{path}' is a {found}, expected {expected}")
            }
            ParameterError::EmptyRange(path) => {
                write!(f, "range parameter '{path}' has no candidate values")
            }
            ParameterError::NotASubset(path) => {
                write!(f, "'{path}' is a leaf entry, not a parameter subset")
            }
        }
    }
}

impl std::error::Error for ParameterError {}

/// A cached entity's build step failed
#[derive(Debug, Clone, PartialEq)]
pub struct BuildError {
    pub class: &'static str,
    pub message: String,
}

impl BuildError {
    pub fn new(class: &'static str, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to build {}: {}", self.class, self.message)
    }
}

impl std::error::Error for BuildError {}

/// Errors produced by a single analysis run
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The computation itself failed
    Computation(String),
    /// The run's configuration was unusable
    Parameter(ParameterError),
    /// A cached entity the run depended on failed to build
    Build(BuildError),
    /// The run noticed a cancellation request at an interruption point
    Cancelled,
    /// The run panicked; the panic was caught at the worker boundary
    Panicked(String),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Computation(msg) => write!(f, "computation failed: {msg}"),
            AnalysisError::Parameter(e) => write!(f, "{e}"),
            AnalysisError::Build(e) => write!(f, "{e}"),
            AnalysisError::Cancelled => write!(f, "analysis cancelled"),
            AnalysisError::Panicked(msg) => write!(f, "analysis panicked: {msg}"),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::Parameter(e) => Some(e),
            AnalysisError::Build(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParameterError> for AnalysisError {
    fn from(e: ParameterError) -> Self {
        AnalysisError::Parameter(e)
    }
}

impl From<BuildError> for AnalysisError {
    fn from(e: BuildError) -> Self {
        AnalysisError::Build(e)
    }
}

/// Errors raised by the parameter study state machine
#[derive(Debug, Clone, PartialEq)]
pub enum StudyError {
    /// A range parameter was missing, wrong-typed or empty
    Parameter(ParameterError),
    /// An operation was called out of state machine order
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

impl fmt::Display for StudyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudyError::Parameter(e) => write!(f, "{e}"),
            StudyError::InvalidState { expected, actual } => {
                write!(f, "study is in state {actual}, operation requires {expected}")
            }
        }
    }
}

impl std::error::Error for StudyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StudyError::Parameter(e) => Some(e),
            StudyError::InvalidState { .. } => None,
        }
    }
}

impl From<ParameterError> for StudyError {
    fn from(e: ParameterError) -> Self {
        StudyError::Parameter(e)
    }
}
