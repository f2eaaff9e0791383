//! Computation orchestration core for an engineering analysis workbench.
//!
//! This crate provides the two pieces of machinery that every expensive
//! CAD/CFD analysis pipeline leans on:
//! - A memoizing cache for expensive, hashable, lazily-built objects
//!   (geometry, derived artifacts) with content-addressed identity and a
//!   bounded pin list of recently created instances
//! - A parametric sweep scheduler that expands range parameters into the
//!   full Cartesian product of analysis runs, executes them on a bounded
//!   worker pool, aggregates results as they complete, and supports
//!   cooperative cancellation
//!
//! # Example
//!
//! ```ignore
//! use flowstudy_core::{ParameterStudy, ParameterSet, ParameterValue};
//!
//! let mut config = ParameterSet::new();
//! config.insert("geometry/alpha", ParameterValue::DoubleRange(vec![0.0, 5.0, 10.0]))?;
//! config.insert("operation/Re", ParameterValue::DoubleRange(vec![1e6, 2e6]))?;
//!
//! let mut study = ParameterStudy::new(
//!     "polar",
//!     Box::new(AirfoilSection::default()),
//!     config,
//!     vec!["geometry/alpha".into(), "operation/Re".into()],
//! );
//! study.setup_queue()?;          // 6 instances, one per combination
//! study.process_queue(2, None)?; // run on 2 workers
//! let combined = study.evaluate_runs()?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod cache;
pub mod error;
pub mod study;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod params;
pub mod results;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use cache::{CacheKey, CachedEntity, EntityCache, EntityHandle, KeyHasher, Recipe};
pub use params::{ParameterSet, ParameterValue};
pub use results::{ResultElement, ResultSet, ScalarResult, TabularResult};
pub use study::{
    Analysis, AnalysisInstance, ParameterStudy, ProgressSink, StudyHandle, StudyProgress,
    StudyState,
};
