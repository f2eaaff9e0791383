//! Tests for the parametric sweep scheduler
//!
//! These tests verify:
//! - Cartesian expansion with deterministic instance naming
//! - Bounded worker pool execution and order-independent aggregation
//! - Partial failure isolation and panic containment
//! - Cooperative cancellation at the dequeue boundary and in-run
//! - Sweep-summary table projection

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use jiff::Timestamp;

use crate::error::{AnalysisError, ParameterError, StudyError};
use crate::params::{ParameterSet, ParameterValue};
use crate::results::{ResultElement, ResultSet};
use crate::study::{Analysis, ParameterStudy, ProgressSink, StudyProgress, StudyState};

/// Toy airfoil analysis: reads alpha and Re, produces linearized
/// coefficients. Failure and delay are injectable per test.
#[derive(Clone, Default)]
struct PolarPoint {
    fail_at_alpha: Option<f64>,
    panic_at_alpha: Option<f64>,
    delay: Option<Duration>,
}

impl Analysis for PolarPoint {
    fn clone_box(&self) -> Box<dyn Analysis> {
        Box::new(self.clone())
    }

    fn run(
        &mut self,
        config: &ParameterSet,
        progress: &StudyProgress,
    ) -> Result<ResultSet, AnalysisError> {
        let alpha = config.get_double("geometry/alpha")?;
        let re = config.get_double("operation/Re")?;

        if let Some(delay) = self.delay {
            // Interruption point partway through the "computation".
            thread::sleep(delay);
            if progress.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }
        }
        if self.fail_at_alpha == Some(alpha) {
            return Err(AnalysisError::Computation(format!(
                "solver diverged at alpha={alpha}"
            )));
        }
        if self.panic_at_alpha == Some(alpha) {
            panic!("unexpected solver state at alpha={alpha}");
        }

        progress.update("residuals/Ux", 1e-6);

        let mut results = ResultSet::new();
        results.insert_scalar("cl", 0.11 * alpha, "-", "lift coefficient");
        results.insert_scalar("cd", 0.01 + 1e-9 * re, "-", "drag coefficient");
        Ok(results)
    }
}

fn polar_template() -> ParameterSet {
    let mut config = ParameterSet::new();
    config
        .insert(
            "geometry/alpha",
            ParameterValue::DoubleRange(vec![0.0, 5.0, 10.0]),
        )
        .unwrap();
    config
        .insert("operation/Re", ParameterValue::DoubleRange(vec![1e6, 2e6]))
        .unwrap();
    config
        .insert("mesh/cells", ParameterValue::Int(40_000))
        .unwrap();
    config
}

fn polar_study(analysis: PolarPoint) -> ParameterStudy {
    ParameterStudy::new(
        "subcase",
        Box::new(analysis),
        polar_template(),
        vec!["geometry/alpha".to_string(), "operation/Re".to_string()],
    )
}

#[test]
fn test_setup_expands_full_cartesian_product() {
    let mut study = polar_study(PolarPoint::default());
    assert_eq!(study.state(), StudyState::Idle);

    let count = study.setup_queue().unwrap();
    assert_eq!(count, 6);
    assert_eq!(study.state(), StudyState::QueueBuilt);
    assert_eq!(study.handle().counts().pending, 6);
}

#[test]
fn test_instance_names_are_deterministic_and_unique() {
    let mut study = polar_study(PolarPoint::default());
    study.setup_queue().unwrap();
    study.process_queue(2, None).unwrap();

    let names: BTreeSet<String> = study.handle().processed_names().into_iter().collect();
    let expected: BTreeSet<String> = [
        "subcase__alpha=0__Re=1000000",
        "subcase__alpha=0__Re=2000000",
        "subcase__alpha=5__Re=1000000",
        "subcase__alpha=5__Re=2000000",
        "subcase__alpha=10__Re=1000000",
        "subcase__alpha=10__Re=2000000",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(names, expected);
}

#[test]
fn test_enumeration_order_is_odometer() {
    // Last parameter varies fastest; verified through the FIFO queue.
    let mut study = polar_study(PolarPoint::default());
    study.setup_queue().unwrap();
    // One worker drains the queue strictly in FIFO order; completion order
    // then equals enumeration order.
    study.process_queue(1, None).unwrap();

    let names = study.handle().processed_names();
    assert_eq!(
        names,
        vec![
            "subcase__alpha=0__Re=1000000",
            "subcase__alpha=0__Re=2000000",
            "subcase__alpha=5__Re=1000000",
            "subcase__alpha=5__Re=2000000",
            "subcase__alpha=10__Re=1000000",
            "subcase__alpha=10__Re=2000000",
        ]
    );
}

#[test]
fn test_combined_results_cover_every_instance() {
    let mut study = polar_study(PolarPoint::default());
    study.setup_queue().unwrap();
    study.process_queue(2, None).unwrap();
    assert_eq!(study.state(), StudyState::Completed);

    let combined = study.evaluate_runs().unwrap();
    assert_eq!(combined.len(), 6);

    for entry in combined.iter() {
        match &entry.element {
            ResultElement::Section(section) => {
                assert!(section.scalar("cl").is_some());
                assert!(section.scalar("cd").is_some());
            }
            other => panic!("expected a section for {}, got {other:?}", entry.name),
        }
    }
}

#[test]
fn test_single_worker_matches_parallel_aggregate() {
    let mut serial = polar_study(PolarPoint::default());
    serial.setup_queue().unwrap();
    serial.process_queue(1, None).unwrap();

    let mut parallel = polar_study(PolarPoint::default());
    parallel.setup_queue().unwrap();
    parallel.process_queue(4, None).unwrap();

    // Aggregation is keyed by name, so worker count must not matter.
    assert_eq!(
        serial.evaluate_runs().unwrap(),
        parallel.evaluate_runs().unwrap()
    );
}

#[test]
fn test_failing_instance_does_not_affect_siblings() {
    let mut study = polar_study(PolarPoint {
        fail_at_alpha: Some(5.0),
        ..Default::default()
    });
    study.setup_queue().unwrap();
    study.process_queue(3, None).unwrap();
    assert_eq!(study.state(), StudyState::Completed);

    let combined = study.evaluate_runs().unwrap();
    assert_eq!(combined.len(), 6, "no instance outcome may be dropped");

    let mut failures = 0;
    for entry in combined.iter() {
        match &entry.element {
            ResultElement::Failure(message) => {
                failures += 1;
                assert!(entry.name.contains("alpha=5"));
                assert!(message.contains("diverged"));
            }
            ResultElement::Section(section) => {
                assert!(section.scalar("cl").is_some());
            }
            other => panic!("unexpected element {other:?}"),
        }
    }
    assert_eq!(failures, 2, "alpha=5 fails for both Re candidates");
}

#[test]
fn test_panicking_instance_is_contained() {
    let mut study = polar_study(PolarPoint {
        panic_at_alpha: Some(10.0),
        ..Default::default()
    });
    study.setup_queue().unwrap();
    study.process_queue(2, None).unwrap();

    let combined = study.evaluate_runs().unwrap();
    assert_eq!(combined.len(), 6);

    let panicked: Vec<&str> = combined
        .iter()
        .filter(|e| matches!(e.element, ResultElement::Failure(_)))
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(
        panicked,
        vec![
            "subcase__alpha=10__Re=1000000",
            "subcase__alpha=10__Re=2000000"
        ]
    );
}

#[test]
fn test_cancel_stops_new_work_and_joins() {
    let mut study = polar_study(PolarPoint {
        delay: Some(Duration::from_millis(30)),
        ..Default::default()
    });
    study.setup_queue().unwrap();

    let handle = study.handle();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        handle.cancel();
        // Idempotent: a second cancel must return without deadlock.
        handle.cancel();
    });

    study.process_queue(1, None).unwrap();
    canceller.join().unwrap();

    assert_eq!(study.state(), StudyState::Cancelled);
    let counts = study.handle().counts();
    assert_eq!(counts.pending, 0, "cancel drains the pending queue");
    assert!(counts.aborted > 0, "drained instances are marked aborted");
    assert!(
        counts.processed < 6,
        "cancellation must leave the collections partially filled"
    );
    // Aggregation over the partial collections still works.
    let combined = study.evaluate_runs().unwrap();
    assert_eq!(combined.len(), counts.processed);
}

#[test]
fn test_cancel_before_processing_runs_nothing() {
    let mut study = polar_study(PolarPoint::default());
    study.setup_queue().unwrap();
    study.cancel();
    study.process_queue(2, None).unwrap();

    assert_eq!(study.state(), StudyState::Cancelled);
    let counts = study.handle().counts();
    assert_eq!(counts.processed, 0);
    assert_eq!(counts.aborted, 6);
    assert!(study.evaluate_runs().unwrap().is_empty());
}

#[test]
fn test_table_projection_sorted_by_parameter() {
    let mut study = ParameterStudy::new(
        "polar",
        Box::new(PolarPoint::default()),
        {
            let mut config = ParameterSet::new();
            config
                .insert(
                    "geometry/alpha",
                    ParameterValue::DoubleRange(vec![10.0, 0.0, 5.0]),
                )
                .unwrap();
            config
                .insert("operation/Re", ParameterValue::DoubleRange(vec![1e6]))
                .unwrap();
            config
        },
        vec!["geometry/alpha".to_string()],
    );
    study.setup_queue().unwrap();
    study.process_queue(2, None).unwrap();

    let table = study
        .table("lift and drag over alpha", "geometry/alpha", &["cl", "cd"])
        .unwrap();
    assert_eq!(table.columns, vec!["alpha", "cl", "cd"]);
    assert_eq!(table.column("alpha").unwrap(), vec![0.0, 5.0, 10.0]);

    let cl = table.column("cl").unwrap();
    assert!((cl[1] - 0.55).abs() < 1e-12);
    assert!((cl[2] - 1.10).abs() < 1e-12);
}

#[test]
fn test_table_marks_failed_instances_nan() {
    let mut study = polar_study(PolarPoint {
        fail_at_alpha: Some(0.0),
        ..Default::default()
    });
    study.setup_queue().unwrap();
    study.process_queue(2, None).unwrap();

    let table = study.table("polar", "geometry/alpha", &["cl"]).unwrap();
    assert_eq!(table.rows.len(), 6);
    let cl = table.column("cl").unwrap();
    assert_eq!(cl.iter().filter(|v| v.is_nan()).count(), 2);
}

/// Sink recording every (path, value) triple it receives.
#[derive(Default)]
struct RecordingSink {
    updates: Mutex<Vec<(Timestamp, String, f64)>>,
}

impl ProgressSink for RecordingSink {
    fn update(&self, timestamp: Timestamp, path: &str, value: f64) {
        self.updates
            .lock()
            .unwrap()
            .push((timestamp, path.to_string(), value));
    }
}

#[test]
fn test_progress_sink_receives_updates() {
    let sink = Arc::new(RecordingSink::default());
    let mut study = polar_study(PolarPoint::default());
    study.setup_queue().unwrap();
    study.process_queue(2, Some(sink.clone())).unwrap();

    assert_eq!(study.handle().completed(), 6);
    assert_eq!(study.handle().total(), 6);

    let updates = sink.updates.lock().unwrap();
    // One per-instance completion report plus the analyses' own updates.
    let completions = updates
        .iter()
        .filter(|(_, path, _)| path.starts_with("subcase__"))
        .count();
    let residuals = updates
        .iter()
        .filter(|(_, path, _)| path == "residuals/Ux")
        .count();
    assert_eq!(completions, 6);
    assert_eq!(residuals, 6);
}

#[test]
fn test_setup_rejects_missing_parameter() {
    let mut study = ParameterStudy::new(
        "bad",
        Box::new(PolarPoint::default()),
        polar_template(),
        vec!["geometry/beta".to_string()],
    );
    assert_eq!(
        study.setup_queue(),
        Err(StudyError::Parameter(ParameterError::NotFound(
            "geometry/beta".to_string()
        )))
    );
    assert_eq!(study.state(), StudyState::Idle, "failed setup must not advance state");
}

#[test]
fn test_setup_rejects_non_range_parameter() {
    let mut study = ParameterStudy::new(
        "bad",
        Box::new(PolarPoint::default()),
        polar_template(),
        vec!["mesh/cells".to_string()],
    );
    let err = study.setup_queue().unwrap_err();
    assert_eq!(
        err,
        StudyError::Parameter(ParameterError::WrongType {
            path: "mesh/cells".to_string(),
            expected: "double range",
            found: "int",
        })
    );
}

#[test]
fn test_setup_rejects_empty_range() {
    let mut config = polar_template();
    config
        .insert("geometry/alpha", ParameterValue::DoubleRange(vec![]))
        .unwrap();
    let mut study = ParameterStudy::new(
        "bad",
        Box::new(PolarPoint::default()),
        config,
        vec!["geometry/alpha".to_string()],
    );
    assert_eq!(
        study.setup_queue(),
        Err(StudyError::Parameter(ParameterError::EmptyRange(
            "geometry/alpha".to_string()
        )))
    );
}

#[test]
fn test_operations_enforce_state_machine_order() {
    let mut study = polar_study(PolarPoint::default());

    assert!(matches!(
        study.process_queue(2, None),
        Err(StudyError::InvalidState { .. })
    ));
    assert!(matches!(
        study.evaluate_runs(),
        Err(StudyError::InvalidState { .. })
    ));

    study.setup_queue().unwrap();
    assert!(matches!(
        study.setup_queue(),
        Err(StudyError::InvalidState { .. })
    ));
}

/// Reads the swept parameters as fixed doubles and an untouched template
/// entry, so any instance with a leftover range or a lost entry fails.
#[derive(Clone)]
struct ConfigProbe;

impl Analysis for ConfigProbe {
    fn clone_box(&self) -> Box<dyn Analysis> {
        Box::new(ConfigProbe)
    }

    fn run(
        &mut self,
        config: &ParameterSet,
        _progress: &StudyProgress,
    ) -> Result<ResultSet, AnalysisError> {
        config.get_double("geometry/alpha")?;
        config.get_double("operation/Re")?;
        let cells = config.get_int("mesh/cells")?;
        let mut results = ResultSet::new();
        results.insert_scalar("cells", cells as f64, "-", "mesh size");
        Ok(results)
    }
}

#[test]
fn test_instances_substitute_fixed_values() {
    let mut study = ParameterStudy::new(
        "subcase",
        Box::new(ConfigProbe),
        polar_template(),
        vec!["geometry/alpha".to_string(), "operation/Re".to_string()],
    );
    study.setup_queue().unwrap();
    study.process_queue(2, None).unwrap();

    let combined = study.evaluate_runs().unwrap();
    assert_eq!(combined.len(), 6);
    for entry in combined.iter() {
        match &entry.element {
            ResultElement::Section(section) => {
                assert_eq!(section.scalar("cells"), Some(40_000.0));
            }
            other => panic!("expected a section, got {other:?}"),
        }
    }
}
