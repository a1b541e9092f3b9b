//! Calibration sweep with scripted readings.

use std::sync::Arc;

use lasergauge_core::mocks::{MemoryStore, NoopLaser, RecordingPositioner, ScriptedAcquisition, StaticFrames};
use lasergauge_core::{
    CalibrationCfg, CalibrationEngine, CalibrationStore, CancelToken, DEFAULT_ARTIFACT, DeltaSign,
    GaugeError, Point2, Rejection, SharedRig, StepStatus,
};
use lasergauge_traits::Pose;
use lasergauge_traits::clock::ManualClock;

const START: Pose = Pose::new(10.0, 20.0, 300.0, 180.0, 0.0, 90.0);

fn at(x: f64) -> Option<Point2> {
    Some(Point2::new(x, 360.0))
}

struct Bench {
    rig: SharedRig,
    store: MemoryStore,
    moves: Arc<std::sync::Mutex<Vec<Pose>>>,
}

fn bench_with(positioner: RecordingPositioner) -> Bench {
    let moves = positioner.log();
    let rig = SharedRig::builder()
        .with_frame_source(StaticFrames::empty())
        .with_laser(NoopLaser::default())
        .with_positioner(positioner)
        .build()
        .unwrap();
    Bench {
        rig,
        store: MemoryStore::new(),
        moves,
    }
}

fn bench() -> Bench {
    bench_with(RecordingPositioner::default())
}

fn cfg(steps: usize) -> CalibrationCfg {
    CalibrationCfg {
        num_iterations: steps,
        max_attempts: 3,
        max_polynomial_degree: 3,
        ..CalibrationCfg::default()
    }
}

fn engine(
    b: &Bench,
    cfg: CalibrationCfg,
    script: Vec<Option<Point2>>,
) -> CalibrationEngine<ScriptedAcquisition> {
    CalibrationEngine::new(
        b.rig.clone(),
        ScriptedAcquisition::new(script),
        cfg,
        Arc::new(b.store.clone()),
    )
    .unwrap()
    .with_clock(Arc::new(ManualClock::new()))
}

fn gauge_error(e: &eyre::Report) -> Option<&GaugeError> {
    e.downcast_ref::<GaugeError>()
}

#[test]
fn linear_sweep_is_fitted_and_persisted() {
    let b = bench();
    let mut eng = engine(&b, cfg(4), vec![at(640.0), at(641.0), at(642.0), at(643.0), at(644.0)]);

    let report = eng.calibrate(&START).unwrap();
    let heights: Vec<(f64, f64)> = report
        .model
        .samples
        .iter()
        .map(|s| (s.height_mm, s.pixel_delta))
        .collect();
    assert_eq!(
        heights,
        vec![(0.0, 0.0), (1.0, -1.0), (2.0, -2.0), (3.0, -3.0), (4.0, -4.0)]
    );
    assert!((report.model.pixel_to_mm(-2.5) - 2.5).abs() < 1e-6);
    assert_eq!(report.model.zero_reference, Point2::new(640.0, 360.0));
    assert_eq!(report.model.reference_pose, START);
    assert_eq!(report.skipped_steps(), 0);
    assert!(!report.scores.is_empty());

    let saved = b.store.load(DEFAULT_ARTIFACT).unwrap().expect("artifact saved");
    assert_eq!(saved.zero_reference_coords, [640.0, 360.0]);
    assert_eq!(saved.robot_initial_position, START.to_array());
    assert_eq!(saved.calibration_data, report.model.samples);
    let poly = saved.polynomial.expect("polynomial section");
    assert_eq!(poly.degree, report.model.polynomial.degree);
    for (got, want) in poly.coefficients.iter().zip(&report.model.polynomial.coefficients) {
        assert!((got - want).abs() < 1e-9);
    }
}

#[test]
fn steps_descend_cumulatively_from_the_start_pose() {
    let b = bench();
    let mut eng = engine(&b, cfg(3), vec![at(640.0), at(641.0), at(642.0), at(643.0)]);
    eng.calibrate(&START).unwrap();
    let zs: Vec<f64> = b.moves.lock().unwrap().iter().map(|p| p.z).collect();
    assert_eq!(zs, vec![300.0, 299.0, 298.0, 297.0]);
    assert!(b.moves.lock().unwrap().iter().all(|p| p.x == 10.0 && p.rz == 90.0));
}

#[test]
fn wrong_sign_reading_is_retried_within_the_step() {
    let b = bench();
    let mut eng = engine(
        &b,
        cfg(2),
        vec![at(640.0), at(639.0), at(641.0), at(642.0)],
    );
    let report = eng.calibrate(&START).unwrap();
    match &report.steps[0].status {
        StepStatus::Accepted { sample, attempts } => {
            assert_eq!(*attempts, 2);
            assert_eq!(sample.pixel_delta, -1.0);
        }
        other => panic!("expected accepted step, got {other:?}"),
    }
    assert_eq!(eng.acquisition().calls, 4);
}

#[test]
fn non_monotonic_reading_is_rejected_against_last_accepted() {
    let b = bench();
    // Step 1 accepts -2; step 2 first reads -1 (back toward zero), then -3.
    let mut eng = engine(
        &b,
        cfg(3),
        vec![at(640.0), at(642.0), at(641.0), at(643.0), at(644.0)],
    );
    let report = eng.calibrate(&START).unwrap();
    assert_eq!(report.model.samples.len(), 4);
    match &report.steps[1].status {
        StepStatus::Accepted { sample, attempts } => {
            assert_eq!(*attempts, 2);
            assert_eq!(sample.pixel_delta, -3.0);
        }
        other => panic!("expected accepted step, got {other:?}"),
    }
}

#[test]
fn step_without_accepted_sample_is_skipped() {
    let b = bench();
    let mut eng = engine(
        &b,
        cfg(3),
        vec![at(640.0), at(641.0), None, at(639.0), None, at(643.0)],
    );
    let report = eng.calibrate(&START).unwrap();
    assert_eq!(report.skipped_steps(), 1);
    assert_eq!(
        report.steps[1].status,
        StepStatus::Skipped {
            rejections: vec![
                Rejection::NoDetection,
                Rejection::WrongSign { pixel_delta: 1.0 },
                Rejection::NoDetection,
            ]
        }
    );
    assert_eq!(report.model.samples.len(), 3);
    assert_eq!(report.model.samples[2].height_mm, 3.0);
}

#[test]
fn two_samples_abort_without_artifact() {
    let b = bench();
    let mut eng = engine(&b, cfg(2), vec![at(640.0), at(641.0)]);
    let err = eng.calibrate(&START).unwrap_err();
    assert_eq!(
        gauge_error(&err),
        Some(&GaugeError::InsufficientCalibrationData { got: 2 })
    );
    assert!(b.store.is_empty());
}

#[test]
fn missing_zero_reference_aborts_the_run() {
    let b = bench();
    let mut eng = engine(&b, cfg(2), vec![None]);
    let err = eng.calibrate(&START).unwrap_err();
    assert!(matches!(gauge_error(&err), Some(GaugeError::DetectionFailed { .. })));
    assert_eq!(eng.acquisition().calls, 1);
    assert_eq!(b.moves.lock().unwrap().len(), 1);
    assert!(b.store.is_empty());
}

#[test]
fn positive_sign_accepts_rising_deltas() {
    let b = bench();
    let cfg = CalibrationCfg {
        delta_sign: DeltaSign::Positive,
        ..cfg(3)
    };
    let mut eng = engine(&b, cfg, vec![at(640.0), at(639.0), at(638.0), at(637.0)]);
    let report = eng.calibrate(&START).unwrap();
    assert_eq!(report.model.samples[3].pixel_delta, 3.0);
    assert!((report.model.pixel_to_mm(1.5) - 1.5).abs() < 1e-6);
}

#[test]
fn safety_limit_stops_before_moving() {
    let b = bench();
    let cfg = CalibrationCfg {
        min_safety_z_mm: Some(298.5),
        ..cfg(5)
    };
    let mut eng = engine(&b, cfg, vec![at(640.0), at(641.0), at(642.0)]);
    let err = eng.calibrate(&START).unwrap_err();
    assert!(matches!(
        gauge_error(&err),
        Some(GaugeError::SafetyLimit { target_z, min_z }) if *target_z == 298.0 && *min_z == 298.5
    ));
    let zs: Vec<f64> = b.moves.lock().unwrap().iter().map(|p| p.z).collect();
    assert_eq!(zs, vec![300.0, 299.0]);
    assert!(b.store.is_empty());
}

#[test]
fn stuck_positioner_reports_timeout() {
    let b = bench_with(RecordingPositioner::stuck());
    let mut eng = engine(&b, cfg(2), vec![at(640.0)]);
    let err = eng.calibrate(&START).unwrap_err();
    match gauge_error(&err) {
        Some(GaugeError::PositionerTimeout { target, timeout_ms }) => {
            assert_eq!(*target, START.to_array());
            assert_eq!(*timeout_ms, 2_000);
        }
        other => panic!("expected PositionerTimeout, got {other:?}"),
    }
    assert_eq!(eng.acquisition().calls, 0);
}

#[test]
fn cancelled_run_writes_nothing() {
    let b = bench();
    let cancel = CancelToken::new();
    cancel.cancel();
    let mut eng = engine(&b, cfg(2), vec![at(640.0)]).with_cancel(cancel);
    let err = eng.calibrate(&START).unwrap_err();
    assert_eq!(gauge_error(&err), Some(&GaugeError::Cancelled));
    assert!(b.moves.lock().unwrap().is_empty());
}

#[test]
fn concurrent_run_is_rejected() {
    let b = bench();
    let mut eng = engine(&b, cfg(2), vec![at(640.0)]);
    let _held = b.rig.claim().unwrap();
    let err = eng.calibrate(&START).unwrap_err();
    assert_eq!(gauge_error(&err), Some(&GaugeError::Busy));
}

#[test]
fn invalid_config_fails_construction() {
    let b = bench();
    let bad = CalibrationCfg {
        step_size_mm: 0.0,
        ..CalibrationCfg::default()
    };
    let res = CalibrationEngine::new(
        b.rig.clone(),
        ScriptedAcquisition::new(Vec::new()),
        bad,
        Arc::new(b.store.clone()),
    );
    let err = res.unwrap_err();
    assert!(matches!(gauge_error(&err), Some(GaugeError::InvalidConfiguration(_))));
}

#[test]
fn artifact_name_is_configurable() {
    let b = bench();
    let mut eng = engine(&b, cfg(2), vec![at(640.0), at(641.0), at(642.0)])
        .with_artifact_name("bench_a.json");
    eng.calibrate(&START).unwrap();
    assert_eq!(b.store.list().unwrap(), vec!["bench_a.json".to_string()]);
}
