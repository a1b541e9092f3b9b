//! Calibration sweep: zero reference, stepped descent, model fit, persist.
//!
//! The head starts at `initial_pose` (height 0) and descends by
//! `step_size_mm` per step. At each step the stripe's displacement from the
//! zero reference is sampled, filtered, and paired with the step's height.
//! A polynomial `height = f(pixel_delta)` is then chosen by cross-validation
//! and written to the store. No artifact is written unless the whole run
//! succeeds.

use std::sync::Arc;

use lasergauge_traits::{Clock, MonotonicClock, Pose};

use crate::acquisition::{Acquisition, LaserAcquisition};
use crate::cancel::CancelToken;
use crate::config::{Axis, CalibrationCfg};
use crate::error::{GaugeError, Result};
use crate::model::{CalibrationModel, CalibrationSample};
use crate::motion::move_and_wait;
use crate::regression::{DegreeScore, MIN_SAMPLES, pick_best_model};
use crate::rig::{Rig, SharedRig};
use crate::status::{Rejection, StepRecord, StepStatus};
use crate::storage::CalibrationStore;
use crate::types::{Point2, pixel_delta};

/// Default artifact name in the store.
pub const DEFAULT_ARTIFACT: &str = "laser_calibration.json";

#[derive(Debug, Clone)]
pub struct CalibrationReport {
    pub model: CalibrationModel,
    pub steps: Vec<StepRecord>,
    /// CV-MSE of every degree that produced a finite score.
    pub scores: Vec<DegreeScore>,
}

impl CalibrationReport {
    pub fn skipped_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Skipped { .. }))
            .count()
    }
}

pub struct CalibrationEngine<A: Acquisition = LaserAcquisition> {
    rig: SharedRig,
    acquisition: A,
    cfg: CalibrationCfg,
    store: Arc<dyn CalibrationStore + Send + Sync>,
    artifact: String,
    clock: Arc<dyn Clock + Send + Sync>,
    cancel: CancelToken,
}

impl<A: Acquisition> std::fmt::Debug for CalibrationEngine<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationEngine")
            .field("cfg", &self.cfg)
            .field("artifact", &self.artifact)
            .finish_non_exhaustive()
    }
}

impl<A: Acquisition> CalibrationEngine<A> {
    pub fn new(
        rig: SharedRig,
        acquisition: A,
        cfg: CalibrationCfg,
        store: Arc<dyn CalibrationStore + Send + Sync>,
    ) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            rig,
            acquisition,
            cfg,
            store,
            artifact: DEFAULT_ARTIFACT.to_string(),
            clock: Arc::new(MonotonicClock::new()),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_artifact_name(mut self, name: impl Into<String>) -> Self {
        self.artifact = name.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// Checked before every step and every detection attempt.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &CalibrationCfg {
        &self.cfg
    }

    pub fn acquisition(&self) -> &A {
        &self.acquisition
    }

    pub fn artifact_name(&self) -> &str {
        &self.artifact
    }

    /// Run a full calibration starting at `initial_pose` and persist the
    /// resulting model.
    pub fn calibrate(&mut self, initial_pose: &Pose) -> Result<CalibrationReport> {
        if !initial_pose.is_finite() {
            return Err(GaugeError::InvalidConfiguration("initial pose is not finite".into()).report());
        }
        let shared = self.rig.clone();
        let mut guard = shared.claim()?;
        let rig = &mut *guard;
        let axis = self.acquisition.axis();
        let cfg = self.cfg.clone();

        tracing::info!(
            z = initial_pose.z,
            steps = cfg.num_iterations,
            step_mm = cfg.step_size_mm,
            "calibration started"
        );
        self.cancel.check()?;
        move_and_wait(&mut *rig.positioner, initial_pose, &cfg.motion)?;
        self.clock.sleep(cfg.settle);

        let zero = match self.acquisition.acquire(&mut *rig.frames, &mut *rig.laser) {
            Ok(r) => r.closest_point,
            Err(e) => {
                tracing::error!(error = %e, "laser line not found at the zero reference");
                return Err(e);
            }
        };
        tracing::info!(x = zero.x, y = zero.y, "zero reference recorded");

        let mut samples = vec![CalibrationSample::ZERO];
        let mut steps = Vec::with_capacity(cfg.num_iterations);
        let mut previous = 0.0;

        for step in 1..=cfg.num_iterations {
            self.cancel.check()?;
            let offset = step as f64 * cfg.step_size_mm;
            let target = initial_pose.with_z(initial_pose.z - offset);
            if let Some(min_z) = cfg.min_safety_z_mm
                && target.z < min_z
            {
                tracing::error!(step, target_z = target.z, min_z, "step below safety limit");
                return Err(GaugeError::SafetyLimit {
                    target_z: target.z,
                    min_z,
                }
                .report());
            }

            move_and_wait(&mut *rig.positioner, &target, &cfg.motion)?;
            self.clock.sleep(cfg.settle);

            let status = self.sample_step(rig, &zero, axis, offset, previous, step)?;
            if let Some(sample) = status.sample() {
                previous = sample.pixel_delta;
                samples.push(sample);
            }
            steps.push(StepRecord {
                step,
                target_z: target.z,
                status,
            });
        }

        if samples.len() < MIN_SAMPLES {
            tracing::error!(got = samples.len(), "not enough calibration samples");
            return Err(GaugeError::InsufficientCalibrationData { got: samples.len() }.report());
        }

        let selection = pick_best_model(&samples, cfg.max_polynomial_degree)?;
        let model = CalibrationModel {
            polynomial: selection.model,
            zero_reference: zero,
            reference_pose: *initial_pose,
            samples,
        };
        self.store.save(&self.artifact, &model.to_artifact())?;
        tracing::info!(
            degree = model.polynomial.degree,
            mse = model.polynomial.mse,
            samples = model.samples.len(),
            artifact = %self.artifact,
            "calibration complete"
        );
        Ok(CalibrationReport {
            model,
            steps,
            scores: selection.scores,
        })
    }

    /// Up to `max_attempts` readings at the current height; the first one
    /// passing the sign and monotonicity filters is accepted.
    fn sample_step(
        &mut self,
        rig: &mut Rig,
        zero: &Point2,
        axis: Axis,
        height_mm: f64,
        previous: f64,
        step: usize,
    ) -> Result<StepStatus> {
        let sign = self.cfg.delta_sign;
        let mut rejections = Vec::new();
        for attempt in 1..=self.cfg.max_attempts {
            self.cancel.check()?;
            let detected = match self.acquisition.acquire(&mut *rig.frames, &mut *rig.laser) {
                Ok(r) => r.closest_point,
                Err(e) if is_no_reading(&e) => {
                    tracing::warn!(step, attempt, "no laser line at this step");
                    rejections.push(Rejection::NoDetection);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let delta = pixel_delta(zero, &detected, axis);
            if !sign.admits(delta) {
                tracing::warn!(step, attempt, pixel_delta = delta, "delta on the wrong side of zero");
                rejections.push(Rejection::WrongSign { pixel_delta: delta });
                continue;
            }
            if !sign.within(delta, previous) {
                tracing::warn!(
                    step,
                    attempt,
                    pixel_delta = delta,
                    previous,
                    "delta not monotonic with the previous sample"
                );
                rejections.push(Rejection::NonMonotonic {
                    pixel_delta: delta,
                    previous,
                });
                continue;
            }
            tracing::info!(step, height_mm, pixel_delta = delta, "calibration sample");
            return Ok(StepStatus::Accepted {
                sample: CalibrationSample::new(height_mm, delta),
                attempts: attempt,
            });
        }
        tracing::warn!(step, attempts = self.cfg.max_attempts, "step skipped");
        Ok(StepStatus::Skipped { rejections })
    }
}

/// Acquisition failures that a step absorbs as a spent attempt.
fn is_no_reading(e: &eyre::Report) -> bool {
    matches!(
        e.downcast_ref::<GaugeError>(),
        Some(GaugeError::DetectionFailed { .. } | GaugeError::FrameUnavailable)
    )
}
