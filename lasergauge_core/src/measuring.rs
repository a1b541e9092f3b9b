//! Height inference from a stored calibration.

use std::sync::Arc;

use lasergauge_traits::{Clock, MonotonicClock, Pose};

use crate::acquisition::{Acquisition, LaserAcquisition};
use crate::calibration::DEFAULT_ARTIFACT;
use crate::config::MeasuringCfg;
use crate::error::{GaugeError, Result};
use crate::model::CalibrationModel;
use crate::motion::move_and_wait;
use crate::rig::SharedRig;
use crate::storage::{CalibrationStore, load_model};
use crate::types::{Measurement, pixel_delta};

/// Converts stripe displacement into height using a loaded model.
///
/// A service whose model failed to load stays constructible; every
/// operation that needs the model then fails with `ModelNotLoaded`.
pub struct HeightMeasuringService<A: Acquisition = LaserAcquisition> {
    rig: SharedRig,
    acquisition: A,
    cfg: MeasuringCfg,
    store: Arc<dyn CalibrationStore + Send + Sync>,
    artifact: String,
    model: Option<CalibrationModel>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<A: Acquisition> std::fmt::Debug for HeightMeasuringService<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeightMeasuringService")
            .field("cfg", &self.cfg)
            .field("artifact", &self.artifact)
            .field("ready", &self.model.is_some())
            .finish_non_exhaustive()
    }
}

impl<A: Acquisition> HeightMeasuringService<A> {
    /// Validates `cfg` and tries to load the default artifact.
    pub fn new(
        rig: SharedRig,
        acquisition: A,
        cfg: MeasuringCfg,
        store: Arc<dyn CalibrationStore + Send + Sync>,
    ) -> Result<Self> {
        cfg.validate()?;
        let mut svc = Self {
            rig,
            acquisition,
            cfg,
            store,
            artifact: DEFAULT_ARTIFACT.to_string(),
            model: None,
            clock: Arc::new(MonotonicClock::new()),
        };
        let _ = svc.load_calibration();
        Ok(svc)
    }

    /// Switch to another artifact and load it.
    pub fn with_artifact_name(mut self, name: impl Into<String>) -> Self {
        self.artifact = name.into();
        let _ = self.load_calibration();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// (Re)load the artifact. On failure the service is left without a model.
    pub fn load_calibration(&mut self) -> Result<()> {
        match load_model(&*self.store, &self.artifact) {
            Ok(m) => {
                tracing::info!(
                    artifact = %self.artifact,
                    degree = m.polynomial.degree,
                    mse = m.polynomial.mse,
                    reference_z = m.reference_pose.z,
                    "calibration loaded"
                );
                self.model = Some(m);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(artifact = %self.artifact, error = %e, "calibration not loaded");
                self.model = None;
                Err(e)
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Result<&CalibrationModel> {
        self.model
            .as_ref()
            .ok_or_else(|| GaugeError::ModelNotLoaded.report())
    }

    pub fn config(&self) -> &MeasuringCfg {
        &self.cfg
    }

    pub fn acquisition(&self) -> &A {
        &self.acquisition
    }

    pub fn pixel_to_mm(&self, pixel_delta: f64) -> Result<f64> {
        Ok(self.model()?.pixel_to_mm(pixel_delta))
    }

    /// Move to `(x, y)` at the calibrated reference height and orientation.
    pub fn move_to(&mut self, x: f64, y: f64) -> Result<Pose> {
        let target = self.target(x, y)?;
        let mut guard = self.rig.claim()?;
        move_and_wait(&mut *guard.positioner, &target, &self.cfg.motion)?;
        Ok(target)
    }

    /// Move, settle, take one reading and convert it. A failed detection is
    /// returned as an error; no retries happen here.
    pub fn measure_at(&mut self, x: f64, y: f64) -> Result<Measurement> {
        let target = self.target(x, y)?;
        let model = self.model()?;
        let zero = model.zero_reference;

        let shared = self.rig.clone();
        let mut guard = shared.claim()?;
        let rig = &mut *guard;
        move_and_wait(&mut *rig.positioner, &target, &self.cfg.motion)?;
        self.clock.sleep(self.cfg.settle);

        let detected = self
            .acquisition
            .acquire(&mut *rig.frames, &mut *rig.laser)
            .inspect_err(|e| tracing::warn!(x, y, error = %e, "no reading"))?
            .closest_point;
        let delta = pixel_delta(&zero, &detected, self.acquisition.axis());
        let height_mm = self.pixel_to_mm(delta)?;
        tracing::info!(x, y, pixel_delta = delta, height_mm, "height measured");
        Ok(Measurement {
            height_mm,
            pixel_delta: delta,
            point: detected,
        })
    }

    /// Measure at the XY the calibration was recorded at.
    pub fn measure_at_reference(&mut self) -> Result<Measurement> {
        let pose = self.model()?.reference_pose;
        self.measure_at(pose.x, pose.y)
    }

    fn target(&self, x: f64, y: f64) -> Result<Pose> {
        if !(x.is_finite() && y.is_finite()) {
            return Err(
                GaugeError::InvalidConfiguration(format!("target ({x}, {y}) is not finite")).report(),
            );
        }
        Ok(self.model()?.reference_pose.with_xy(x, y))
    }
}
