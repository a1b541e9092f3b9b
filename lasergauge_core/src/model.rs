//! Calibration model and its persisted JSON form.
//!
//! ```json
//! {
//!   "zero_reference_coords": [640.0, 360.0],
//!   "calibration_data": [[0.0, 0.0], [1.0, -3.4]],
//!   "robot_initial_position": [x, y, z, rx, ry, rz],
//!   "polynomial": { "coefficients": [..], "intercept": 0.0, "degree": 1, "mse": 0.0 }
//! }
//! ```

use lasergauge_traits::Pose;
use serde::{Deserialize, Serialize};

use crate::error::{GaugeError, Result};
use crate::regression::evaluate;
use crate::types::Point2;

/// `(height_offset_mm, pixel_delta)`; serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct CalibrationSample {
    pub height_mm: f64,
    pub pixel_delta: f64,
}

impl CalibrationSample {
    pub const ZERO: Self = Self {
        height_mm: 0.0,
        pixel_delta: 0.0,
    };

    pub const fn new(height_mm: f64, pixel_delta: f64) -> Self {
        Self {
            height_mm,
            pixel_delta,
        }
    }
}

impl From<(f64, f64)> for CalibrationSample {
    fn from((h, d): (f64, f64)) -> Self {
        Self::new(h, d)
    }
}

impl From<CalibrationSample> for (f64, f64) {
    fn from(s: CalibrationSample) -> Self {
        (s.height_mm, s.pixel_delta)
    }
}

impl From<&lasergauge_config::SampleRow> for CalibrationSample {
    fn from(r: &lasergauge_config::SampleRow) -> Self {
        Self::new(r.height_mm, r.pixel_delta)
    }
}

impl From<&CalibrationSample> for lasergauge_config::SampleRow {
    fn from(s: &CalibrationSample) -> Self {
        Self {
            height_mm: s.height_mm,
            pixel_delta: s.pixel_delta,
        }
    }
}

/// Fitted `height = f(pixel_delta)` polynomial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub degree: usize,
    /// Cross-validated MSE achieved at selection time.
    pub mse: f64,
}

impl PolynomialModel {
    #[inline]
    pub fn predict(&self, pixel_delta: f64) -> f64 {
        evaluate(&self.coefficients, self.intercept, pixel_delta)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.degree == 0 {
            return Err("polynomial degree must be >= 1".into());
        }
        if self.coefficients.len() != self.degree + 1 {
            return Err(format!(
                "polynomial has {} coefficients, degree {} needs {}",
                self.coefficients.len(),
                self.degree,
                self.degree + 1
            ));
        }
        if self.coefficients.iter().any(|c| !c.is_finite()) || !self.intercept.is_finite() {
            return Err("polynomial contains non-finite values".into());
        }
        Ok(())
    }
}

/// On-disk calibration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationArtifact {
    pub zero_reference_coords: [f64; 2],
    #[serde(default)]
    pub calibration_data: Vec<CalibrationSample>,
    pub robot_initial_position: [f64; 6],
    #[serde(default)]
    pub polynomial: Option<PolynomialModel>,
}

impl CalibrationArtifact {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| GaugeError::MalformedCalibrationArtifact(e.to_string()).report())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| GaugeError::Storage(e.to_string()).report())
    }
}

/// Immutable result of one calibration run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationModel {
    pub polynomial: PolynomialModel,
    pub zero_reference: Point2,
    /// Positioner pose at height 0.
    pub reference_pose: Pose,
    pub samples: Vec<CalibrationSample>,
}

impl CalibrationModel {
    #[inline]
    pub fn pixel_to_mm(&self, pixel_delta: f64) -> f64 {
        self.polynomial.predict(pixel_delta)
    }

    pub fn to_artifact(&self) -> CalibrationArtifact {
        CalibrationArtifact {
            zero_reference_coords: [self.zero_reference.x, self.zero_reference.y],
            calibration_data: self.samples.clone(),
            robot_initial_position: self.reference_pose.to_array(),
            polynomial: Some(self.polynomial.clone()),
        }
    }
}

impl TryFrom<CalibrationArtifact> for CalibrationModel {
    type Error = eyre::Report;

    fn try_from(a: CalibrationArtifact) -> Result<Self> {
        let malformed = |m: String| GaugeError::MalformedCalibrationArtifact(m).report();
        let polynomial = a
            .polynomial
            .ok_or_else(|| malformed("missing polynomial section".into()))?;
        polynomial.validate().map_err(malformed)?;
        let [zx, zy] = a.zero_reference_coords;
        if !(zx.is_finite() && zy.is_finite()) {
            return Err(malformed("zero reference is not finite".into()));
        }
        let reference_pose = Pose::from_array(a.robot_initial_position);
        if !reference_pose.is_finite() {
            return Err(malformed("reference pose is not finite".into()));
        }
        Ok(Self {
            polynomial,
            zero_reference: Point2::new(zx, zy),
            reference_pose,
            samples: a.calibration_data,
        })
    }
}
