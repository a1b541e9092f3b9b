//! Runtime configuration for detection, calibration and measurement.
//!
//! These are the validated structs the services hold. They are separate from
//! the TOML-deserialized schema in `lasergauge_config`; see `conversions`.

use std::time::Duration;

use crate::error::{GaugeError, Result};

fn invalid(msg: impl Into<String>) -> eyre::Report {
    GaugeError::InvalidConfiguration(msg.into()).report()
}

/// Scan direction of the detector.
///
/// `Y` walks rows and finds the stripe's x position in each; `X` walks
/// columns and finds y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
    X,
    #[default]
    Y,
}

impl Axis {
    pub const fn as_str(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }
}

/// Parameters for the peak detector and the acquisition protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionCfg {
    pub min_intensity: f32,
    /// Gaussian kernel size `(width, height)`, both odd.
    pub blur_kernel: (usize, usize),
    /// Gaussian sigma; `<= 0` derives it from the kernel size per axis.
    pub blur_sigma: f64,
    pub axis: Axis,
    pub laser_channel: usize,
    pub detection_delay: Duration,
    pub image_capture_delay: Duration,
    pub samples: usize,
    pub max_retries: usize,
    pub subpixel: bool,
}

impl Default for DetectionCfg {
    fn default() -> Self {
        Self {
            min_intensity: 10.0,
            blur_kernel: (21, 21),
            blur_sigma: 0.0,
            axis: Axis::Y,
            laser_channel: 2,
            detection_delay: Duration::from_millis(200),
            image_capture_delay: Duration::from_millis(10),
            samples: 5,
            max_retries: 5,
            subpixel: true,
        }
    }
}

impl DetectionCfg {
    pub fn validate(&self) -> Result<()> {
        if !self.min_intensity.is_finite() || self.min_intensity < 0.0 {
            return Err(invalid("min_intensity must be >= 0"));
        }
        let (kw, kh) = self.blur_kernel;
        if kw == 0 || kh == 0 || kw % 2 == 0 || kh % 2 == 0 {
            return Err(invalid("blur kernel sizes must be odd and >= 1"));
        }
        if !self.blur_sigma.is_finite() {
            return Err(invalid("blur_sigma must be finite"));
        }
        if self.samples == 0 {
            return Err(invalid("samples must be >= 1"));
        }
        if self.max_retries == 0 {
            return Err(invalid("max_retries must be >= 1"));
        }
        Ok(())
    }
}

/// Positioner move parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionCfg {
    pub velocity: f64,
    pub acceleration: f64,
    pub threshold_mm: f64,
    pub timeout: Duration,
}

impl MotionCfg {
    pub fn validate(&self) -> Result<()> {
        if !(self.velocity.is_finite() && self.velocity > 0.0) {
            return Err(invalid("velocity must be > 0"));
        }
        if !(self.acceleration.is_finite() && self.acceleration > 0.0) {
            return Err(invalid("acceleration must be > 0"));
        }
        if !(self.threshold_mm.is_finite() && self.threshold_mm > 0.0) {
            return Err(invalid("position threshold must be > 0"));
        }
        if self.timeout.is_zero() {
            return Err(invalid("movement timeout must be > 0"));
        }
        Ok(())
    }
}

/// Which side of zero the pixel delta falls on as the head moves down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeltaSign {
    #[default]
    Negative,
    Positive,
}

impl DeltaSign {
    /// Zero counts as on-side for both signs.
    #[inline]
    pub fn admits(self, delta: f64) -> bool {
        match self {
            DeltaSign::Negative => delta <= 0.0,
            DeltaSign::Positive => delta >= 0.0,
        }
    }

    /// True when `delta` has not moved further from zero than `prev`.
    #[inline]
    pub fn within(self, delta: f64, prev: f64) -> bool {
        match self {
            DeltaSign::Negative => delta <= prev,
            DeltaSign::Positive => delta >= prev,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCfg {
    pub step_size_mm: f64,
    pub num_iterations: usize,
    pub settle: Duration,
    pub max_attempts: usize,
    pub max_polynomial_degree: usize,
    pub delta_sign: DeltaSign,
    pub min_safety_z_mm: Option<f64>,
    pub motion: MotionCfg,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            step_size_mm: 1.0,
            num_iterations: 50,
            settle: Duration::from_millis(1_000),
            max_attempts: 5,
            max_polynomial_degree: 6,
            delta_sign: DeltaSign::Negative,
            min_safety_z_mm: None,
            motion: MotionCfg {
                velocity: 50.0,
                acceleration: 10.0,
                threshold_mm: 0.2,
                timeout: Duration::from_secs(2),
            },
        }
    }
}

impl CalibrationCfg {
    pub fn validate(&self) -> Result<()> {
        if !(self.step_size_mm.is_finite() && self.step_size_mm > 0.0) {
            return Err(invalid("step_size_mm must be > 0"));
        }
        if self.num_iterations == 0 {
            return Err(invalid("num_iterations must be >= 1"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts must be >= 1"));
        }
        if self.max_polynomial_degree == 0 {
            return Err(invalid("max_polynomial_degree must be >= 1"));
        }
        if let Some(z) = self.min_safety_z_mm
            && !z.is_finite()
        {
            return Err(invalid("min_safety_z_mm must be finite"));
        }
        self.motion.validate()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasuringCfg {
    pub settle: Duration,
    pub motion: MotionCfg,
}

impl Default for MeasuringCfg {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            motion: MotionCfg {
                velocity: 20.0,
                acceleration: 10.0,
                threshold_mm: 0.25,
                timeout: Duration::from_secs(10),
            },
        }
    }
}

impl MeasuringCfg {
    pub fn validate(&self) -> Result<()> {
        self.motion.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_validate() {
        DetectionCfg::default().validate().unwrap();
        CalibrationCfg::default().validate().unwrap();
        MeasuringCfg::default().validate().unwrap();
    }

    #[rstest]
    #[case((20, 21))]
    #[case((21, 0))]
    fn even_or_zero_kernel_is_rejected(#[case] k: (usize, usize)) {
        let cfg = DetectionCfg {
            blur_kernel: k,
            ..DetectionCfg::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GaugeError>(),
            Some(GaugeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn delta_sign_filters() {
        assert!(DeltaSign::Negative.admits(-0.5));
        assert!(!DeltaSign::Negative.admits(0.5));
        assert!(DeltaSign::Negative.within(-2.0, -1.0));
        assert!(!DeltaSign::Negative.within(-0.5, -1.0));
        assert!(DeltaSign::Positive.within(2.0, 1.0));
    }
}
