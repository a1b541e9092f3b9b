//! `From` implementations bridging `lasergauge_config` types to runtime types.

use std::time::Duration;

use crate::config::{Axis, CalibrationCfg, DeltaSign, DetectionCfg, MeasuringCfg, MotionCfg};

// ── Enums ────────────────────────────────────────────────────────────────────

impl From<lasergauge_config::Axis> for Axis {
    fn from(a: lasergauge_config::Axis) -> Self {
        match a {
            lasergauge_config::Axis::X => Axis::X,
            lasergauge_config::Axis::Y => Axis::Y,
        }
    }
}

impl From<lasergauge_config::DeltaSign> for DeltaSign {
    fn from(s: lasergauge_config::DeltaSign) -> Self {
        match s {
            lasergauge_config::DeltaSign::Negative => DeltaSign::Negative,
            lasergauge_config::DeltaSign::Positive => DeltaSign::Positive,
        }
    }
}

// ── DetectionCfg ─────────────────────────────────────────────────────────────

impl From<&lasergauge_config::DetectionCfg> for DetectionCfg {
    fn from(c: &lasergauge_config::DetectionCfg) -> Self {
        Self {
            min_intensity: c.min_intensity,
            blur_kernel: (c.blur_kernel[0], c.blur_kernel[1]),
            blur_sigma: c.blur_sigma,
            axis: c.axis.into(),
            laser_channel: c.laser_channel,
            detection_delay: Duration::from_millis(c.detection_delay_ms),
            image_capture_delay: Duration::from_millis(c.image_capture_delay_ms),
            samples: c.samples,
            max_retries: c.max_retries,
            subpixel: c.subpixel,
        }
    }
}

// ── Motion / Calibration / Measuring ─────────────────────────────────────────

impl From<&lasergauge_config::MotionCfg> for MotionCfg {
    fn from(c: &lasergauge_config::MotionCfg) -> Self {
        Self {
            velocity: c.velocity,
            acceleration: c.acceleration,
            threshold_mm: c.threshold_mm,
            timeout: Duration::from_millis(c.timeout_ms),
        }
    }
}

impl From<&lasergauge_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &lasergauge_config::CalibrationCfg) -> Self {
        Self {
            step_size_mm: c.step_size_mm,
            num_iterations: c.num_iterations,
            settle: Duration::from_millis(c.settle_ms),
            max_attempts: c.max_attempts,
            max_polynomial_degree: c.max_polynomial_degree,
            delta_sign: c.delta_sign.into(),
            min_safety_z_mm: c.min_safety_z_mm,
            motion: (&c.motion).into(),
        }
    }
}

impl From<&lasergauge_config::MeasuringCfg> for MeasuringCfg {
    fn from(c: &lasergauge_config::MeasuringCfg) -> Self {
        Self {
            settle: Duration::from_millis(c.settle_ms),
            motion: (&c.motion).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_defaults_match_runtime_defaults() {
        let schema = lasergauge_config::Config::default();
        assert_eq!(DetectionCfg::from(&schema.detection), DetectionCfg::default());
        assert_eq!(
            CalibrationCfg::from(&schema.calibration),
            CalibrationCfg::default()
        );
        assert_eq!(MeasuringCfg::from(&schema.measuring), MeasuringCfg::default());
    }
}
