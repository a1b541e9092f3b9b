//! Per-step outcome of a calibration sweep.

use crate::model::CalibrationSample;

/// Why a single detection attempt within a step was thrown away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// No ridge point after the acquisition gave up.
    NoDetection,
    /// Delta landed on the wrong side of zero.
    WrongSign { pixel_delta: f64 },
    /// Delta moved back toward zero past the previous accepted sample.
    NonMonotonic { pixel_delta: f64, previous: f64 },
}

/// Result of one height step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    Accepted {
        sample: CalibrationSample,
        attempts: usize,
    },
    /// Every attempt was rejected; the sweep carries on without a sample.
    Skipped { rejections: Vec<Rejection> },
}

impl StepStatus {
    pub fn sample(&self) -> Option<CalibrationSample> {
        match self {
            StepStatus::Accepted { sample, .. } => Some(*sample),
            StepStatus::Skipped { .. } => None,
        }
    }
}

/// One entry of the calibration report.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// 1-based step index.
    pub step: usize,
    pub target_z: f64,
    pub status: StepStatus,
}
