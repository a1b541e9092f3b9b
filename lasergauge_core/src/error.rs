use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GaugeError {
    #[error("frame source returned no frame")]
    FrameUnavailable,
    #[error("laser line not detected after {attempts} attempts")]
    DetectionFailed { attempts: usize },
    #[error("insufficient calibration data: {got} samples, need at least 3")]
    InsufficientCalibrationData { got: usize },
    #[error("calibration model not loaded")]
    ModelNotLoaded,
    #[error("malformed calibration artifact: {0}")]
    MalformedCalibrationArtifact(String),
    #[error("positioner did not reach {target:?} within {timeout_ms} ms")]
    PositionerTimeout { target: [f64; 6], timeout_ms: u64 },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("target z {target_z:.3} mm is below safety limit {min_z:.3} mm")]
    SafetyLimit { target_z: f64, min_z: f64 },
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("timeout talking to hardware")]
    Timeout,
    #[error("another gauge operation is already in flight")]
    Busy,
    #[error("operation cancelled")]
    Cancelled,
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing frame source")]
    MissingFrameSource,
    #[error("missing laser")]
    MissingLaser,
    #[error("missing positioner")]
    MissingPositioner,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

impl GaugeError {
    /// Wrap into an `eyre::Report` that callers can downcast back.
    pub fn report(self) -> Report {
        Report::new(self)
    }
}
