#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::similar_names
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Laser-line height gauge engine (hardware-agnostic).
//!
//! All device access goes through `lasergauge_traits::{FrameSource, Laser,
//! Positioner}`, held together in one exclusive `SharedRig`.
//!
//! ## Architecture
//!
//! - **Detection**: on/off frame difference, Gaussian blur, per-scan-line
//!   peak with parabolic subpixel refinement (`detector`)
//! - **Acquisition**: laser toggling, temporal median of frame bursts,
//!   bounded retries (`acquisition`)
//! - **Calibration**: stepped descent from a zero reference, sample
//!   filtering, cross-validated polynomial order selection (`calibration`,
//!   `regression`)
//! - **Measurement**: pixel delta to millimetres through a stored model
//!   (`measuring`)
//! - **Storage**: JSON artifacts with atomic replacement (`storage`)
//!
//! Every operation claims the rig for its whole duration; a concurrent call
//! fails fast with `GaugeError::Busy`.

pub mod acquisition;
pub mod atomic;
pub mod builder;
pub mod calibration;
pub mod cancel;
pub mod config;
pub mod conversions;
pub mod detector;
pub mod error;
pub mod filter;
pub mod grabber;
pub mod hw_error;
pub mod image;
pub mod measuring;
pub mod mocks;
pub mod model;
pub mod motion;
pub mod regression;
pub mod rig;
pub mod status;
pub mod storage;
pub mod types;

pub use acquisition::{Acquisition, LaserAcquisition, LaserDetectionService};
pub use builder::RigBuilder;
pub use calibration::{CalibrationEngine, CalibrationReport, DEFAULT_ARTIFACT};
pub use cancel::CancelToken;
pub use config::{Axis, CalibrationCfg, DeltaSign, DetectionCfg, MeasuringCfg, MotionCfg};
pub use detector::{DetectionResult, LaserDetector};
pub use error::{BuildError, GaugeError, Report, Result};
pub use grabber::FrameGrabber;
pub use measuring::HeightMeasuringService;
pub use model::{CalibrationArtifact, CalibrationModel, CalibrationSample, PolynomialModel};
pub use regression::{DegreeScore, ModelSelection, pick_best_model};
pub use rig::{Rig, SharedRig};
pub use status::{Rejection, StepRecord, StepStatus};
pub use storage::{CalibrationStore, JsonFileStore, load_model};
pub use types::{Measurement, Point2, pixel_delta};
