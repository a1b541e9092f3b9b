#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and calibration-sample CSV handling for the height gauge.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section is optional; missing keys fall back to bench defaults.
//! - Calibration samples can be exported to and re-imported from a CSV with
//!   strict headers for offline refits.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Calibration sample CSV schema.
///
/// Expected headers:
/// height_mm,pixel_delta
///
/// Example:
/// height_mm,pixel_delta
/// 0.0,0.0
/// -1.0,-3.42
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct SampleRow {
    pub height_mm: f64,
    pub pixel_delta: f64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    #[default]
    Y,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeltaSign {
    #[default]
    Negative,
    Positive,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DetectionCfg {
    /// Scan-lines whose blurred peak is at or below this are ignored.
    pub min_intensity: f32,
    /// Gaussian kernel `[width, height]`; both must be odd.
    pub blur_kernel: [usize; 2],
    /// Gaussian sigma; 0 derives it from the kernel size.
    pub blur_sigma: f64,
    pub axis: Axis,
    /// Channel index that carries the laser (2 = red in BGR frames).
    pub laser_channel: usize,
    pub detection_delay_ms: u64,
    pub image_capture_delay_ms: u64,
    pub samples: usize,
    pub max_retries: usize,
    pub subpixel: bool,
}

impl Default for DetectionCfg {
    fn default() -> Self {
        Self {
            min_intensity: 10.0,
            blur_kernel: [21, 21],
            blur_sigma: 0.0,
            axis: Axis::Y,
            laser_channel: 2,
            detection_delay_ms: 200,
            image_capture_delay_ms: 10,
            samples: 5,
            max_retries: 5,
            subpixel: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct MotionCfg {
    pub velocity: f64,
    pub acceleration: f64,
    /// Position is considered reached within this translation error.
    pub threshold_mm: f64,
    pub timeout_ms: u64,
}

impl MotionCfg {
    const fn calibration() -> Self {
        Self {
            velocity: 50.0,
            acceleration: 10.0,
            threshold_mm: 0.2,
            timeout_ms: 2_000,
        }
    }

    const fn measuring() -> Self {
        Self {
            velocity: 20.0,
            acceleration: 10.0,
            threshold_mm: 0.25,
            timeout_ms: 10_000,
        }
    }

    fn validate(&self, section: &str) -> eyre::Result<()> {
        if !(self.velocity.is_finite() && self.velocity > 0.0) {
            eyre::bail!("{section}.velocity must be > 0");
        }
        if !(self.acceleration.is_finite() && self.acceleration > 0.0) {
            eyre::bail!("{section}.acceleration must be > 0");
        }
        if !(self.threshold_mm.is_finite() && self.threshold_mm > 0.0) {
            eyre::bail!("{section}.threshold_mm must be > 0");
        }
        if self.timeout_ms == 0 {
            eyre::bail!("{section}.timeout_ms must be >= 1");
        }
        Ok(())
    }
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self::calibration()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    pub step_size_mm: f64,
    pub num_iterations: usize,
    pub settle_ms: u64,
    /// Detection attempts per height step before the step is skipped.
    pub max_attempts: usize,
    pub max_polynomial_degree: usize,
    /// Side of zero on which valid pixel deltas fall while moving down.
    pub delta_sign: DeltaSign,
    /// Refuse to move below this Z (mm), when set.
    pub min_safety_z_mm: Option<f64>,
    pub motion: MotionCfg,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            step_size_mm: 1.0,
            num_iterations: 50,
            settle_ms: 1_000,
            max_attempts: 5,
            max_polynomial_degree: 6,
            delta_sign: DeltaSign::Negative,
            min_safety_z_mm: None,
            motion: MotionCfg::calibration(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MeasuringCfg {
    pub settle_ms: u64,
    pub motion: MotionCfg,
}

impl Default for MeasuringCfg {
    fn default() -> Self {
        Self {
            settle_ms: 500,
            motion: MotionCfg::measuring(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageCfg {
    /// Directory holding calibration artifacts.
    pub dir: PathBuf,
    /// Artifact file name inside `dir`.
    pub artifact: String,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("calibration"),
            artifact: "laser_calibration.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CameraCfg {
    /// Grabber pacing; the camera is polled at most this often.
    pub fps: u32,
}

impl Default for CameraCfg {
    fn default() -> Self {
        Self { fps: 30 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LaserCfg {
    /// BCM pin driving the laser module (`hardware` builds only).
    pub gpio_pin: Option<u8>,
    pub active_low: bool,
}

/// Synthetic rig parameters used when no hardware backend is compiled in.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    pub width: usize,
    pub height: usize,
    /// Stripe shift in pixels per millimetre of height change.
    pub px_per_mm: f64,
    /// Quadratic term of the stripe shift (px/mm^2).
    pub curvature: f64,
    /// Stripe cross-section sigma in pixels.
    pub stripe_sigma_px: f64,
    pub stripe_amplitude: f64,
    pub ambient: u8,
    /// Uniform noise half-width added to every pixel.
    pub noise: u8,
    pub seed: u64,
    /// Z at which the stripe crosses the image centre.
    pub reference_z_mm: f64,
    /// Initial positioner pose.
    pub start_pose: [f64; 6],
    /// Surface height model: offset + tilt_x * x + tilt_y * y (mm).
    pub surface_offset_mm: f64,
    pub surface_tilt_x: f64,
    pub surface_tilt_y: f64,
    /// Simulated positioner speed multiplier; tests use large values.
    pub speedup: f64,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            px_per_mm: 2.0,
            curvature: 0.01,
            stripe_sigma_px: 2.0,
            stripe_amplitude: 180.0,
            ambient: 30,
            noise: 12,
            seed: 7,
            reference_z_mm: 300.0,
            start_pose: [0.0, 0.0, 300.0, 180.0, 0.0, 90.0],
            surface_offset_mm: 0.0,
            surface_tilt_x: 0.0,
            surface_tilt_y: 0.0,
            speedup: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionCfg,
    pub calibration: CalibrationCfg,
    pub measuring: MeasuringCfg,
    pub storage: StorageCfg,
    pub camera: CameraCfg,
    pub laser: LaserCfg,
    pub sim: SimCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Detection
        let d = &self.detection;
        if !(d.min_intensity.is_finite() && d.min_intensity >= 0.0) {
            eyre::bail!("detection.min_intensity must be >= 0");
        }
        for k in d.blur_kernel {
            if k == 0 || k % 2 == 0 {
                eyre::bail!("detection.blur_kernel entries must be odd and >= 1");
            }
        }
        if !d.blur_sigma.is_finite() || d.blur_sigma < 0.0 {
            eyre::bail!("detection.blur_sigma must be >= 0");
        }
        if d.samples == 0 {
            eyre::bail!("detection.samples must be >= 1");
        }
        if d.max_retries == 0 {
            eyre::bail!("detection.max_retries must be >= 1");
        }
        if d.laser_channel > 3 {
            eyre::bail!("detection.laser_channel must be in 0..=3");
        }

        // Calibration
        let c = &self.calibration;
        if !(c.step_size_mm.is_finite() && c.step_size_mm > 0.0) {
            eyre::bail!("calibration.step_size_mm must be > 0");
        }
        if c.num_iterations == 0 {
            eyre::bail!("calibration.num_iterations must be >= 1");
        }
        if c.max_attempts == 0 {
            eyre::bail!("calibration.max_attempts must be >= 1");
        }
        if c.max_polynomial_degree == 0 {
            eyre::bail!("calibration.max_polynomial_degree must be >= 1");
        }
        if c.max_polynomial_degree > 12 {
            eyre::bail!("calibration.max_polynomial_degree is unreasonably large (>12)");
        }
        if let Some(z) = c.min_safety_z_mm
            && !z.is_finite()
        {
            eyre::bail!("calibration.min_safety_z_mm must be finite");
        }
        c.motion.validate("calibration.motion")?;

        // Measuring
        self.measuring.motion.validate("measuring.motion")?;

        // Storage
        if self.storage.artifact.trim().is_empty() {
            eyre::bail!("storage.artifact must not be empty");
        }
        if Path::new(&self.storage.artifact).components().count() != 1 {
            eyre::bail!("storage.artifact must be a bare file name");
        }

        // Camera
        if self.camera.fps == 0 {
            eyre::bail!("camera.fps must be > 0");
        }

        // Laser
        if let Some(pin) = self.laser.gpio_pin
            && pin > 27
        {
            eyre::bail!("laser.gpio_pin must be a BCM pin in 0..=27");
        }

        // Sim
        let s = &self.sim;
        if s.width < 3 || s.height < 3 {
            eyre::bail!("sim.width and sim.height must be >= 3");
        }
        if !(s.stripe_sigma_px.is_finite() && s.stripe_sigma_px > 0.0) {
            eyre::bail!("sim.stripe_sigma_px must be > 0");
        }
        if !s.px_per_mm.is_finite() || !s.curvature.is_finite() {
            eyre::bail!("sim.px_per_mm and sim.curvature must be finite");
        }
        if !(s.speedup.is_finite() && s.speedup > 0.0) {
            eyre::bail!("sim.speedup must be > 0");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

pub fn load_samples_csv(path: &Path) -> eyre::Result<Vec<SampleRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open samples CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["height_mm", "pixel_delta"];
    let actual: Vec<String> = headers.iter().map(|s| s.trim().to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "samples CSV must have headers 'height_mm,pixel_delta', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<SampleRow>().enumerate() {
        match rec {
            Ok(row) if row.height_mm.is_finite() && row.pixel_delta.is_finite() => rows.push(row),
            Ok(_) => eyre::bail!("non-finite value in CSV row {}", idx + 2),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    Ok(rows)
}

pub fn write_samples_csv(path: &Path, rows: &[SampleRow]) -> eyre::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| eyre::eyre!("create samples CSV {:?}: {}", path, e))?;
    // Written by hand so an empty run still yields a loadable file.
    wtr.write_record(["height_mm", "pixel_delta"])?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
