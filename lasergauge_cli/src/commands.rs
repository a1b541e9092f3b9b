//! Subcommand implementations. Results go to stdout, as text or one JSON
//! object per line.

use std::path::Path;
use std::time::{Duration, Instant};

use eyre::{Result, WrapErr};
use lasergauge_config::{Config, SampleRow};
use lasergauge_core::{
    CalibrationCfg, CalibrationEngine, CalibrationSample, CalibrationStore, CancelToken,
    DEFAULT_ARTIFACT, DetectionCfg, DetectionResult, GaugeError, HeightMeasuringService,
    LaserAcquisition, LaserDetectionService, LaserDetector, MeasuringCfg, Measurement,
    ModelSelection, StepStatus, pick_best_model,
};
use lasergauge_traits::Pose;
use serde_json::json;

use crate::frames;
use crate::rig::{assemble, store};

pub struct Ctx {
    pub cfg: Config,
    pub cancel: CancelToken,
    pub json: bool,
}

impl Ctx {
    fn emit(&self, value: &serde_json::Value, text: impl FnOnce() -> String) {
        if self.json {
            println!("{value}");
        } else {
            println!("{}", text());
        }
    }

    fn acquisition(&self) -> Result<LaserAcquisition> {
        Ok(LaserAcquisition::new(DetectionCfg::from(&self.cfg.detection))?
            .with_cancel(self.cancel.clone()))
    }

    fn measuring_service(&self) -> Result<HeightMeasuringService> {
        let hw = assemble(&self.cfg)?;
        let mut svc = HeightMeasuringService::new(
            hw.rig,
            self.acquisition()?,
            MeasuringCfg::from(&self.cfg.measuring),
            store(&self.cfg),
        )?;
        if self.cfg.storage.artifact != DEFAULT_ARTIFACT {
            svc = svc.with_artifact_name(self.cfg.storage.artifact.clone());
        }
        if !svc.is_ready() {
            // Surface the real cause (missing vs malformed).
            svc.load_calibration()?;
        }
        Ok(svc)
    }
}

fn detection_json(r: &DetectionResult) -> serde_json::Value {
    json!({
        "closest_point": [r.closest_point.x, r.closest_point.y],
        "bright_point": [r.bright_point.x, r.bright_point.y],
        "ridge_points": r.points.len(),
    })
}

fn detection_text(r: &DetectionResult) -> String {
    format!(
        "Laser line: closest ({:.3}, {:.3}), brightest ({:.1}, {:.1}), {} ridge points",
        r.closest_point.x,
        r.closest_point.y,
        r.bright_point.x,
        r.bright_point.y,
        r.points.len()
    )
}

pub fn detect(ctx: &Ctx, save_frames: Option<&Path>) -> Result<()> {
    let hw = assemble(&ctx.cfg)?;
    let mut svc = LaserDetectionService::new(hw.rig, ctx.acquisition()?);
    let r = svc.detect()?;
    ctx.emit(&detection_json(&r), || detection_text(&r));

    if let Some(dir) = save_frames {
        std::fs::create_dir_all(dir).wrap_err_with(|| format!("create {}", dir.display()))?;
        if let Some(off) = svc.acquisition().last_off_frame() {
            frames::save_frame(&dir.join("laser_off.png"), &off)?;
        }
        if let Some(on) = svc.acquisition().last_on_frame() {
            frames::save_frame(&dir.join("laser_on.png"), &on)?;
        }
        frames::save_mask(&dir.join("ridge_mask.png"), &r.mask)?;
        tracing::info!(dir = %dir.display(), "diagnostic frames written");
    }
    Ok(())
}

pub fn detect_files(ctx: &Ctx, on: &Path, off: &Path, mask: Option<&Path>) -> Result<()> {
    let cfg = DetectionCfg::from(&ctx.cfg.detection);
    cfg.validate()?;
    let on = frames::load_bgr(on)?;
    let off = frames::load_bgr(off)?;
    if !on.same_shape(&off) {
        eyre::bail!(
            "image sizes differ: on is {}x{}, off is {}x{}",
            on.width(),
            on.height(),
            off.width(),
            off.height()
        );
    }
    let r = LaserDetector::new(&cfg)
        .detect_line(&on, &off, cfg.axis)
        .ok_or_else(|| GaugeError::DetectionFailed { attempts: 1 }.report())?;
    ctx.emit(&detection_json(&r), || detection_text(&r));
    if let Some(path) = mask {
        frames::save_mask(path, &r.mask)?;
    }
    Ok(())
}

fn selection_text(sel: &ModelSelection) -> String {
    let mut out = String::new();
    for s in &sel.scores {
        out.push_str(&format!("  degree {:>2}: cv-mse {:.6}\n", s.degree, s.cv_mse));
    }
    let m = &sel.model;
    out.push_str(&format!(
        "Model: degree {}, cv-mse {:.6}, intercept {:.6}, coefficients {:?}",
        m.degree, m.mse, m.intercept, m.coefficients
    ));
    out
}

fn scores_json(sel: &ModelSelection) -> serde_json::Value {
    sel.scores
        .iter()
        .map(|s| json!({ "degree": s.degree, "cv_mse": s.cv_mse }))
        .collect()
}

pub fn calibrate(ctx: &Ctx, start: Option<[f64; 6]>, export_csv: Option<&Path>) -> Result<()> {
    let hw = assemble(&ctx.cfg)?;
    let start = start.map_or_else(|| hw.sim.pose(), Pose::from_array);
    let mut engine = CalibrationEngine::new(
        hw.rig,
        ctx.acquisition()?,
        CalibrationCfg::from(&ctx.cfg.calibration),
        store(&ctx.cfg),
    )?
    .with_artifact_name(ctx.cfg.storage.artifact.clone())
    .with_cancel(ctx.cancel.clone());

    let started = Instant::now();
    let report = engine.calibrate(&start)?;

    for rec in &report.steps {
        if let StepStatus::Skipped { rejections } = &rec.status {
            tracing::debug!(step = rec.step, ?rejections, "step skipped");
        }
    }
    if let Some(path) = export_csv {
        let rows: Vec<SampleRow> = report
            .model
            .samples
            .iter()
            .map(|s| SampleRow {
                height_mm: s.height_mm,
                pixel_delta: s.pixel_delta,
            })
            .collect();
        lasergauge_config::write_samples_csv(path, &rows)?;
    }

    let sel = ModelSelection {
        model: report.model.polynomial.clone(),
        scores: report.scores.clone(),
    };
    let m = &report.model;
    ctx.emit(
        &json!({
            "artifact": engine.artifact_name(),
            "samples": m.samples.len(),
            "skipped_steps": report.skipped_steps(),
            "zero_reference": [m.zero_reference.x, m.zero_reference.y],
            "polynomial": {
                "degree": m.polynomial.degree,
                "coefficients": m.polynomial.coefficients,
                "intercept": m.polynomial.intercept,
                "mse": m.polynomial.mse,
            },
            "scores": scores_json(&sel),
            "duration_ms": started.elapsed().as_millis() as u64,
        }),
        || {
            format!(
                "Calibration complete: {} samples, {} skipped steps, saved as {}\n{}",
                m.samples.len(),
                report.skipped_steps(),
                engine.artifact_name(),
                selection_text(&sel)
            )
        },
    );
    Ok(())
}

pub fn fit(ctx: &Ctx, samples: &Path, max_degree: Option<usize>) -> Result<()> {
    let rows = lasergauge_config::load_samples_csv(samples)?;
    let samples: Vec<CalibrationSample> = rows
        .iter()
        .map(|r| CalibrationSample::new(r.height_mm, r.pixel_delta))
        .collect();
    let max_degree = max_degree.unwrap_or(ctx.cfg.calibration.max_polynomial_degree);
    let sel = pick_best_model(&samples, max_degree)?;
    ctx.emit(
        &json!({
            "samples": samples.len(),
            "degree": sel.model.degree,
            "coefficients": sel.model.coefficients,
            "intercept": sel.model.intercept,
            "mse": sel.model.mse,
            "scores": scores_json(&sel),
        }),
        || format!("{} samples\n{}", samples.len(), selection_text(&sel)),
    );
    Ok(())
}

fn measurement_json(x: f64, y: f64, m: &Measurement) -> serde_json::Value {
    json!({
        "x": x,
        "y": y,
        "height_mm": m.height_mm,
        "pixel_delta": m.pixel_delta,
        "point": [m.point.x, m.point.y],
    })
}

pub fn measure(ctx: &Ctx, xy: Option<(f64, f64)>) -> Result<()> {
    let mut svc = ctx.measuring_service()?;
    let (x, y, m) = match xy {
        Some((x, y)) => (x, y, svc.measure_at(x, y)?),
        None => {
            let reference = svc.model()?.reference_pose;
            (reference.x, reference.y, svc.measure_at_reference()?)
        }
    };
    ctx.emit(&measurement_json(x, y, &m), || {
        format!(
            "Height at ({x:.3}, {y:.3}): {:.4} mm (pixel delta {:.3})",
            m.height_mm, m.pixel_delta
        )
    });
    Ok(())
}

pub fn scan(ctx: &Ctx, origin: (f64, f64), pitch: f64, cols: usize, rows: usize) -> Result<()> {
    if !(pitch.is_finite() && pitch > 0.0) {
        eyre::bail!("--pitch must be > 0");
    }
    let mut svc = ctx.measuring_service()?;
    let total = cols * rows;
    let mut failed = 0usize;
    for r in 0..rows {
        for c in 0..cols {
            ctx.cancel.check()?;
            let x = origin.0 + c as f64 * pitch;
            let y = origin.1 + r as f64 * pitch;
            match svc.measure_at(x, y) {
                Ok(m) => ctx.emit(&measurement_json(x, y, &m), || {
                    format!("({x:8.3}, {y:8.3})  {:9.4} mm", m.height_mm)
                }),
                Err(e) => {
                    if matches!(
                        e.downcast_ref::<GaugeError>(),
                        Some(GaugeError::Cancelled | GaugeError::Busy | GaugeError::ModelNotLoaded)
                    ) {
                        return Err(e);
                    }
                    failed += 1;
                    tracing::warn!(x, y, error = %e, "grid point failed");
                    ctx.emit(&json!({ "x": x, "y": y, "error": e.to_string() }), || {
                        format!("({x:8.3}, {y:8.3})  failed: {e}")
                    });
                }
            }
        }
    }
    if failed > 0 {
        eyre::bail!("{failed} of {total} grid points failed");
    }
    Ok(())
}

pub fn show(ctx: &Ctx) -> Result<()> {
    let store = store(&ctx.cfg);
    let artifact = store
        .load(&ctx.cfg.storage.artifact)?
        .ok_or_else(|| GaugeError::ModelNotLoaded.report())?;
    if ctx.json {
        println!("{}", serde_json::to_string(&artifact)?);
    } else {
        println!("{}", artifact.to_json()?);
    }
    Ok(())
}

pub fn list(ctx: &Ctx) -> Result<()> {
    let names = store(&ctx.cfg).list()?;
    ctx.emit(&json!({ "artifacts": names }), || names.join("\n"));
    Ok(())
}

pub fn self_check(ctx: &Ctx) -> Result<()> {
    let hw = assemble(&ctx.cfg)?;
    let (frame, pose) = {
        let mut rig = hw.rig.claim()?;
        let deadline = Instant::now() + Duration::from_secs(2);
        let frame = loop {
            if let Some(f) = rig.frames.latest_frame() {
                break f;
            }
            if Instant::now() >= deadline {
                return Err(GaugeError::FrameUnavailable.report());
            }
            std::thread::sleep(Duration::from_millis(5));
        };
        let pose = rig
            .positioner
            .current_pose()
            .map_err(|e| lasergauge_core::hw_error::map_hw_error(e.as_ref()).report())?;
        (frame, pose)
    };

    toggle_gpio_laser(&ctx.cfg)?;

    let artifacts = store(&ctx.cfg).list()?;
    ctx.emit(
        &json!({
            "ok": true,
            "frame": [frame.width(), frame.height(), frame.channels()],
            "pose": pose.to_array(),
            "artifacts": artifacts.len(),
        }),
        || {
            format!(
                "OK: camera {}x{}x{}, head at z {:.3} mm, {} stored artifact(s)",
                frame.width(),
                frame.height(),
                frame.channels(),
                pose.z,
                artifacts.len()
            )
        },
    );
    Ok(())
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn toggle_gpio_laser(cfg: &Config) -> Result<()> {
    use lasergauge_traits::Laser;
    let Some(pin) = cfg.laser.gpio_pin else {
        return Ok(());
    };
    let mut laser = lasergauge_hardware::GpioLaser::new(pin, cfg.laser.active_low)?;
    laser
        .turn_on()
        .and_then(|()| laser.turn_off())
        .map_err(|e| lasergauge_core::hw_error::map_hw_error(e.as_ref()).report())?;
    tracing::info!(pin, "laser gpio toggled");
    Ok(())
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn toggle_gpio_laser(cfg: &Config) -> Result<()> {
    if let Some(pin) = cfg.laser.gpio_pin {
        tracing::debug!(pin, "built without the hardware feature; laser gpio not checked");
    }
    Ok(())
}
