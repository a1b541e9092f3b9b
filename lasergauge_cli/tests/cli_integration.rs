use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

// Small frames, short delays and a fast positioner keep a full sim
// calibration around a second.
fn write_sim_config(dir: &Path) -> PathBuf {
    let toml = format!(
        r#"
[detection]
blur_kernel = [9, 9]
detection_delay_ms = 40
image_capture_delay_ms = 2
samples = 3
max_retries = 3

[calibration]
step_size_mm = 1.0
num_iterations = 8
settle_ms = 5
max_attempts = 3
max_polynomial_degree = 3

[measuring]
settle_ms = 5

[storage]
dir = "{}"

[camera]
fps = 250

[sim]
width = 160
height = 48
noise = 4
speedup = 1000.0
surface_tilt_x = 0.1
"#,
        dir.join("cal").display().to_string().replace('\\', "/")
    );
    let path = dir.join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn gauge(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("lasergauge").unwrap();
    cmd.arg("--log-level").arg("warn").arg("--config").arg(cfg);
    cmd
}

fn json_line(out: &[u8]) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(out);
    let line = stdout
        .lines()
        .rfind(|l| l.starts_with('{'))
        .unwrap_or_else(|| panic!("no JSON line in stdout: {stdout}"));
    serde_json::from_str(line).expect("valid JSON")
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("lasergauge")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("calibrate").and(predicate::str::contains("measure")));
}

#[test]
fn calibrate_then_measure_on_the_simulator() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let csv = dir.path().join("samples.csv");

    let out = gauge(&cfg)
        .arg("--json")
        .arg("calibrate")
        .arg("--export-csv")
        .arg(&csv)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report = json_line(&out);
    assert_eq!(report["samples"], 9, "report: {report}");
    assert!(report["polynomial"]["degree"].as_u64().unwrap() >= 1);
    assert!(dir.path().join("cal/laser_calibration.json").exists());
    assert!(fs::read_to_string(&csv).unwrap().starts_with("height_mm,pixel_delta"));

    // Tilted surface: 0.1 mm per mm of x, so 2 mm at x = 20.
    let out = gauge(&cfg)
        .args(["--json", "measure", "--x", "20", "--y", "0"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let m = json_line(&out);
    let h = m["height_mm"].as_f64().unwrap();
    assert!((h - 2.0).abs() < 0.25, "height {h}");
    assert!(m["pixel_delta"].as_f64().unwrap() < 0.0);

    let out = gauge(&cfg)
        .args(["--json", "measure"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let h = json_line(&out)["height_mm"].as_f64().unwrap();
    assert!(h.abs() < 0.25, "reference height {h}");

    gauge(&cfg)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("zero_reference_coords"));
    gauge(&cfg)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("laser_calibration.json"));

    // The exported samples refit offline.
    gauge(&cfg)
        .args(["--json", "fit", "--samples"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"scores\""));
}

#[test]
fn scan_reports_every_grid_point() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    gauge(&cfg).arg("calibrate").assert().success();

    let out = gauge(&cfg)
        .args(["--json", "scan", "--origin", "0,0", "--pitch", "10", "--cols", "2", "--rows", "1"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&out);
    let points: Vec<serde_json::Value> = stdout
        .lines()
        .filter(|l| l.starts_with('{'))
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(points.len(), 2);
    let h1 = points[1]["height_mm"].as_f64().unwrap();
    assert!((h1 - 1.0).abs() < 0.25, "height at x=10: {h1}");
}

#[test]
fn measure_without_calibration_explains_what_to_do() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    gauge(&cfg)
        .arg("measure")
        .assert()
        .code(5)
        .stderr(predicate::str::contains("lasergauge calibrate"));
}

#[test]
fn json_errors_carry_a_reason() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let out = gauge(&cfg)
        .args(["--json", "show"])
        .assert()
        .code(5)
        .get_output()
        .stdout
        .clone();
    assert_eq!(json_line(&out)["reason"], "ModelNotLoaded");
}

#[test]
fn fit_reports_the_chosen_model() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let csv = dir.path().join("s.csv");
    fs::write(&csv, "height_mm,pixel_delta\n0,0\n1,-2\n2,-4\n3,-6\n4,-8\n").unwrap();

    let out = gauge(&cfg)
        .args(["--json", "fit", "--max-degree", "1", "--samples"])
        .arg(&csv)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v = json_line(&out);
    assert_eq!(v["degree"], 1);
    assert_eq!(v["samples"], 5);
    let slope = v["coefficients"][1].as_f64().unwrap();
    assert!((slope + 0.5).abs() < 1e-6, "slope {slope}");
}

#[test]
fn fit_rejects_bad_headers() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let csv = dir.path().join("bad.csv");
    fs::write(&csv, "raw,value\n1,2\n").unwrap();
    gauge(&cfg)
        .args(["fit", "--samples"])
        .arg(&csv)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
#[case("[detection]\nsamples = 0\n", "detection.samples")]
#[case("[calibration]\nstep_size_mm = -1.0\n", "calibration.step_size_mm")]
fn invalid_config_exits_with_code_two(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, toml).unwrap();
    gauge(&cfg)
        .arg("list")
        .assert()
        .code(2)
        .stderr(predicate::str::contains(needle));
}

#[test]
fn detect_files_finds_a_painted_stripe() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let (w, h) = (64u32, 24u32);
    let off = image::RgbImage::from_pixel(w, h, image::Rgb([20, 20, 20]));
    let mut on = off.clone();
    for y in 0..h {
        for (x, red) in [(39u32, 120u8), (40, 200), (41, 120)] {
            on.put_pixel(x, y, image::Rgb([red, 20, 20]));
        }
    }
    let (on_path, off_path) = (dir.path().join("on.png"), dir.path().join("off.png"));
    let mask_path = dir.path().join("mask.png");
    on.save(&on_path).unwrap();
    off.save(&off_path).unwrap();

    let out = gauge(&cfg)
        .arg("--json")
        .arg("detect-files")
        .arg("--on")
        .arg(&on_path)
        .arg("--off")
        .arg(&off_path)
        .arg("--mask")
        .arg(&mask_path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v = json_line(&out);
    let x = v["closest_point"][0].as_f64().unwrap();
    assert!((x - 40.0).abs() < 0.1, "x {x}");
    assert_eq!(v["ridge_points"], 24);
    let mask = image::open(&mask_path).unwrap().to_luma8();
    assert_eq!(mask.get_pixel(40, 5).0, [255]);
}

#[test]
fn detect_files_without_a_stripe_fails() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let flat = image::RgbImage::from_pixel(16, 8, image::Rgb([20, 20, 20]));
    let path = dir.path().join("flat.png");
    flat.save(&path).unwrap();
    gauge(&cfg)
        .arg("detect-files")
        .arg("--on")
        .arg(&path)
        .arg("--off")
        .arg(&path)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No laser line"));
}

#[test]
fn detect_on_the_simulator_saves_frames() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    let frames = dir.path().join("frames");
    let out = gauge(&cfg)
        .args(["--json", "detect", "--save-frames"])
        .arg(&frames)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let x = json_line(&out)["closest_point"][0].as_f64().unwrap();
    assert!((x - 80.0).abs() < 0.5, "x {x}");
    for name in ["laser_off.png", "laser_on.png", "ridge_mask.png"] {
        assert!(frames.join(name).exists(), "missing {name}");
    }
}

#[test]
fn self_check_reports_ok() {
    let dir = tempdir().unwrap();
    let cfg = write_sim_config(dir.path());
    gauge(&cfg)
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("OK"));
}
