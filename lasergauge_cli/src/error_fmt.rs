//! Human-readable error descriptions and structured JSON error formatting.

use lasergauge_core::error::{BuildError, GaugeError};

fn explain(what: &str, causes: &str, fix: &str) -> String {
    format!("What happened: {what}\nLikely causes: {causes}\nHow to fix: {fix}")
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return explain(
            &format!("The rig could not be assembled ({be})."),
            "A device failed to initialize or was not wired into the builder.",
            "Check the [sim] and [camera] sections of the config and rerun with --log-level=debug.",
        );
    }

    if let Some(ge) = err.downcast_ref::<GaugeError>() {
        return match ge {
            GaugeError::FrameUnavailable => explain(
                "The camera delivered no usable frames.",
                "Camera disconnected, frame rate too low, or capture errors on every grab.",
                "Check the camera connection and camera.fps; `lasergauge self-check` shows whether frames arrive.",
            ),
            GaugeError::DetectionFailed { attempts } => explain(
                &format!("No laser line was found after {attempts} attempt(s)."),
                "Laser off or blocked, stripe outside the field of view, or detection.min_intensity too high.",
                "Run `lasergauge detect --save-frames DIR` and inspect the frames; lower detection.min_intensity if the stripe is faint.",
            ),
            GaugeError::InsufficientCalibrationData { got } => explain(
                &format!("Calibration collected only {got} usable sample(s); at least 3 are needed."),
                "Most steps were skipped because the stripe was not detected or moved the wrong way.",
                "Check calibration.delta_sign, calibration.step_size_mm and the start height, then calibrate again.",
            ),
            GaugeError::ModelNotLoaded => explain(
                "No calibration model is available.",
                "Calibration has not been run yet, or storage.dir/storage.artifact point elsewhere.",
                "Run `lasergauge calibrate` first, or fix the [storage] section.",
            ),
            GaugeError::MalformedCalibrationArtifact(msg) => explain(
                &format!("The stored calibration could not be read ({msg})."),
                "The artifact was edited by hand, truncated, or written by an incompatible version.",
                "Recalibrate with `lasergauge calibrate`; the file is replaced atomically.",
            ),
            GaugeError::PositionerTimeout { timeout_ms, .. } => explain(
                &format!("The positioner did not reach its target within {timeout_ms} ms."),
                "Motion blocked, velocity too low, or the position threshold too tight.",
                "Check the axis for obstructions, or raise *.motion.timeout_ms / *.motion.threshold_mm in the config.",
            ),
            GaugeError::InvalidConfiguration(msg) => explain(
                &format!("Invalid configuration ({msg})."),
                "Missing or out-of-range values in the TOML.",
                "Edit the config file, then rerun.",
            ),
            GaugeError::SafetyLimit { target_z, min_z } => explain(
                &format!("A calibration step would move to z {target_z:.3} mm, below the safety limit {min_z:.3} mm."),
                "Start pose too low, or too many steps for the available travel.",
                "Start higher, or reduce calibration.num_iterations / calibration.step_size_mm.",
            ),
            GaugeError::Timeout => explain(
                "A device did not answer in time.",
                "Loose cable, powered-down controller, or overloaded bus.",
                "Check device power and wiring, then rerun.",
            ),
            GaugeError::Busy => explain(
                "Another gauge operation was already running.",
                "Two commands tried to drive the rig at once.",
                "Wait for the running operation to finish.",
            ),
            GaugeError::Cancelled => explain(
                "The operation was cancelled.",
                "Ctrl-C was pressed.",
                "Rerun the command; no partial calibration was saved.",
            ),
            GaugeError::Hardware(msg) | GaugeError::Storage(msg) => explain(
                &format!("{ge}."),
                "See logs.",
                &format!("Re-run with --log-level=debug or set RUST_LOG for more detail. ({msg})"),
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("samples csv must have headers") {
        return "Invalid headers in samples CSV. Expected 'height_mm,pixel_delta'.".to_string();
    }

    if lower.contains("config") && (lower.contains("parse") || lower.contains("read")) {
        return explain(
            &format!("The configuration could not be loaded ({msg})."),
            "Wrong --config path or a TOML syntax error.",
            "Check the path and the TOML syntax.",
        );
    }

    if lower.contains("must be") {
        return explain(
            &format!("Configuration is invalid ({msg})."),
            "Out-of-range value in the TOML.",
            "Edit the config file and try again.",
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per failure category; anything untyped returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<GaugeError>() {
        Some(GaugeError::InvalidConfiguration(_)) => 2,
        Some(GaugeError::FrameUnavailable | GaugeError::DetectionFailed { .. }) => 3,
        Some(GaugeError::InsufficientCalibrationData { .. }) => 4,
        Some(GaugeError::ModelNotLoaded | GaugeError::MalformedCalibrationArtifact(_)) => 5,
        Some(GaugeError::PositionerTimeout { .. } | GaugeError::SafetyLimit { .. }) => 6,
        Some(GaugeError::Hardware(_) | GaugeError::Timeout) => 7,
        Some(GaugeError::Busy) => 8,
        Some(GaugeError::Cancelled) => 130,
        Some(GaugeError::Storage(_)) | None => 1,
    }
}

/// Stable machine name of the failure category.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "BuildError";
    }
    match err.downcast_ref::<GaugeError>() {
        Some(GaugeError::FrameUnavailable) => "FrameUnavailable",
        Some(GaugeError::DetectionFailed { .. }) => "DetectionFailed",
        Some(GaugeError::InsufficientCalibrationData { .. }) => "InsufficientCalibrationData",
        Some(GaugeError::ModelNotLoaded) => "ModelNotLoaded",
        Some(GaugeError::MalformedCalibrationArtifact(_)) => "MalformedCalibrationArtifact",
        Some(GaugeError::PositionerTimeout { .. }) => "PositionerTimeout",
        Some(GaugeError::InvalidConfiguration(_)) => "InvalidConfiguration",
        Some(GaugeError::SafetyLimit { .. }) => "SafetyLimit",
        Some(GaugeError::Hardware(_)) => "Hardware",
        Some(GaugeError::Timeout) => "Timeout",
        Some(GaugeError::Busy) => "Busy",
        Some(GaugeError::Cancelled) => "Cancelled",
        Some(GaugeError::Storage(_)) => "Storage",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let details = match err.downcast_ref::<GaugeError>() {
        Some(GaugeError::DetectionFailed { attempts }) => Some(json!({ "attempts": attempts })),
        Some(GaugeError::InsufficientCalibrationData { got }) => Some(json!({ "got": got })),
        Some(GaugeError::PositionerTimeout { target, timeout_ms }) => {
            Some(json!({ "target": target, "timeout_ms": timeout_ms }))
        }
        Some(GaugeError::SafetyLimit { target_z, min_z }) => {
            Some(json!({ "target_z": target_z, "min_z": min_z }))
        }
        _ => None,
    };

    let mut obj = json!({ "reason": reason_name(err), "message": humanize(err) });
    if let Some(d) = details {
        obj["details"] = d;
    }
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(GaugeError::DetectionFailed { attempts: 5 }, 3, "No laser line")]
    #[case(GaugeError::ModelNotLoaded, 5, "lasergauge calibrate")]
    #[case(GaugeError::Cancelled, 130, "cancelled")]
    #[case(GaugeError::InsufficientCalibrationData { got: 2 }, 4, "only 2 usable")]
    fn typed_errors_map_to_codes_and_hints(
        #[case] e: GaugeError,
        #[case] code: i32,
        #[case] needle: &str,
    ) {
        let report = e.report();
        assert_eq!(exit_code_for_error(&report), code);
        assert!(humanize(&report).contains(needle));
    }

    #[test]
    fn json_carries_reason_and_details() {
        let report = GaugeError::SafetyLimit {
            target_z: 9.5,
            min_z: 10.0,
        }
        .report();
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&report)).unwrap();
        assert_eq!(v["reason"], "SafetyLimit");
        assert_eq!(v["details"]["min_z"], 10.0);
        assert!(v["message"].as_str().unwrap().starts_with("What happened:"));
    }

    #[test]
    fn untyped_errors_fall_back() {
        let report = eyre::eyre!("boom");
        assert_eq!(exit_code_for_error(&report), 1);
        assert_eq!(reason_name(&report), "Error");
        assert!(humanize(&report).contains("Original: boom"));
    }
}
