#![no_main]
use lasergauge_core::{CalibrationArtifact, CalibrationModel};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Arbitrary artifact text must either load or be rejected, never panic.
    if let Ok(artifact) = CalibrationArtifact::from_json(data)
        && let Ok(model) = CalibrationModel::try_from(artifact)
    {
        let _ = model.pixel_to_mm(-3.5);
        let _ = model.to_artifact().to_json();
    }
});
