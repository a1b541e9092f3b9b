//! Rig assembly: simulated head plus frame grabber, wired into a `SharedRig`.

use std::sync::Arc;

use lasergauge_config::{Config, SimCfg};
use lasergauge_core::{FrameGrabber, JsonFileStore, SharedRig};
use lasergauge_hardware::{SimParams, SimRig};
use lasergauge_traits::Pose;
use lasergauge_traits::clock::MonotonicClock;

pub struct Assembled {
    pub rig: SharedRig,
    /// Handle on the simulated scene (pose queries for the CLI).
    pub sim: SimRig,
}

pub fn sim_params(c: &SimCfg) -> SimParams {
    SimParams {
        width: c.width,
        height: c.height,
        px_per_mm: c.px_per_mm,
        curvature: c.curvature,
        stripe_sigma_px: c.stripe_sigma_px,
        stripe_amplitude: c.stripe_amplitude,
        ambient: c.ambient,
        noise: c.noise,
        seed: c.seed,
        reference_z_mm: c.reference_z_mm,
        surface_offset_mm: c.surface_offset_mm,
        surface_tilt_x: c.surface_tilt_x,
        surface_tilt_y: c.surface_tilt_y,
        speedup: c.speedup,
    }
}

pub fn assemble(cfg: &Config) -> eyre::Result<Assembled> {
    let sim = SimRig::new(sim_params(&cfg.sim), Pose::from_array(cfg.sim.start_pose));
    let grabber = FrameGrabber::spawn(sim.camera(), cfg.camera.fps, MonotonicClock::new());
    let rig = SharedRig::builder()
        .with_frame_source(grabber)
        .with_laser(sim.laser())
        .with_positioner(sim.positioner())
        .build()?;
    tracing::debug!(
        width = cfg.sim.width,
        height = cfg.sim.height,
        fps = cfg.camera.fps,
        "sim rig assembled"
    );
    Ok(Assembled { rig, sim })
}

pub fn store(cfg: &Config) -> Arc<JsonFileStore> {
    Arc::new(JsonFileStore::new(&cfg.storage.dir))
}
