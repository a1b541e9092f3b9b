//! Simulated gauge head.
//!
//! One `SimRig` holds the scene state; the camera, laser and positioner it
//! hands out all share it, so frames follow the laser switch and the head
//! pose the same way the real assembly does.
//!
//! The stripe is vertical. Its column is
//! `cx + px_per_mm * d + curvature * d^2`, where `d` is how far the head has
//! come down from `reference_z_mm` plus the surface height under the head.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lasergauge_traits::{BoxError, Camera, Frame, FrameError, Laser, Pose, Positioner};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::HwError;
use crate::util::poll_until;

#[derive(Debug, Clone, PartialEq)]
pub struct SimParams {
    pub width: usize,
    pub height: usize,
    pub px_per_mm: f64,
    pub curvature: f64,
    pub stripe_sigma_px: f64,
    pub stripe_amplitude: f64,
    pub ambient: u8,
    pub noise: u8,
    pub seed: u64,
    pub reference_z_mm: f64,
    pub surface_offset_mm: f64,
    pub surface_tilt_x: f64,
    pub surface_tilt_y: f64,
    /// Divides every simulated move duration.
    pub speedup: f64,
}

impl Default for SimParams {
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
            surface_offset_mm: 0.0,
            surface_tilt_x: 0.0,
            surface_tilt_y: 0.0,
            speedup: 1.0,
        }
    }
}

impl SimParams {
    /// Height of the simulated workpiece under `(x, y)`.
    pub fn surface_height(&self, x: f64, y: f64) -> f64 {
        self.surface_offset_mm + self.surface_tilt_x * x + self.surface_tilt_y * y
    }

    /// Stripe column seen with the head at `pose`.
    pub fn stripe_x(&self, pose: &Pose) -> f64 {
        let d = (self.reference_z_mm - pose.z) + self.surface_height(pose.x, pose.y);
        self.width as f64 / 2.0 + self.px_per_mm * d + self.curvature * d * d
    }
}

#[derive(Debug, Clone, Copy)]
struct Motion {
    from: Pose,
    to: Pose,
    started: Instant,
    duration: Duration,
}

impl Motion {
    fn at_rest(pose: Pose) -> Self {
        Self {
            from: pose,
            to: pose,
            started: Instant::now(),
            duration: Duration::ZERO,
        }
    }

    fn pose_at(&self, now: Instant) -> Pose {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed >= self.duration {
            return self.to;
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        Pose::new(
            lerp(self.from.x, self.to.x),
            lerp(self.from.y, self.to.y),
            lerp(self.from.z, self.to.z),
            lerp(self.from.rx, self.to.rx),
            lerp(self.from.ry, self.to.ry),
            lerp(self.from.rz, self.to.rz),
        )
    }
}

#[derive(Debug)]
struct SimState {
    motion: Motion,
    laser_on: bool,
    frames: u64,
}

/// Shared scene; clone freely.
#[derive(Debug, Clone)]
pub struct SimRig {
    params: Arc<SimParams>,
    state: Arc<Mutex<SimState>>,
}

impl SimRig {
    pub fn new(params: SimParams, start: Pose) -> Self {
        Self {
            params: Arc::new(params),
            state: Arc::new(Mutex::new(SimState {
                motion: Motion::at_rest(start),
                laser_on: false,
                frames: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Head pose right now (mid-move poses are interpolated).
    pub fn pose(&self) -> Pose {
        self.lock().motion.pose_at(Instant::now())
    }

    pub fn laser_is_on(&self) -> bool {
        self.lock().laser_on
    }

    pub fn camera(&self) -> SimCamera {
        SimCamera { rig: self.clone() }
    }

    pub fn laser(&self) -> SimLaser {
        SimLaser { rig: self.clone() }
    }

    pub fn positioner(&self) -> SimPositioner {
        SimPositioner {
            rig: self.clone(),
            poll: Duration::from_millis(1),
        }
    }

    /// Render the frame the camera would see for `pose` and laser state.
    pub fn render(&self, pose: &Pose, laser_on: bool, frame_no: u64) -> Result<Frame, FrameError> {
        let p = &*self.params;
        let (w, h) = (p.width, p.height);
        let xs = p.stripe_x(pose);
        let two_sigma_sq = 2.0 * p.stripe_sigma_px * p.stripe_sigma_px;
        let profile: Vec<f64> = (0..w)
            .map(|x| {
                if laser_on {
                    let d = x as f64 - xs;
                    p.stripe_amplitude * (-(d * d) / two_sigma_sq).exp()
                } else {
                    0.0
                }
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(p.seed ^ frame_no.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let ambient = f64::from(p.ambient);
        let mut data = Vec::with_capacity(w * h * 3);
        for _ in 0..h {
            for stripe in &profile {
                for c in 0..3 {
                    let noise = f64::from(rng.gen_range(0..=p.noise));
                    let red = if c == 2 { *stripe } else { 0.0 };
                    data.push((ambient + red + noise).round().min(255.0) as u8);
                }
            }
        }
        Frame::from_vec(w, h, 3, data)
    }
}

/// Camera rendering the shared scene; BGR output.
#[derive(Debug, Clone)]
pub struct SimCamera {
    rig: SimRig,
}

impl Camera for SimCamera {
    fn capture(&mut self) -> Result<Frame, BoxError> {
        let (pose, laser_on, frame_no) = {
            let mut s = self.rig.lock();
            s.frames += 1;
            (s.motion.pose_at(Instant::now()), s.laser_on, s.frames)
        };
        if !pose.is_finite() {
            return Err(Box::new(HwError::Camera("head pose is not finite".into())));
        }
        tracing::trace!(frame_no, laser_on, z = pose.z, "sim frame");
        self.rig
            .render(&pose, laser_on, frame_no)
            .map_err(|e| Box::new(HwError::Camera(e.to_string())) as BoxError)
    }
}

#[derive(Debug, Clone)]
pub struct SimLaser {
    rig: SimRig,
}

impl Laser for SimLaser {
    fn turn_on(&mut self) -> Result<(), BoxError> {
        self.rig.lock().laser_on = true;
        tracing::debug!("sim laser on");
        Ok(())
    }

    fn turn_off(&mut self) -> Result<(), BoxError> {
        self.rig.lock().laser_on = false;
        tracing::debug!("sim laser off");
        Ok(())
    }
}

/// Positioner moving in a straight line at the commanded velocity.
#[derive(Debug, Clone)]
pub struct SimPositioner {
    rig: SimRig,
    poll: Duration,
}

impl Positioner for SimPositioner {
    fn move_to(&mut self, pose: &Pose, velocity: f64, _acceleration: f64) -> Result<(), BoxError> {
        if !pose.is_finite() {
            return Err(Box::new(HwError::Motion("target pose is not finite".into())));
        }
        if !(velocity.is_finite() && velocity > 0.0) {
            return Err(Box::new(HwError::Motion(format!(
                "velocity must be > 0, got {velocity}"
            ))));
        }
        let speed = velocity * self.rig.params.speedup;
        let now = Instant::now();
        let mut s = self.rig.lock();
        let from = s.motion.pose_at(now);
        let duration = Duration::from_secs_f64(from.distance_to(pose) / speed);
        tracing::debug!(
            z_from = from.z,
            z_to = pose.z,
            ms = duration.as_millis() as u64,
            "sim move"
        );
        s.motion = Motion {
            from,
            to: *pose,
            started: now,
            duration,
        };
        Ok(())
    }

    fn current_pose(&mut self) -> Result<Pose, BoxError> {
        Ok(self.rig.pose())
    }

    fn wait_until_reached(
        &mut self,
        target: &Pose,
        threshold_mm: f64,
        timeout: Duration,
    ) -> Result<bool, BoxError> {
        let rig = &self.rig;
        match poll_until(
            || rig.pose().distance_to(target) <= threshold_mm,
            timeout,
            self.poll,
        ) {
            Ok(_) => Ok(true),
            Err(HwError::Timeout { .. }) => Ok(false),
            Err(e) => Err(Box::new(e)),
        }
    }
}
