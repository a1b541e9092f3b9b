//! Collaborator contracts for the laser-line height gauge.
//!
//! The core never talks to a device directly. Cameras, the laser actuator and
//! the motion controller are reached through the traits in this crate, and all
//! of them report failures as `Box<dyn Error + Send + Sync>` so that concrete
//! backends can bring their own error types.
pub mod clock;
pub mod frame;
pub mod pose;

pub use clock::{Clock, MonotonicClock};
pub use frame::{Frame, FrameError};
pub use pose::Pose;

use std::sync::Arc;
use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Non-blocking access to the most recent camera frame.
///
/// Implementations may hand out the same frame twice, or nothing at all when
/// no frame has been produced yet.
pub trait FrameSource {
    fn latest_frame(&mut self) -> Option<Arc<Frame>>;
}

/// A device that produces frames on demand. Driven by a background grabber.
pub trait Camera {
    fn capture(&mut self) -> Result<Frame, BoxError>;
}

/// Laser actuator: on/off toggle, no acknowledgement.
pub trait Laser {
    fn turn_on(&mut self) -> Result<(), BoxError>;
    fn turn_off(&mut self) -> Result<(), BoxError>;
}

/// Motion controller carrying the camera/laser head.
pub trait Positioner {
    /// Command an absolute pose. Returns once the command is accepted;
    /// use `wait_until_reached` to block on arrival.
    fn move_to(&mut self, pose: &Pose, velocity: f64, acceleration: f64) -> Result<(), BoxError>;

    fn current_pose(&mut self) -> Result<Pose, BoxError>;

    /// Poll `current_pose` until the translation error drops below
    /// `threshold_mm` or `timeout` elapses. Returns `Ok(false)` on timeout.
    fn wait_until_reached(
        &mut self,
        target: &Pose,
        threshold_mm: f64,
        timeout: Duration,
    ) -> Result<bool, BoxError> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let pose = self.current_pose()?;
            if pose.distance_to(target) <= threshold_mm {
                return Ok(true);
            }
            if std::time::Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn latest_frame(&mut self) -> Option<Arc<Frame>> {
        (**self).latest_frame()
    }
}

impl<T: Laser + ?Sized> Laser for Box<T> {
    fn turn_on(&mut self) -> Result<(), BoxError> {
        (**self).turn_on()
    }
    fn turn_off(&mut self) -> Result<(), BoxError> {
        (**self).turn_off()
    }
}

impl<T: Positioner + ?Sized> Positioner for Box<T> {
    fn move_to(&mut self, pose: &Pose, velocity: f64, acceleration: f64) -> Result<(), BoxError> {
        (**self).move_to(pose, velocity, acceleration)
    }
    fn current_pose(&mut self) -> Result<Pose, BoxError> {
        (**self).current_pose()
    }
    fn wait_until_reached(
        &mut self,
        target: &Pose,
        threshold_mm: f64,
        timeout: Duration,
    ) -> Result<bool, BoxError> {
        (**self).wait_until_reached(target, threshold_mm, timeout)
    }
}
