use lasergauge_traits::{Pose, Positioner};

use crate::config::MotionCfg;
use crate::error::{GaugeError, Result};
use crate::hw_error::hw;

/// Command `target` and block until it is reached or the move times out.
pub fn move_and_wait(
    positioner: &mut dyn Positioner,
    target: &Pose,
    motion: &MotionCfg,
) -> Result<()> {
    tracing::debug!(target = ?target.to_array(), velocity = motion.velocity, "moving");
    hw(positioner.move_to(target, motion.velocity, motion.acceleration))?;
    let reached = hw(positioner.wait_until_reached(target, motion.threshold_mm, motion.timeout))?;
    if !reached {
        let timeout_ms = u64::try_from(motion.timeout.as_millis()).unwrap_or(u64::MAX);
        tracing::error!(target = ?target.to_array(), timeout_ms, "positioner timeout");
        return Err(GaugeError::PositionerTimeout {
            target: target.to_array(),
            timeout_ms,
        }
        .report());
    }
    Ok(())
}
