//! Exclusive hardware handle.
//!
//! The laser and the positioner are shared physical resources. Every gauge
//! operation claims the whole rig for its duration; a second claim while one
//! is outstanding fails with `GaugeError::Busy` instead of waiting.

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use lasergauge_traits::{FrameSource, Laser, Positioner};

use crate::error::{GaugeError, Result};

pub struct Rig {
    pub frames: Box<dyn FrameSource + Send>,
    pub laser: Box<dyn Laser + Send>,
    pub positioner: Box<dyn Positioner + Send>,
}

impl std::fmt::Debug for Rig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rig").finish_non_exhaustive()
    }
}

pub type RigGuard<'a> = MutexGuard<'a, Rig>;

/// Cloneable handle to one `Rig`.
#[derive(Clone, Debug)]
pub struct SharedRig(Arc<Mutex<Rig>>);

impl SharedRig {
    pub fn new(rig: Rig) -> Self {
        Self(Arc::new(Mutex::new(rig)))
    }

    /// Claim exclusive use of the rig without blocking.
    pub fn claim(&self) -> Result<RigGuard<'_>> {
        match self.0.try_lock() {
            Ok(g) => Ok(g),
            Err(TryLockError::WouldBlock) => {
                tracing::warn!("rig busy; rejecting concurrent operation");
                Err(GaugeError::Busy.report())
            }
            Err(TryLockError::Poisoned(p)) => {
                // A previous operation panicked mid-flight. Hardware state is
                // re-established by every protocol, so the rig stays usable.
                tracing::warn!("recovering rig after a panicked operation");
                Ok(p.into_inner())
            }
        }
    }
}
