//! Type-state builder for `SharedRig`.
//!
//! The builder enforces at compile time that a frame source, laser and
//! positioner are provided before `build()` is available. `try_build()` is
//! always available for dynamic checks.

use std::marker::PhantomData;

use lasergauge_traits::{FrameSource, Laser, Positioner};

use crate::error::{BuildError, Result};
use crate::rig::{Rig, SharedRig};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct RigBuilder<F, L, P> {
    frames: Option<Box<dyn FrameSource + Send>>,
    laser: Option<Box<dyn Laser + Send>>,
    positioner: Option<Box<dyn Positioner + Send>>,
    _f: PhantomData<F>,
    _l: PhantomData<L>,
    _p: PhantomData<P>,
}

impl Default for RigBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            frames: None,
            laser: None,
            positioner: None,
            _f: PhantomData,
            _l: PhantomData,
            _p: PhantomData,
        }
    }
}

impl SharedRig {
    /// Start building a rig.
    pub fn builder() -> RigBuilder<Missing, Missing, Missing> {
        RigBuilder::default()
    }
}

impl<F, L, P> RigBuilder<F, L, P> {
    /// Fallible build available in any type-state; names the first missing part.
    pub fn try_build(self) -> Result<SharedRig> {
        let frames = self
            .frames
            .ok_or_else(|| eyre::Report::new(BuildError::MissingFrameSource))?;
        let laser = self
            .laser
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLaser))?;
        let positioner = self
            .positioner
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPositioner))?;
        Ok(SharedRig::new(Rig {
            frames,
            laser,
            positioner,
        }))
    }
}

// Setters that advance type-state
impl<L, P> RigBuilder<Missing, L, P> {
    pub fn with_frame_source(
        self,
        frames: impl FrameSource + Send + 'static,
    ) -> RigBuilder<Set, L, P> {
        RigBuilder {
            frames: Some(Box::new(frames)),
            laser: self.laser,
            positioner: self.positioner,
            _f: PhantomData,
            _l: PhantomData,
            _p: PhantomData,
        }
    }
}

impl<F, P> RigBuilder<F, Missing, P> {
    pub fn with_laser(self, laser: impl Laser + Send + 'static) -> RigBuilder<F, Set, P> {
        RigBuilder {
            frames: self.frames,
            laser: Some(Box::new(laser)),
            positioner: self.positioner,
            _f: PhantomData,
            _l: PhantomData,
            _p: PhantomData,
        }
    }
}

impl<F, L> RigBuilder<F, L, Missing> {
    pub fn with_positioner(
        self,
        positioner: impl Positioner + Send + 'static,
    ) -> RigBuilder<F, L, Set> {
        RigBuilder {
            frames: self.frames,
            laser: self.laser,
            positioner: Some(Box::new(positioner)),
            _f: PhantomData,
            _l: PhantomData,
            _p: PhantomData,
        }
    }
}

impl RigBuilder<Set, Set, Set> {
    /// Only available once all three collaborators are set.
    pub fn build(self) -> Result<SharedRig> {
        self.try_build()
    }
}
