//! Laser on/off acquisition protocol.
//!
//! One attempt: laser OFF, settle, capture a burst and median it; laser ON,
//! settle, capture and median again; run the detector on the pair. Attempts
//! repeat up to `max_retries`, returning on the first detection.

use std::sync::Arc;

use lasergauge_traits::{Clock, Frame, FrameSource, Laser, MonotonicClock};

use crate::cancel::CancelToken;
use crate::config::{Axis, DetectionCfg};
use crate::detector::{DetectionResult, LaserDetector};
use crate::error::{GaugeError, Result};
use crate::filter::temporal_median;
use crate::hw_error::hw;
use crate::rig::SharedRig;

/// Anything that can turn the rig's camera and laser into a ridge reading.
///
/// The calibration engine and the measuring service are generic over this so
/// tests can substitute scripted readings.
pub trait Acquisition {
    fn acquire(
        &mut self,
        frames: &mut dyn FrameSource,
        laser: &mut dyn Laser,
    ) -> Result<DetectionResult>;

    fn axis(&self) -> Axis;
}

pub struct LaserAcquisition {
    detector: LaserDetector,
    cfg: DetectionCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    cancel: CancelToken,
    last_off: Option<Arc<Frame>>,
    last_on: Option<Arc<Frame>>,
}

impl std::fmt::Debug for LaserAcquisition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaserAcquisition")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl LaserAcquisition {
    /// Validates `cfg`; uses the real monotonic clock.
    pub fn new(cfg: DetectionCfg) -> Result<Self> {
        Self::with_clock(cfg, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(cfg: DetectionCfg, clock: Arc<dyn Clock + Send + Sync>) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            detector: LaserDetector::new(&cfg),
            cfg,
            clock,
            cancel: CancelToken::new(),
            last_off: None,
            last_on: None,
        })
    }

    /// Checked before each attempt.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &DetectionCfg {
        &self.cfg
    }

    /// Median OFF frame of the most recent complete attempt.
    pub fn last_off_frame(&self) -> Option<Arc<Frame>> {
        self.last_off.clone()
    }

    /// Median ON frame of the most recent complete attempt.
    pub fn last_on_frame(&self) -> Option<Arc<Frame>> {
        self.last_on.clone()
    }

    /// Capture `samples` frames and median them; `None` if the source ran dry
    /// or delivered mismatched shapes.
    fn capture_median(&self, frames: &mut dyn FrameSource) -> Option<Arc<Frame>> {
        let n = self.cfg.samples;
        let mut burst = Vec::with_capacity(n);
        for _ in 0..n {
            self.clock.sleep(self.cfg.image_capture_delay);
            match frames.latest_frame() {
                Some(f) => burst.push(f),
                None => tracing::trace!("frame source returned nothing"),
            }
        }
        if burst.len() < n {
            tracing::debug!(got = burst.len(), want = n, "incomplete frame burst");
            return None;
        }
        temporal_median(&burst).map(Arc::new)
    }
}

impl Acquisition for LaserAcquisition {
    fn acquire(
        &mut self,
        frames: &mut dyn FrameSource,
        laser: &mut dyn Laser,
    ) -> Result<DetectionResult> {
        let attempts = self.cfg.max_retries;
        let mut had_frames = false;
        for attempt in 1..=attempts {
            self.cancel.check()?;

            hw(laser.turn_off())?;
            self.clock.sleep(self.cfg.detection_delay);
            let Some(off) = self.capture_median(frames) else {
                tracing::warn!(attempt, "laser-off capture incomplete");
                continue;
            };

            hw(laser.turn_on())?;
            self.clock.sleep(self.cfg.detection_delay);
            let Some(on) = self.capture_median(frames) else {
                tracing::warn!(attempt, "laser-on capture incomplete");
                continue;
            };
            had_frames = true;

            let found = self.detector.detect_line(&on, &off, self.cfg.axis);
            self.last_off = Some(off);
            self.last_on = Some(on);

            if let Some(result) = found {
                tracing::info!(
                    attempt,
                    x = result.closest_point.x,
                    y = result.closest_point.y,
                    "laser line detected"
                );
                return Ok(result);
            }
            tracing::warn!(attempt, max = attempts, "no laser line in frame pair");
        }

        if had_frames {
            tracing::error!(attempts, "laser detection failed");
            Err(GaugeError::DetectionFailed { attempts }.report())
        } else {
            tracing::error!(attempts, "no complete frame burst in any attempt");
            Err(GaugeError::FrameUnavailable.report())
        }
    }

    fn axis(&self) -> Axis {
        self.cfg.axis
    }
}

/// Stand-alone detection entry point: claims the rig for one acquisition.
pub struct LaserDetectionService<A: Acquisition = LaserAcquisition> {
    rig: SharedRig,
    acquisition: A,
}

impl<A: Acquisition> LaserDetectionService<A> {
    pub fn new(rig: SharedRig, acquisition: A) -> Self {
        Self { rig, acquisition }
    }

    pub fn detect(&mut self) -> Result<DetectionResult> {
        let mut guard = self.rig.claim()?;
        let rig = &mut *guard;
        self.acquisition.acquire(&mut *rig.frames, &mut *rig.laser)
    }

    pub fn acquisition(&self) -> &A {
        &self.acquisition
    }
}
