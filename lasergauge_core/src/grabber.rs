//! Background frame capture.
//!
//! Spawns a thread that owns the `Camera` and publishes each frame into a
//! single-slot buffer; a newer frame overwrites the older one. Readers take
//! the slot's current `Arc` without waiting on the producer beyond the brief
//! swap.
//!
//! Each `FrameGrabber` owns exactly one thread, shut down and joined on drop.
use lasergauge_traits::{Camera, Clock, Frame, FrameSource};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Slot = Arc<Mutex<Option<Arc<Frame>>>>;

pub struct FrameGrabber {
    slot: Slot,
    frames: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl std::fmt::Debug for FrameGrabber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameGrabber")
            .field("frames", &self.frames_captured())
            .field("errors", &self.capture_errors())
            .finish_non_exhaustive()
    }
}

/// Capture period for `fps`; zero means capture back to back.
fn period(fps: u32) -> Duration {
    if fps == 0 {
        Duration::ZERO
    } else {
        Duration::from_micros(1_000_000 / u64::from(fps))
    }
}

impl FrameGrabber {
    pub fn spawn<C, K>(mut camera: C, fps: u32, clock: K) -> Self
    where
        C: Camera + Send + 'static,
        K: Clock + Send + Sync + 'static,
    {
        let slot: Slot = Arc::new(Mutex::new(None));
        let shutdown = Arc::new(AtomicBool::new(false));
        let frames = Arc::new(AtomicU64::new(0));
        let errors = Arc::new(AtomicU64::new(0));
        let period = period(fps);

        let join_handle = {
            let slot = slot.clone();
            let shutdown = shutdown.clone();
            let frames = frames.clone();
            let errors = errors.clone();
            std::thread::spawn(move || {
                loop {
                    if shutdown.load(Ordering::Relaxed) {
                        tracing::debug!("frame grabber received shutdown signal");
                        break;
                    }

                    match camera.capture() {
                        Ok(frame) => {
                            let frame = Arc::new(frame);
                            match slot.lock() {
                                Ok(mut s) => *s = Some(frame),
                                Err(p) => *p.into_inner() = Some(frame),
                            }
                            frames.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            errors.fetch_add(1, Ordering::Relaxed);
                            tracing::trace!(error = %e, "frame capture failed");
                        }
                    }

                    if shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    clock.sleep(period);
                }
                tracing::trace!("frame grabber thread exiting cleanly");
            })
        };

        Self {
            slot,
            frames,
            errors,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Most recent frame, if any has been captured yet.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        match self.slot.lock() {
            Ok(s) => s.clone(),
            Err(p) => p.into_inner().clone(),
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn capture_errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

impl FrameSource for FrameGrabber {
    fn latest_frame(&mut self) -> Option<Arc<Frame>> {
        self.latest()
    }
}

impl Drop for FrameGrabber {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // The thread exits after the capture in progress, if any.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("frame grabber joined"),
                Err(e) => tracing::warn!(?e, "frame grabber panicked during shutdown"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_from_fps() {
        assert_eq!(period(0), Duration::ZERO);
        assert_eq!(period(30), Duration::from_micros(33_333));
        assert_eq!(period(1_000), Duration::from_millis(1));
    }
}
