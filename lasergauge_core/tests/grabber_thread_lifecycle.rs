//! Frame grabber thread lifecycle.
//!
//! Verifies that:
//! - The thread is joined when the grabber is dropped
//! - Many grabbers can be created and destroyed without hanging
//! - Capture errors are counted and do not stop the thread

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use lasergauge_core::FrameGrabber;
use lasergauge_traits::clock::MonotonicClock;
use lasergauge_traits::{BoxError, Camera, Frame, FrameSource};

/// Camera numbering its frames through the first pixel; every `fail_every`th
/// capture errors.
struct CountingCamera {
    n: Arc<AtomicUsize>,
    fail_every: usize,
}

impl CountingCamera {
    fn new(fail_every: usize) -> (Self, Arc<AtomicUsize>) {
        let n = Arc::new(AtomicUsize::new(0));
        (
            Self {
                n: n.clone(),
                fail_every,
            },
            n,
        )
    }
}

impl Camera for CountingCamera {
    fn capture(&mut self) -> Result<Frame, BoxError> {
        let i = self.n.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_every > 0 && i % self.fail_every == 0 {
            return Err("camera hiccup".into());
        }
        Ok(Frame::filled(4, 4, 1, (i % 256) as u8)?)
    }
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn publishes_frames_and_exits_on_drop() {
    let (camera, captures) = CountingCamera::new(0);
    let mut grabber = FrameGrabber::spawn(camera, 200, MonotonicClock::new());
    assert!(wait_for(|| grabber.frames_captured() >= 3));
    assert!(grabber.latest_frame().is_some());

    drop(grabber);
    let after_drop = captures.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(captures.load(Ordering::SeqCst), after_drop, "thread kept running");
}

#[test]
fn latest_frame_advances() {
    let (camera, _) = CountingCamera::new(0);
    let grabber = FrameGrabber::spawn(camera, 500, MonotonicClock::new());
    assert!(wait_for(|| grabber.latest().is_some()));
    let first = grabber.latest().unwrap().at(0, 0, 0);
    assert!(wait_for(|| grabber.latest().is_some_and(|f| f.at(0, 0, 0) != first)));
}

#[test]
fn capture_errors_are_counted() {
    let (camera, _) = CountingCamera::new(2);
    let grabber = FrameGrabber::spawn(camera, 500, MonotonicClock::new());
    assert!(wait_for(|| grabber.capture_errors() >= 2 && grabber.frames_captured() >= 2));
}

#[test]
fn multiple_grabbers_dont_leak_threads() {
    for _ in 0..10 {
        let (camera, _) = CountingCamera::new(0);
        let grabber = FrameGrabber::spawn(camera, 100, MonotonicClock::new());
        std::thread::sleep(Duration::from_millis(5));
        let _ = grabber.latest();
        drop(grabber);
    }
}
