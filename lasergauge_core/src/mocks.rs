//! Test and helper mocks for lasergauge_core

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use lasergauge_traits::{BoxError, Frame, FrameSource, Laser, Pose, Positioner};

use crate::acquisition::Acquisition;
use crate::config::Axis;
use crate::detector::DetectionResult;
use crate::error::{GaugeError, Result};
use crate::model::CalibrationArtifact;
use crate::storage::CalibrationStore;
use crate::types::Point2;

/// Frame source cycling through a fixed list; `empty()` never yields.
#[derive(Debug, Default)]
pub struct StaticFrames {
    frames: Vec<Arc<Frame>>,
    next: usize,
}

impl StaticFrames {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into_iter().map(Arc::new).collect(),
            next: 0,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl FrameSource for StaticFrames {
    fn latest_frame(&mut self) -> Option<Arc<Frame>> {
        if self.frames.is_empty() {
            return None;
        }
        let f = self.frames[self.next % self.frames.len()].clone();
        self.next += 1;
        Some(f)
    }
}

/// Laser that only records its state.
#[derive(Debug, Default, Clone)]
pub struct NoopLaser {
    pub on: bool,
    pub toggles: usize,
}

impl Laser for NoopLaser {
    fn turn_on(&mut self) -> std::result::Result<(), BoxError> {
        self.on = true;
        self.toggles += 1;
        Ok(())
    }
    fn turn_off(&mut self) -> std::result::Result<(), BoxError> {
        self.on = false;
        self.toggles += 1;
        Ok(())
    }
}

/// Positioner that teleports to every commanded pose and logs it.
///
/// With `stuck()` it accepts commands but never moves.
#[derive(Debug, Clone, Default)]
pub struct RecordingPositioner {
    pose: Pose,
    stuck: bool,
    log: Arc<Mutex<Vec<Pose>>>,
}

impl RecordingPositioner {
    pub fn stuck() -> Self {
        Self {
            stuck: true,
            ..Self::default()
        }
    }

    /// Shared view of every pose commanded so far.
    pub fn log(&self) -> Arc<Mutex<Vec<Pose>>> {
        self.log.clone()
    }
}

impl Positioner for RecordingPositioner {
    fn move_to(&mut self, pose: &Pose, _v: f64, _a: f64) -> std::result::Result<(), BoxError> {
        if let Ok(mut log) = self.log.lock() {
            log.push(*pose);
        }
        if !self.stuck {
            self.pose = *pose;
        }
        Ok(())
    }

    fn current_pose(&mut self) -> std::result::Result<Pose, BoxError> {
        Ok(self.pose)
    }

    fn wait_until_reached(
        &mut self,
        target: &Pose,
        threshold_mm: f64,
        _timeout: std::time::Duration,
    ) -> std::result::Result<bool, BoxError> {
        Ok(self.pose.distance_to(target) <= threshold_mm)
    }
}

/// Acquisition that replays a script of readings; `None` entries fail with
/// `DetectionFailed`. An exhausted script keeps failing.
#[derive(Debug, Default)]
pub struct ScriptedAcquisition {
    script: VecDeque<Option<Point2>>,
    axis: Axis,
    pub calls: usize,
}

impl ScriptedAcquisition {
    pub fn new(script: impl IntoIterator<Item = Option<Point2>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            axis: Axis::Y,
            calls: 0,
        }
    }

    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axis = axis;
        self
    }
}

impl Acquisition for ScriptedAcquisition {
    fn acquire(
        &mut self,
        _frames: &mut dyn FrameSource,
        _laser: &mut dyn Laser,
    ) -> Result<DetectionResult> {
        self.calls += 1;
        match self.script.pop_front().flatten() {
            Some(p) => Ok(DetectionResult::from_point(p, 1280, 720)),
            None => Err(GaugeError::DetectionFailed { attempts: 1 }.report()),
        }
    }

    fn axis(&self) -> Axis {
        self.axis
    }
}

/// In-memory artifact store; artifacts round-trip through JSON text.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw text under `name`, bypassing serialization.
    pub fn insert_raw(&self, name: &str, text: &str) {
        if let Ok(mut items) = self.items.lock() {
            items.insert(name.to_string(), text.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|i| i.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> eyre::Report {
    GaugeError::Storage("memory store lock poisoned".into()).report()
}

impl CalibrationStore for MemoryStore {
    fn save(&self, name: &str, artifact: &CalibrationArtifact) -> Result<()> {
        let text = serde_json::to_string(artifact)
            .map_err(|e| GaugeError::Storage(e.to_string()).report())?;
        self.items
            .lock()
            .map_err(|_| poisoned())?
            .insert(name.to_string(), text);
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<CalibrationArtifact>> {
        let items = self.items.lock().map_err(|_| poisoned())?;
        items
            .get(name)
            .map(|text| CalibrationArtifact::from_json(text))
            .transpose()
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.items.lock().map_err(|_| poisoned())?.contains_key(name))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.items.lock().map_err(|_| poisoned())?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.items.lock().map_err(|_| poisoned())?.remove(name).is_some())
    }
}
