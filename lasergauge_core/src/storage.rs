//! Persistence of calibration artifacts.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::atomic::write_atomic;
use crate::error::{GaugeError, Result};
use crate::model::{CalibrationArtifact, CalibrationModel};

/// Named artifact storage. `load` returns `Ok(None)` for a missing artifact
/// and `MalformedCalibrationArtifact` for one that cannot be parsed.
pub trait CalibrationStore {
    fn save(&self, name: &str, artifact: &CalibrationArtifact) -> Result<()>;
    fn load(&self, name: &str) -> Result<Option<CalibrationArtifact>>;
    fn exists(&self, name: &str) -> Result<bool>;
    fn list(&self) -> Result<Vec<String>>;
    fn delete(&self, name: &str) -> Result<bool>;
}

/// Load and validate a model; a missing artifact is `ModelNotLoaded`.
pub fn load_model(store: &dyn CalibrationStore, name: &str) -> Result<CalibrationModel> {
    let artifact = store
        .load(name)?
        .ok_or_else(|| GaugeError::ModelNotLoaded.report())?;
    CalibrationModel::try_from(artifact)
}

fn storage_err(context: &str, e: impl std::fmt::Display) -> eyre::Report {
    GaugeError::Storage(format!("{context}: {e}")).report()
}

/// One JSON file per artifact inside `dir`. Saves are atomic.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let mut comps = Path::new(name).components();
        match (comps.next(), comps.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.dir.join(name)),
            _ => Err(storage_err("invalid artifact name", name)),
        }
    }
}

impl CalibrationStore for JsonFileStore {
    fn save(&self, name: &str, artifact: &CalibrationArtifact) -> Result<()> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir).map_err(|e| storage_err("create store directory", e))?;
        let text = artifact.to_json()?;
        write_atomic(&path, text.as_bytes()).map_err(|e| storage_err("write artifact", e))?;
        tracing::info!(path = %path.display(), "calibration artifact saved");
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<CalibrationArtifact>> {
        let path = self.path_for(name)?;
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no calibration artifact");
                return Ok(None);
            }
            Err(e) => return Err(storage_err("read artifact", e)),
        };
        CalibrationArtifact::from_json(&text).map(Some)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.path_for(name)?.is_file())
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_err("list store directory", e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| storage_err("list store directory", e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !name.ends_with(".json") {
                continue;
            }
            if entry.path().is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "calibration artifact deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_err("delete artifact", e)),
        }
    }
}
