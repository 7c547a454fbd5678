//! Diagnostic records written before each retry wait.

use crate::Result;
use crate::path_utils::sanitize_path_component;
use chrono::{DateTime, Utc};
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Progress of an operation that is waiting out a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub operation_id: String,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

/// One JSON file per checkpoint key.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_path_component(key)))
    }

    /// Write `checkpoint` under `key`, replacing any previous one.
    pub fn save(&self, key: &str, checkpoint: &Checkpoint) -> Result<()> {
        fs::create_dir_all(&self.dir).into_app_err_with(|| format!("unable to create checkpoint directory '{}'", self.dir.display()))?;

        let path = self.path_for(key);
        let file = File::create(&path).into_app_err_with(|| format!("unable to create checkpoint file '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);

        #[cfg(debug_assertions)]
        let result = serde_json::to_writer_pretty(&mut writer, checkpoint);
        #[cfg(not(debug_assertions))]
        let result = serde_json::to_writer(&mut writer, checkpoint);

        result.into_app_err_with(|| format!("unable to write checkpoint file '{}'", path.display()))?;
        writer
            .flush()
            .into_app_err_with(|| format!("unable to flush checkpoint file '{}'", path.display()))?;
        Ok(())
    }

    /// Read the checkpoint stored under `key`, if any.
    pub fn load(&self, key: &str) -> Result<Option<Checkpoint>> {
        let path = self.path_for(key);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).into_app_err_with(|| format!("unable to open checkpoint file '{}'", path.display())),
        };

        let checkpoint = serde_json::from_reader(BufReader::new(file))
            .into_app_err_with(|| format!("unable to parse checkpoint file '{}'", path.display()))?;
        Ok(Some(checkpoint))
    }

    /// Remove the checkpoint stored under `key`. Missing checkpoints are not an error.
    pub fn clear(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).into_app_err_with(|| format!("unable to remove checkpoint file '{}'", path.display())),
        }
    }
}
