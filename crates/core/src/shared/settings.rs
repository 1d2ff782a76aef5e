use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shared::constants::{
    APP_DIR_NAME, DETECTOR_TIMEOUT_MS, MAX_WORKING_DIMENSION, THUMBNAIL_SIZE,
};

/// User-tunable knobs, stored as JSON next to other per-user config.
///
/// Every field falls back to its default when absent so older files keep
/// loading after new settings are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where `library.json` and the `faces/` crops live.
    pub data_dir: Option<PathBuf>,
    /// External detector executable. Without one no faces are found.
    pub detector_path: Option<PathBuf>,
    pub detector_timeout_ms: u64,
    pub max_working_dimension: u32,
    pub thumbnail_size: u32,
    /// Analysis threads; `None` uses every available core.
    pub workers: Option<usize>,
    /// Explicit ArcFace model; `None` downloads into the model cache.
    pub embedding_model: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            detector_path: None,
            detector_timeout_ms: DETECTOR_TIMEOUT_MS,
            max_working_dimension: MAX_WORKING_DIMENSION,
            thumbnail_size: THUMBNAIL_SIZE,
            workers: None,
            embedding_model: None,
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Loads from the default location, or defaults if missing or unreadable.
    pub fn load() -> Self {
        Self::default_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid settings in {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Configured data dir, else the platform data dir.
    pub fn resolved_data_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR_NAME)))
    }

    pub fn worker_count(&self) -> usize {
        self.workers.filter(|&n| n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}
