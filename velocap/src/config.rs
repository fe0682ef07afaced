//! Capture configuration.
//!
//! Stored as camelCase JSON. Default location:
//! `<config_dir>/velocap/capture.json`, for example
//! `~/.config/velocap/capture.json` on Linux.
//!
//! ```json
//! {
//!   "model": "vlp16",
//!   "maxQueueDepth": 8,
//!   "transform": { "translation": [0, 0, 1500], "rotation": [0, 0, 0, 1] }
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use velocap_core::{Model, RigidTransform};

const CONFIG_FILE: &str = "capture.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn get_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "velocap", "velocap")
}

/// Where the configuration is looked up when no file is given
pub fn default_config_path() -> Option<PathBuf> {
    get_project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Sensor mounting pose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformConfig {
    /// Row-major 4x4 homogeneous matrix, bottom row ignored
    Matrix { matrix: [[f32; 4]; 4] },
    /// Translation `[x, y, z]` and unit quaternion `[x, y, z, w]`
    Pose {
        translation: [f32; 3],
        rotation: [f32; 4],
    },
}

impl TransformConfig {
    pub fn to_transform(&self) -> RigidTransform {
        match self {
            TransformConfig::Matrix { matrix } => RigidTransform::from_rows(matrix),
            TransformConfig::Pose {
                translation,
                rotation,
            } => RigidTransform::from_translation_quaternion(*translation, *rotation),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    pub model: Model,
    /// Unbounded when absent
    pub max_queue_depth: Option<usize>,
    pub backpressure_poll_ms: u64,
    pub retrieve_poll_ms: u64,
    pub transform: Option<TransformConfig>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            model: Model::default(),
            max_queue_depth: None,
            backpressure_poll_ms: 100,
            retrieve_poll_ms: 1,
            transform: None,
        }
    }
}

impl CaptureConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, else the default location if it exists, else
    /// defaults. An explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            Some(_) => Ok(Self::default()),
            None => {
                warn!("No home directory, using default configuration");
                Ok(Self::default())
            }
        }
    }

    pub fn transform(&self) -> Option<RigidTransform> {
        self.transform.as_ref().map(TransformConfig::to_transform)
    }
}
