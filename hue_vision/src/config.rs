// THEORY:
// Runtime configuration. Everything here is optional: a missing file, table or key
// falls back to the defaults below. The color calibration itself is fixed in
// `pipeline::Calibration` and is not configurable.

use crate::core_modules::cluster::{EstimatorSettings, Seeding};
use crate::error::{Result, VisionError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the TOML file to load.
pub const CONFIG_ENV: &str = "HUE_VISION_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VisionConfig {
    pub log_level: String,
    pub capture: CaptureConfig,
    pub display: DisplayConfig,
    pub clustering: ClusteringConfig,
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum CaptureConfig {
    /// A live capture device, by index.
    Camera {
        #[serde(default)]
        device_index: i32,
    },
    /// Still images from a directory, played back in file-name order.
    Frames { directory: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Key code that stops the loop (27 is ESC).
    pub exit_key: i32,
    pub poll_timeout_ms: u64,
    /// Never open a window, even when a windowing backend is compiled in.
    pub headless: bool,
    /// Write every displayed frame here as a PNG (headless display only).
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub clusters: usize,
    /// Side of the centered square sampling window, in pixels.
    pub window_size: u32,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub restarts: usize,
    pub seeding: Seeding,
    /// Fixed RNG seed; leave unset for entropy-seeded (non-reproducible) runs.
    pub seed: Option<u64>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            capture: CaptureConfig::default(),
            display: DisplayConfig::default(),
            clustering: ClusteringConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig::Camera { device_index: 0 }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            exit_key: 27,
            poll_timeout_ms: 5,
            headless: false,
            output_dir: None,
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        let estimator = EstimatorSettings::default();
        Self {
            clusters: 3,
            window_size: 200,
            max_iterations: estimator.max_iterations,
            tolerance: estimator.tolerance,
            restarts: estimator.restarts,
            seeding: estimator.seeding,
            seed: estimator.seed,
        }
    }
}

impl DisplayConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl ClusteringConfig {
    pub fn estimator_settings(&self) -> EstimatorSettings {
        EstimatorSettings {
            seeding: self.seeding,
            seed: self.seed,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            restarts: self.restarts,
        }
    }
}

impl VisionConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: VisionConfig =
            toml::from_str(contents).map_err(|e| VisionError::config("invalid TOML", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| VisionError::config(format!("cannot read {}", path.display()), e))?;
        Self::from_toml_str(&contents)
    }

    /// Loads the file named by `HUE_VISION_CONFIG`, or the defaults when it is unset.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        // Keys are compared on their low byte.
        if !(0..=0xFF).contains(&self.display.exit_key) {
            return Err(VisionError::invalid_parameter(
                "display.exit_key",
                self.display.exit_key,
            ));
        }
        if self.clustering.clusters == 0 {
            return Err(VisionError::invalid_parameter("clustering.clusters", 0));
        }
        if self.clustering.window_size == 0 {
            return Err(VisionError::invalid_parameter("clustering.window_size", 0));
        }
        if self.clustering.tolerance.is_nan() || self.clustering.tolerance < 0.0 {
            return Err(VisionError::invalid_parameter(
                "clustering.tolerance",
                self.clustering.tolerance,
            ));
        }
        Ok(())
    }
}
