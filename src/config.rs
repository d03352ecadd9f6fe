//! Transcoder configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::blur::MAX_BLUR_REGIONS;
use crate::domain::Dimensions;
use crate::error::Result;

pub const ENV_FFMPEG_PATH: &str = "TIMELAPSO_FFMPEG_PATH";
pub const ENV_CONFIG_PATH: &str = "TIMELAPSO_CONFIG";
pub const ENV_LOG: &str = "TIMELAPSO_LOG";
/// Filter used when neither `TIMELAPSO_LOG` nor the config sets one
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    /// Explicit encoder binary; takes priority over discovery
    pub ffmpeg_path: Option<PathBuf>,
    /// Frame count treated as "done" when estimating progress
    pub assumed_total_frames: u64,
    /// Minimum spacing between progress events
    pub progress_interval_ms: u64,
    pub max_blur_regions: usize,
    /// Used when dimensions are neither supplied nor probed
    pub fallback_width: u32,
    pub fallback_height: u32,
    pub min_threads: usize,
    /// Encoder stderr lines kept for failure reports
    pub stderr_tail_lines: usize,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "timelapso=debug,warn"
    pub level: Option<String>,
    pub json: bool,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            assumed_total_frames: 1000,
            progress_interval_ms: 1000,
            max_blur_regions: MAX_BLUR_REGIONS,
            fallback_width: Dimensions::FALLBACK.width,
            fallback_height: Dimensions::FALLBACK.height,
            min_threads: 4,
            stderr_tail_lines: 20,
            logging: LoggingConfig::default(),
        }
    }
}

impl LoggingConfig {
    pub fn level_or_default(&self) -> &str {
        self.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

impl TranscoderConfig {
    /// Load from `TIMELAPSO_CONFIG` if set, then apply `TIMELAPSO_FFMPEG_PATH`.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(ENV_CONFIG_PATH) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(path) = std::env::var_os(ENV_FFMPEG_PATH) {
            config.ffmpeg_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn fallback_dimensions(&self) -> Dimensions {
        Dimensions::new(self.fallback_width, self.fallback_height)
    }
}
