//! Application configuration types.
//!
//! The top-level [`Config`] carries the settings the conversion engine reads
//! but does not own: the user's transcoder override, the default output
//! location, and the default encoding options. Every section defaults
//! sensibly so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::media::{ConversionOptions, Quality, DEFAULT_SEGMENT_DURATION};
use crate::Error;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub output: OutputConfig,
    pub conversion: ConversionConfig,
}

impl Config {
    /// Check values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let duration = self.conversion.segment_duration.trim();
        match duration.parse::<u32>() {
            Ok(secs) if secs > 0 => {}
            _ => {
                return Err(Error::config(format!(
                    "conversion.segment_duration must be a positive whole number of seconds, got '{duration}'"
                )))
            }
        }

        if self.conversion.timeout_secs == Some(0) {
            return Err(Error::config("conversion.timeout_secs must be greater than 0"));
        }

        if let Some(ref path) = self.tools.ffmpeg_path {
            if !path.as_os_str().is_empty() && !path.exists() {
                tracing::warn!(
                    "Configured ffmpeg path does not exist: {}; falling back",
                    path.display()
                );
            }
        }

        Ok(())
    }
}

/// Transcoder location settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// User override: the ffmpeg binary itself or the directory holding it.
    pub ffmpeg_path: Option<PathBuf>,
    /// Bundled ffmpeg shipped with the application.
    pub bundled_ffmpeg: Option<PathBuf>,
    /// Application resources root, searched for archive-unpacked binaries.
    pub resources_dir: Option<PathBuf>,
}

/// Output location settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Base directory used by the `default` output mode.
    pub default_path: Option<PathBuf>,
}

/// Default encoding options and supervision limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub segment_duration: String,
    pub quality: Quality,
    pub audio_only: bool,
    /// Kill a transcoder running longer than this many seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            segment_duration: DEFAULT_SEGMENT_DURATION.to_string(),
            quality: Quality::Medium,
            audio_only: false,
            timeout_secs: None,
        }
    }
}

impl ConversionConfig {
    pub fn options(&self) -> ConversionOptions {
        ConversionOptions {
            segment_duration: self.segment_duration.clone(),
            quality: self.quality,
            audio_only: self.audio_only,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
