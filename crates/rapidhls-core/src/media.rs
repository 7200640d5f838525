//! Conversion request types: quality tiers, output-location modes, and the
//! per-file [`ConversionRequest`].
//!
//! Enums serialize in lowercase/kebab-case and implement `Display` manually
//! for consistent string representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Video container/file extensions recognised as convertible input.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "3gp",
];

/// Audio file extensions recognised as convertible input.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "m4a", "ogg", "wma", "opus"];

/// Output base name used when a single-file caller supplies none.
pub const DEFAULT_OUTPUT_NAME: &str = "output";

/// Default segment duration, in seconds, as the user would type it.
pub const DEFAULT_SEGMENT_DURATION: &str = "10";

/// Whether `path` has one of the recognised media extensions.
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&e.as_str()) || AUDIO_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Quality
// ---------------------------------------------------------------------------

/// Named quality preset mapping to a fixed target bitrate.
///
/// Tiers are matched exactly (`low`, `medium`, `high`); any other string,
/// including a differently cased one, becomes [`Quality::Medium`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl Quality {
    /// Parse a tier name, falling back to `Medium` for anything unrecognised.
    pub fn from_tier(tier: &str) -> Self {
        match tier {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }

    /// Target audio bitrate for audio-only output.
    pub fn audio_bitrate(self) -> &'static str {
        match self {
            Self::Low => "64k",
            Self::Medium => "128k",
            Self::High => "320k",
        }
    }

    /// Target video bitrate for video output.
    pub fn video_bitrate(self) -> &'static str {
        match self {
            Self::Low => "500k",
            Self::Medium => "1500k",
            Self::High => "3000k",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Quality {
    fn from(tier: &str) -> Self {
        Self::from_tier(tier)
    }
}

impl From<String> for Quality {
    fn from(tier: String) -> Self {
        Self::from_tier(&tier)
    }
}

impl From<Quality> for String {
    fn from(q: Quality) -> Self {
        q.as_str().to_string()
    }
}

impl FromStr for Quality {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_tier(s))
    }
}

// ---------------------------------------------------------------------------
// OutputMode
// ---------------------------------------------------------------------------

/// Where a conversion's output directory is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// The user-configured default output path.
    #[default]
    Default,
    /// The directory containing the input file.
    SameAsInput,
    /// A caller-supplied custom path.
    Custom,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::SameAsInput => write!(f, "same-as-input"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "same-as-input" | "sameAsInput" => Ok(Self::SameAsInput),
            "custom" => Ok(Self::Custom),
            other => Err(format!(
                "unknown output mode '{other}' (expected default, same-as-input or custom)"
            )),
        }
    }
}

/// Directory containing `input`, or `.` when the path has no parent component.
pub fn input_directory(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Resolve the base directory an output directory is allocated under.
///
/// An empty or missing path after mode resolution falls back to the input
/// file's own directory.
pub fn resolve_output_base(
    input: &Path,
    mode: OutputMode,
    default_path: Option<&Path>,
    custom_path: Option<&Path>,
) -> PathBuf {
    let chosen = match mode {
        OutputMode::Default => default_path.map(Path::to_path_buf),
        OutputMode::SameAsInput => Some(input_directory(input)),
        OutputMode::Custom => custom_path.map(Path::to_path_buf),
    };

    match chosen {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => input_directory(input),
    }
}

/// Derive an output base name from an input file: its file name with the
/// last extension stripped, or `file_<index>` when that leaves nothing.
pub fn derive_output_name(input: &Path, index: usize) -> String {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stem = match file_name.rfind('.') {
        Some(pos) if pos + 1 < file_name.len() => &file_name[..pos],
        _ => file_name.as_str(),
    };

    if stem.is_empty() {
        format!("file_{index}")
    } else {
        stem.to_string()
    }
}

// ---------------------------------------------------------------------------
// ConversionOptions / ConversionRequest
// ---------------------------------------------------------------------------

/// Encoding options shared by every file of a conversion (or batch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Segment duration in seconds, passed to the transcoder verbatim.
    pub segment_duration: String,
    pub quality: Quality,
    /// Drop video and emit an audio-only stream.
    pub audio_only: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            segment_duration: DEFAULT_SEGMENT_DURATION.to_string(),
            quality: Quality::Medium,
            audio_only: false,
        }
    }
}

/// One unit of work: a single input file converted into one HLS output
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub input: PathBuf,
    /// Desired output directory name; collisions get a numeric suffix.
    pub output_name: String,
    /// Directory the output directory is created under.
    pub output_base: PathBuf,
    /// The mode `output_base` was resolved from.
    pub output_mode: OutputMode,
    pub options: ConversionOptions,
    /// User-supplied transcoder location (binary or containing directory).
    pub ffmpeg_override: Option<PathBuf>,
}

impl ConversionRequest {
    /// Create a request writing `<output_base>/output` with default options.
    pub fn new(input: impl Into<PathBuf>, output_base: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            output_base: output_base.into(),
            output_mode: OutputMode::Custom,
            options: ConversionOptions::default(),
            ffmpeg_override: None,
        }
    }

    /// Set the output name; an empty name keeps [`DEFAULT_OUTPUT_NAME`].
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.output_name = name;
        }
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_ffmpeg_override(mut self, path: Option<PathBuf>) -> Self {
        self.ffmpeg_override = path.filter(|p| !p.as_os_str().is_empty());
        self
    }
}
