//! Observations emitted while a conversion runs, and its terminal outcome.
//!
//! A running conversion produces an ordered, finite sequence of
//! [`ProgressEvent`]s followed by exactly one [`ConversionOutcome`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Percentage points added per progress observation.
pub const PROGRESS_STEP: u8 = 5;

/// Ceiling for the running percentage until the conversion completes.
pub const PROGRESS_CAP: u8 = 95;

fn time_marker() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"time=(\d{2}):(\d{2}):(\d{2})").expect("time marker pattern is valid")
    })
}

// ---------------------------------------------------------------------------
// ElapsedTime
// ---------------------------------------------------------------------------

/// Elapsed media time reported by the transcoder (`time=HH:MM:SS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElapsedTime {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl ElapsedTime {
    /// Find the first `time=HH:MM:SS` marker in `text`.
    pub fn scan(text: &str) -> Option<Self> {
        let caps = time_marker().captures(text)?;
        Some(Self {
            hours: caps[1].parse().ok()?,
            minutes: caps[2].parse().ok()?,
            seconds: caps[3].parse().ok()?,
        })
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(
            u64::from(self.hours) * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds),
        )
    }
}

impl fmt::Display for ElapsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

/// One line of transcoder diagnostics, tagged with the input it belongs to.
///
/// `elapsed` is present when the line carried a progress report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub file: PathBuf,
    pub line: String,
    pub elapsed: Option<ElapsedTime>,
}

impl ProgressEvent {
    /// Wrap a diagnostic line, parsing any progress marker it contains.
    pub fn observe(file: &Path, line: impl Into<String>) -> Self {
        let line = line.into();
        let elapsed = ElapsedTime::scan(&line);
        Self {
            file: file.to_path_buf(),
            line,
            elapsed,
        }
    }

    /// A plain log line that never counts as progress.
    pub fn log(file: &Path, line: impl Into<String>) -> Self {
        Self {
            file: file.to_path_buf(),
            line: line.into(),
            elapsed: None,
        }
    }

    pub fn is_progress(&self) -> bool {
        self.elapsed.is_some()
    }
}

// ---------------------------------------------------------------------------
// ConversionOutcome
// ---------------------------------------------------------------------------

/// Terminal result of one conversion. Produced exactly once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Success { output_dir: PathBuf },
    Failure { message: String },
}

impl ConversionOutcome {
    pub fn success(output_dir: impl Into<PathBuf>) -> Self {
        Self::Success {
            output_dir: output_dir.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn output_dir(&self) -> Option<&Path> {
        match self {
            Self::Success { output_dir } => Some(output_dir),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message } => Some(message),
        }
    }
}

impl From<crate::Error> for ConversionOutcome {
    fn from(err: crate::Error) -> Self {
        Self::failure(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// ProgressMeter
// ---------------------------------------------------------------------------

/// Coarse percentage indicator.
///
/// Each progress observation adds a fixed step regardless of media duration,
/// so the value tracks activity rather than true completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMeter {
    percent: u8,
}

impl ProgressMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Record one progress observation and return the new percentage.
    ///
    /// Never lowers a value above the cap (e.g. after a batch file finished).
    pub fn observe(&mut self) -> u8 {
        if self.percent < PROGRESS_CAP {
            self.percent = (self.percent + PROGRESS_STEP).min(PROGRESS_CAP);
        }
        self.percent
    }

    /// Mark a single conversion complete.
    pub fn complete(&mut self) -> u8 {
        self.percent = 100;
        self.percent
    }

    /// Set the percentage after the batch file at 1-based `position` of
    /// `total` succeeded.
    pub fn batch_file_done(&mut self, position: usize, total: usize) -> u8 {
        if total > 0 {
            let pct = (position as f64 / total as f64 * 100.0).round();
            self.percent = pct.clamp(0.0, 100.0) as u8;
        }
        self.percent
    }
}
