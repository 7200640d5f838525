//! Transcoder discovery.
//!
//! [`resolve`] picks the ffmpeg command to run, in priority order: the user's
//! override, a bundled binary, then a bare `ffmpeg` left to the OS search
//! path. Resolution never fails; a missing binary surfaces as a spawn error.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Bare transcoder name used for the search-path fallback.
pub const FFMPEG: &str = "ffmpeg";

/// Archive component of a packaged application bundle.
const ARCHIVE_DIR: &str = "app.asar";

/// Sibling directory holding the bundle's extracted (executable) files.
const UNPACKED_DIR: &str = "app.asar.unpacked";

/// Platform executable filename followed by the alternate platform's.
fn executable_names() -> (&'static str, &'static str) {
    if cfg!(windows) {
        ("ffmpeg.exe", "ffmpeg")
    } else {
        ("ffmpeg", "ffmpeg.exe")
    }
}

/// The transcoder command chosen for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResolvedExecutable {
    /// A binary that existed on disk at resolution time.
    Path(PathBuf),
    /// A bare command name resolved by the OS at spawn time.
    SearchPath(String),
}

impl ResolvedExecutable {
    /// The search-path fallback for ffmpeg.
    pub fn fallback() -> Self {
        Self::SearchPath(FFMPEG.to_string())
    }

    /// The program to hand to the process builder.
    pub fn program(&self) -> &OsStr {
        match self {
            Self::Path(p) => p.as_os_str(),
            Self::SearchPath(name) => OsStr::new(name),
        }
    }

    /// Short tool name for log and error messages.
    pub fn tool_name(&self) -> String {
        match self {
            Self::Path(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.to_string_lossy().into_owned()),
            Self::SearchPath(name) => name.clone(),
        }
    }

    /// Locate the binary on disk, consulting `PATH` for the fallback.
    pub fn locate(&self) -> Option<PathBuf> {
        match self {
            Self::Path(p) => p.exists().then(|| p.clone()),
            Self::SearchPath(name) => which::which(name).ok(),
        }
    }

    pub fn is_search_path(&self) -> bool {
        matches!(self, Self::SearchPath(_))
    }
}

impl fmt::Display for ResolvedExecutable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::SearchPath(name) => write!(f, "{name} (PATH)"),
        }
    }
}

/// A bundled ffmpeg candidate and the resources root it may be unpacked into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledCandidate {
    pub path: PathBuf,
    pub resources_dir: Option<PathBuf>,
}

impl BundledCandidate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            resources_dir: None,
        }
    }

    pub fn with_resources_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.resources_dir = dir;
        self
    }

    /// The ffmpeg binary shipped next to the running executable.
    pub fn beside_current_exe() -> Option<Self> {
        let exe = std::env::current_exe().ok()?;
        let dir = exe.parent()?;
        Some(Self::new(dir.join(executable_names().0)))
    }
}

/// Pick the transcoder command for one invocation.
pub fn resolve(
    user_override: Option<&Path>,
    bundled: Option<&BundledCandidate>,
) -> ResolvedExecutable {
    if let Some(path) = user_override.and_then(normalize_override) {
        tracing::debug!("Using user-supplied ffmpeg: {}", path.display());
        return ResolvedExecutable::Path(path);
    }

    if let Some(path) = bundled.and_then(resolve_bundled) {
        tracing::debug!("Using bundled ffmpeg: {}", path.display());
        return ResolvedExecutable::Path(path);
    }

    tracing::debug!("Falling back to {FFMPEG} on PATH");
    ResolvedExecutable::fallback()
}

/// Accept an override naming either the binary or a directory holding it.
fn normalize_override(raw: &Path) -> Option<PathBuf> {
    let path = match raw.to_str() {
        Some(s) => PathBuf::from(s.trim()),
        None => raw.to_path_buf(),
    };
    if path.as_os_str().is_empty() {
        return None;
    }

    let (primary, alternate) = executable_names();
    let names_binary = path
        .file_name()
        .map(|n| {
            let n = n.to_string_lossy().to_ascii_lowercase();
            n == primary || n == alternate
        })
        .unwrap_or(false);

    if names_binary {
        return path.exists().then_some(path);
    }

    [path.join(primary), path.join(alternate)]
        .into_iter()
        .find(|candidate| candidate.exists())
}

/// Check the unpacked locations of an archived bundle before the raw path.
fn resolve_bundled(candidate: &BundledCandidate) -> Option<PathBuf> {
    let raw = &candidate.path;
    if raw.as_os_str().is_empty() {
        return None;
    }

    let components: Vec<Component<'_>> = raw.components().collect();
    let archive_at = components
        .iter()
        .position(|c| c.as_os_str() == OsStr::new(ARCHIVE_DIR));

    let mut candidates = Vec::with_capacity(3);
    if let Some(idx) = archive_at {
        let prefix: PathBuf = components[..idx].iter().collect();
        let sub_path: PathBuf = components[idx + 1..].iter().collect();

        candidates.push(prefix.join(UNPACKED_DIR).join(&sub_path));
        if let Some(ref resources) = candidate.resources_dir {
            if !sub_path.as_os_str().is_empty() {
                candidates.push(resources.join(UNPACKED_DIR).join(&sub_path));
            }
        }
    }
    candidates.push(raw.clone());

    candidates.into_iter().find(|p| p.exists())
}

/// Availability information for the resolved transcoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// The command that would be spawned.
    pub command: ResolvedExecutable,
    /// Whether the binary could be located.
    pub available: bool,
    /// First line of `-version` output, if it ran.
    pub version: Option<String>,
    /// Resolved on-disk location.
    pub path: Option<PathBuf>,
}

/// Locate the resolved transcoder and query its version.
pub fn check(command: &ResolvedExecutable) -> ToolInfo {
    let path = command.locate();
    let version = path.as_deref().and_then(detect_version);

    ToolInfo {
        command: command.clone(),
        available: path.is_some(),
        version,
        path,
    }
}

/// Run `<ffmpeg> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
