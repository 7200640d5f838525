//! Output directory allocation.
//!
//! Every conversion writes into a directory of its own. [`OutputAllocation`]
//! creates that directory under a base path, adding `-1`, `-2`, … to the
//! desired name until it finds one that does not exist yet.

use std::io;
use std::path::{Path, PathBuf};

use rapidhls_core::{Error, Result};

/// Playlist written inside every output directory.
pub const MANIFEST_FILE: &str = "playlist.m3u8";

/// Segment filename template; `%03d` is the zero-based segment number.
pub const SEGMENT_TEMPLATE: &str = "segment%03d.ts";

/// A freshly created output directory and the HLS files laid out inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputAllocation {
    dir: PathBuf,
    manifest: PathBuf,
    segment_pattern: PathBuf,
}

impl OutputAllocation {
    /// Create a new, previously nonexistent directory for `desired_name`
    /// under `base`.
    pub fn allocate(base: &Path, desired_name: &str) -> Result<Self> {
        let dir = allocate_output_dir(base, desired_name)?;
        Ok(Self::layout(dir))
    }

    /// Describe the HLS layout of `dir` without touching the filesystem.
    pub fn layout(dir: PathBuf) -> Self {
        Self {
            manifest: dir.join(MANIFEST_FILE),
            segment_pattern: dir.join(SEGMENT_TEMPLATE),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest
    }

    pub fn segment_pattern(&self) -> &Path {
        &self.segment_pattern
    }

    pub fn into_dir(self) -> PathBuf {
        self.dir
    }
}

/// Create `base/desired_name`, or the first free `base/desired_name-N`.
///
/// Missing parents are created. The final directory is created with a
/// non-recursive `create_dir`, so a name claimed concurrently is skipped
/// rather than shared.
pub fn allocate_output_dir(base: &Path, desired_name: &str) -> Result<PathBuf> {
    let name = desired_name.trim();
    if name.is_empty() {
        return Err(Error::validation("output name is empty"));
    }

    let mut counter: u64 = 0;
    loop {
        let candidate = if counter == 0 {
            base.join(name)
        } else {
            base.join(format!("{name}-{counter}"))
        };
        counter += 1;

        // Any existing entry counts, including files and dangling symlinks.
        if candidate.symlink_metadata().is_ok() {
            continue;
        }

        if let Some(parent) = candidate.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Io {
                    source: io::Error::new(
                        e.kind(),
                        format!("failed to create {}: {e}", parent.display()),
                    ),
                }
            })?;
        }

        match std::fs::create_dir(&candidate) {
            Ok(()) => {
                tracing::debug!("Allocated output directory {}", candidate.display());
                return Ok(candidate);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(Error::Io {
                    source: io::Error::new(
                        e.kind(),
                        format!("failed to create {}: {e}", candidate.display()),
                    ),
                })
            }
        }
    }
}
