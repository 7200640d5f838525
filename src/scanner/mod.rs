//! Bulk input discovery.
//!
//! Expands the inputs of a bulk conversion into an ordered list of files:
//! explicit files are kept as given, directories are walked for media files.

use rapidhls_core::media::is_media_file;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Expand `inputs` in order. Each directory contributes its media files
/// (recursively, sorted by path); anything else is passed through untouched.
pub fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let found = scan_directory(input);
            debug!("Found {} media files in {:?}", found.len(), input);
            files.extend(found);
        } else {
            if !input.exists() {
                warn!("Input does not exist: {:?}", input);
            }
            files.push(input.clone());
        }
    }

    files
}

/// Media files under `dir`, sorted by path.
pub fn scan_directory(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_media_file(p))
        .collect()
}
