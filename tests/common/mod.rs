//! Shared test utilities for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

/// Stand-in transcoder. Inputs containing `bad` fail with a diagnostic,
/// inputs containing `slow` never finish, everything else reports two
/// progress lines and writes the playlist.
const FAKE_FFMPEG: &str = r##"#!/bin/sh
input="$2"
for last; do :; done
case "$input" in
  *bad*)
    echo "$input: Invalid data found when processing input" >&2
    exit 1
    ;;
  *slow*)
    exec sleep 30
    ;;
esac
echo "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from '$input':" >&2
printf 'frame=   24 fps=0.0 q=-1.0 size=N/A time=00:00:01.00 bitrate=N/A\rframe=   48 fps=0.0 q=-1.0 size=N/A time=00:00:02.00 bitrate=N/A\n' >&2
echo "#EXTM3U" > "$last"
exit 0
"##;

/// Path to an executable named `ffmpeg` running [`FAKE_FFMPEG`].
///
/// Written once per test binary.
#[cfg(unix)]
pub fn fake_ffmpeg() -> &'static Path {
    static BIN: OnceLock<(TempDir, PathBuf)> = OnceLock::new();

    let (_, path) = BIN.get_or_init(|| {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ffmpeg");
        std::fs::write(&path, FAKE_FFMPEG).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        (dir, path)
    });
    path
}

/// Create empty placeholder media files under `dir`.
pub fn touch_media(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, b"").unwrap();
            path
        })
        .collect()
}
