//! HLS (MPEG-TS segments) argument building.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use rapidhls_core::ConversionRequest;
use serde::{Serialize, Serializer};

use crate::workspace::OutputAllocation;

/// Audio codec used for audio-only output.
const AUDIO_CODEC: &str = "aac";

/// H.264 profile and level chosen for the widest HLS client support.
const VIDEO_PROFILE: &str = "baseline";
const VIDEO_LEVEL: &str = "3.0";

/// Arguments for one ffmpeg run and the files it will write.
///
/// Paths are kept as OS strings so they reach the process byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HlsInvocation {
    #[serde(serialize_with = "lossy_args")]
    pub args: Vec<OsString>,
    pub manifest_path: PathBuf,
    pub segment_pattern: PathBuf,
}

impl HlsInvocation {
    /// The arguments as printable text, for dry runs and logs.
    pub fn display_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

fn lossy_args<S: Serializer>(args: &[OsString], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(args.iter().map(|a| a.to_string_lossy()))
}

/// Build the ffmpeg argument vector converting `request.input` into a VOD
/// playlist plus numbered segments inside `output_dir`.
///
/// Produces:
/// - `<output_dir>/playlist.m3u8`: playlist listing every segment
/// - `<output_dir>/segment000.ts`, `segment001.ts`, ...: media segments
///
/// The segment duration is passed through exactly as given.
pub fn build_hls_args(request: &ConversionRequest, output_dir: &Path) -> HlsInvocation {
    let layout = OutputAllocation::layout(output_dir.to_path_buf());
    let manifest_path = layout.manifest_path().to_path_buf();
    let segment_pattern = layout.segment_pattern().to_path_buf();
    let opts = &request.options;

    let flags = |items: &[&'static str]| -> Vec<&'static OsStr> {
        items.iter().map(|s| OsStr::new(*s)).collect()
    };

    let mut args: Vec<&OsStr> = vec![OsStr::new("-i"), request.input.as_os_str()];

    if opts.audio_only {
        // Strip video entirely.
        args.extend(flags(&["-vn", "-c:a", AUDIO_CODEC, "-b:a", opts.quality.audio_bitrate()]));
    } else {
        args.extend(flags(&["-profile:v", VIDEO_PROFILE, "-level", VIDEO_LEVEL]));
    }

    // Number from zero and keep every segment in the playlist (VOD).
    args.extend(flags(&["-start_number", "0", "-hls_time"]));
    args.push(OsStr::new(opts.segment_duration.as_str()));
    args.extend(flags(&["-hls_list_size", "0"]));

    if !opts.audio_only {
        args.extend(flags(&["-b:v", opts.quality.video_bitrate()]));
    }

    args.extend(flags(&["-f", "hls", "-hls_segment_filename"]));
    args.push(segment_pattern.as_os_str());
    args.push(manifest_path.as_os_str());

    let args = args.into_iter().map(OsStr::to_os_string).collect();

    HlsInvocation {
        args,
        manifest_path,
        segment_pattern,
    }
}
