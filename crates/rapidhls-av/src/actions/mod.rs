//! Transcoder invocations.
//!
//! Each action turns a request into the exact argument vector handed to
//! ffmpeg. Building arguments is pure; running them is the job of
//! [`crate::command`].

mod hls_segment;

pub use hls_segment::{build_hls_args, HlsInvocation};
