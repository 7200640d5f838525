//! # rapidhls-av
//!
//! ffmpeg-facing building blocks for the rapidhls conversion engine.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`resolve`], [`check`]) -- pick the ffmpeg binary
//!   from a user override, a bundled copy, or the search path.
//! - **Output allocation** ([`OutputAllocation`]) -- create a fresh,
//!   collision-free output directory per conversion.
//! - **Argument building** ([`build_hls_args`]) -- the exact HLS argument
//!   vector for video or audio-only conversions.
//! - **Process supervision** ([`TranscodeCommand`]) -- spawn ffmpeg, stream
//!   its diagnostics as progress events, and report one terminal outcome.

pub mod actions;
pub mod command;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use actions::{build_hls_args, HlsInvocation};
pub use command::{TranscodeCommand, TranscodeRun, CANCELLED_MESSAGE};
pub use tools::{check, resolve, BundledCandidate, ResolvedExecutable, ToolInfo};
pub use workspace::{allocate_output_dir, OutputAllocation};
