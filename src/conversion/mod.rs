//! Media conversion module.
//!
//! Turns input files into HLS output directories by driving ffmpeg:
//!
//! - Single-file conversion with log and coarse progress reporting
//! - Sequential bulk conversion that tolerates per-file failures
//! - Dry-run planning of the exact ffmpeg invocation

mod batch;
mod engine;

pub use batch::{run_batch, BatchState, FileResult};
pub use engine::{ConversionEvent, Engine, Plan, SharedOptions};
