//! rapidhls-core: shared request types, progress events, configuration, and
//! the unified error type.
//!
//! This crate is the foundational dependency for the other rapidhls crates.
//! It performs no I/O beyond what configuration validation needs.

pub mod config;
pub mod error;
pub mod events;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use events::{ConversionOutcome, ElapsedTime, ProgressEvent, ProgressMeter};
pub use media::{ConversionOptions, ConversionRequest, OutputMode, Quality};
