//! rapidhls - convert media files to HTTP Live Streaming output
//!
//! This library crate exposes the conversion engine for the CLI and for
//! integration testing.

pub mod config;
pub mod conversion;
pub mod scanner;
