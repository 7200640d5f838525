//! Sequential bulk conversion.
//!
//! Files are converted strictly one at a time in input order. A failed file
//! is recorded and the batch moves on; only cancellation stops it early.

use std::path::{Path, PathBuf};

use rapidhls_core::media::derive_output_name;
use rapidhls_core::{ConversionOutcome, ProgressMeter};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::engine::{relay, ConversionEvent, Engine, SharedOptions};

/// Outcome of one file in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    /// 1-based position in the batch.
    pub position: usize,
    pub input: PathBuf,
    pub outcome: ConversionOutcome,
}

/// Aggregate state of a bulk conversion, owned by the caller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchState {
    pub total: usize,
    pub succeeded: usize,
    /// The file currently being converted; `None` once finished.
    pub current_file: Option<PathBuf>,
    /// Every log line emitted during the batch, in order.
    pub logs: Vec<String>,
    pub results: Vec<FileResult>,
    /// Coarse progress percentage.
    pub progress: u8,
    /// Output directory of the most recent successful file.
    pub last_output_dir: Option<PathBuf>,
    pub cancelled: bool,
    pub finished: bool,
}

impl BatchState {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded
    }

    /// True when at least one file was attempted and none succeeded.
    pub fn all_failed(&self) -> bool {
        self.attempted() > 0 && self.succeeded == 0
    }

    fn record(&mut self, on_event: &mut impl FnMut(ConversionEvent), event: ConversionEvent) {
        match &event {
            ConversionEvent::Log { line } => self.logs.push(line.clone()),
            ConversionEvent::Progress { percent, .. } => self.progress = *percent,
        }
        on_event(event);
    }

    fn log(&mut self, on_event: &mut impl FnMut(ConversionEvent), line: String) {
        self.record(on_event, ConversionEvent::Log { line });
    }
}

/// Convert `files` one after another with the same options.
///
/// Every file is attempted unless `cancel` fires; per-file failures never
/// abort the batch. Events for file *i* are fully delivered, including its
/// result line, before file *i + 1* starts.
pub async fn run_batch(
    engine: &Engine,
    files: &[PathBuf],
    shared: &SharedOptions,
    cancel: CancellationToken,
    mut on_event: impl FnMut(ConversionEvent),
) -> BatchState {
    let total = files.len();
    let mut state = BatchState::new(total);
    let mut meter = ProgressMeter::new();

    tracing::info!("Starting batch conversion of {total} files");

    for (index, input) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            state.cancelled = true;
            break;
        }

        let position = index + 1;
        state.current_file = Some(input.clone());
        state.log(
            &mut on_event,
            format!(
                "=== Processing file {position}/{total}: {} ===",
                display_name(input)
            ),
        );

        let request = engine.request_for(input, &derive_output_name(input, index), shared);
        let outcome = engine
            .run(&request, cancel.clone(), |event| {
                relay(event, &mut meter, &mut |e: ConversionEvent| {
                    state.record(&mut on_event, e)
                })
            })
            .await;

        match &outcome {
            ConversionOutcome::Success { output_dir } => {
                state.succeeded += 1;
                state.last_output_dir = Some(output_dir.clone());
                state.record(
                    &mut on_event,
                    ConversionEvent::Progress {
                        file: input.clone(),
                        elapsed: None,
                        percent: meter.batch_file_done(position, total),
                    },
                );
                state.log(
                    &mut on_event,
                    format!("✓ File {position} completed: {}", output_dir.display()),
                );
            }
            ConversionOutcome::Failure { message } => {
                tracing::warn!(input = %input.display(), "Batch file {position} failed: {message}");
                state.log(
                    &mut on_event,
                    format!("✗ File {position} failed: {}: {message}", display_name(input)),
                );
            }
        }

        state.results.push(FileResult {
            position,
            input: input.clone(),
            outcome,
        });

        if cancel.is_cancelled() {
            state.cancelled = true;
            break;
        }
    }

    state.current_file = None;
    state.finished = true;

    let summary = if state.cancelled {
        format!(
            "✗ Batch conversion cancelled! {}/{} files processed successfully.",
            state.succeeded, total
        )
    } else {
        format!(
            "✓ Batch conversion completed! {}/{} files processed successfully.",
            state.succeeded, total
        )
    };
    state.log(&mut on_event, summary);

    tracing::info!(
        succeeded = state.succeeded,
        failed = state.failed(),
        cancelled = state.cancelled,
        "Batch conversion finished"
    );

    state
}

fn display_name(input: &Path) -> String {
    input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string())
}
