//! Single-file conversion.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use rapidhls_av::{
    build_hls_args, resolve, BundledCandidate, HlsInvocation, OutputAllocation, ResolvedExecutable,
    TranscodeCommand, TranscodeRun,
};
use rapidhls_core::media::resolve_output_base;
use rapidhls_core::{
    ConversionOptions, ConversionOutcome, ConversionRequest, ElapsedTime, OutputMode,
    ProgressEvent, ProgressMeter, Result,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Something the caller should show while a conversion runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversionEvent {
    /// A log line, rendered verbatim.
    Log { line: String },
    /// The coarse progress percentage changed.
    Progress {
        file: PathBuf,
        elapsed: Option<ElapsedTime>,
        percent: u8,
    },
}

impl ConversionEvent {
    pub fn log(line: impl Into<String>) -> Self {
        Self::Log { line: line.into() }
    }
}

/// Options shared by every file of a conversion.
#[derive(Debug, Clone, Default)]
pub struct SharedOptions {
    pub options: ConversionOptions,
    pub output_mode: OutputMode,
    /// Base directory for [`OutputMode::Custom`].
    pub custom_path: Option<PathBuf>,
    /// Per-run transcoder override; takes precedence over the configured one.
    pub ffmpeg_override: Option<PathBuf>,
}

/// What a conversion would do, computed without touching the filesystem.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub executable: ResolvedExecutable,
    /// Directory the output would be allocated at if no collision occurs.
    pub output_dir: PathBuf,
    pub invocation: HlsInvocation,
}

/// Runs conversions with the settings of one [`Config`].
///
/// Holds no state between invocations; every call resolves the transcoder
/// and allocates its output directory afresh.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Config,
    bundled: Option<BundledCandidate>,
    timeout: Option<Duration>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let resources = config.tools.resources_dir.clone();
        let bundled = match config.tools.bundled_ffmpeg {
            Some(ref path) => Some(BundledCandidate::new(path)),
            None => BundledCandidate::beside_current_exe(),
        }
        .map(|c| c.with_resources_dir(resources));

        Self {
            timeout: config.conversion.timeout(),
            bundled,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build a request for `input` named `name`, placing its output per
    /// `shared.output_mode`.
    pub fn request_for(&self, input: &Path, name: &str, shared: &SharedOptions) -> ConversionRequest {
        let base = resolve_output_base(
            input,
            shared.output_mode,
            self.config.output.default_path.as_deref(),
            shared.custom_path.as_deref(),
        );

        ConversionRequest::new(input, base)
            .with_output_name(name)
            .with_output_mode(shared.output_mode)
            .with_options(shared.options.clone())
            .with_ffmpeg_override(shared.ffmpeg_override.clone())
    }

    /// The transcoder to run given a per-run override, which takes
    /// precedence over the configured one.
    pub fn resolve_executable(&self, user_override: Option<&Path>) -> ResolvedExecutable {
        let user_override = user_override.or(self.config.tools.ffmpeg_path.as_deref());
        resolve(user_override, self.bundled.as_ref())
    }

    /// Describe the invocation for `request` without allocating or spawning.
    pub fn plan(&self, request: &ConversionRequest) -> Plan {
        let output_dir = request.output_base.join(request.output_name.trim());
        Plan {
            executable: self.resolve_executable(request.ffmpeg_override.as_deref()),
            invocation: build_hls_args(request, &output_dir),
            output_dir,
        }
    }

    /// Allocate the output directory and spawn the transcoder.
    ///
    /// Fails only when the output directory cannot be created; nothing has
    /// been spawned in that case.
    pub fn start(&self, request: &ConversionRequest, cancel: CancellationToken) -> Result<TranscodeRun> {
        let executable = self.resolve_executable(request.ffmpeg_override.as_deref());
        let allocation = OutputAllocation::allocate(&request.output_base, &request.output_name)?;
        let invocation = build_hls_args(request, allocation.dir());

        tracing::info!(
            input = %request.input.display(),
            output = %allocation.dir().display(),
            quality = %request.options.quality,
            audio_only = request.options.audio_only,
            "Starting HLS conversion"
        );

        let mut cmd = TranscodeCommand::new(executable);
        cmd.args(invocation.args)
            .source(&request.input)
            .output_dir(allocation.into_dir())
            .timeout(self.timeout);

        Ok(cmd.spawn(cancel))
    }

    /// Run one conversion, forwarding raw transcoder events in order.
    pub async fn run(
        &self,
        request: &ConversionRequest,
        cancel: CancellationToken,
        mut on_event: impl FnMut(ProgressEvent),
    ) -> ConversionOutcome {
        let mut run = match self.start(request, cancel) {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(input = %request.input.display(), "Conversion not started: {e}");
                return ConversionOutcome::from(e);
            }
        };

        while let Some(event) = run.next().await {
            on_event(event);
        }
        run.outcome().await
    }

    /// Convert a single file, reporting log lines and coarse progress.
    pub async fn convert(
        &self,
        request: &ConversionRequest,
        cancel: CancellationToken,
        mut on_event: impl FnMut(ConversionEvent),
    ) -> ConversionOutcome {
        let mut meter = ProgressMeter::new();
        let outcome = self
            .run(request, cancel, |event| relay(event, &mut meter, &mut on_event))
            .await;

        match &outcome {
            ConversionOutcome::Success { output_dir } => {
                on_event(ConversionEvent::Progress {
                    file: request.input.clone(),
                    elapsed: None,
                    percent: meter.complete(),
                });
                on_event(ConversionEvent::log("✓ Conversion completed successfully!"));
                on_event(ConversionEvent::log(format!(
                    "✓ Output saved to: {}",
                    output_dir.display()
                )));
            }
            ConversionOutcome::Failure { message } => {
                on_event(ConversionEvent::log(format!(
                    "✗ Conversion failed: {}: {message}",
                    request.input.display()
                )));
            }
        }

        outcome
    }
}

/// Forward a transcoder event as a log line, plus a progress step when it
/// carried a time marker.
pub(crate) fn relay(
    event: ProgressEvent,
    meter: &mut ProgressMeter,
    sink: &mut impl FnMut(ConversionEvent),
) {
    let ProgressEvent {
        file,
        line,
        elapsed,
    } = event;

    sink(ConversionEvent::Log { line });
    if elapsed.is_some() {
        sink(ConversionEvent::Progress {
            file,
            elapsed,
            percent: meter.observe(),
        });
    }
}
