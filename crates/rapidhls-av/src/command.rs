//! Supervised transcoder execution.
//!
//! [`TranscodeCommand`] spawns the transcoder with a discrete argument vector
//! (no shell), streams its stderr as [`ProgressEvent`]s, and resolves to
//! exactly one [`ConversionOutcome`], including when the spawn itself fails.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::BytesMut;
use futures::{Stream, StreamExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::sync::CancellationToken;

use rapidhls_core::{ConversionOutcome, ProgressEvent};

use crate::tools::ResolvedExecutable;

/// Message of the outcome produced when a run is cancelled.
pub const CANCELLED_MESSAGE: &str = "conversion cancelled";

/// A builder for one supervised transcoder invocation.
///
/// # Example
///
/// ```no_run
/// use rapidhls_av::{ResolvedExecutable, TranscodeCommand};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let outcome = TranscodeCommand::new(ResolvedExecutable::fallback())
///     .args(["-i", "/media/movie.mp4", "-f", "hls", "/media/movie/playlist.m3u8"])
///     .source("/media/movie.mp4")
///     .output_dir("/media/movie")
///     .run(CancellationToken::new(), |event| println!("{}", event.line))
///     .await;
/// println!("{outcome:?}");
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TranscodeCommand {
    program: ResolvedExecutable,
    args: Vec<OsString>,
    source: PathBuf,
    output_dir: PathBuf,
    timeout: Option<Duration>,
}

impl TranscodeCommand {
    /// Create a command for the given transcoder.
    pub fn new(program: ResolvedExecutable) -> Self {
        Self {
            program,
            args: Vec::new(),
            source: PathBuf::new(),
            output_dir: PathBuf::new(),
            timeout: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<OsString>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<OsString>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// The input file progress events are attributed to.
    pub fn source(&mut self, input: impl Into<PathBuf>) -> &mut Self {
        self.source = input.into();
        self
    }

    /// The directory reported by a successful outcome.
    pub fn output_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.output_dir = dir.into();
        self
    }

    /// Kill the process if it runs longer than `d`. `None` waits forever.
    pub fn timeout(&mut self, d: Option<Duration>) -> &mut Self {
        self.timeout = d;
        self
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Spawn the transcoder and start supervising it.
    ///
    /// Must be called from within a Tokio runtime. A spawn failure yields a
    /// run whose event stream is already closed and whose outcome is a
    /// `Failure` carrying the OS error.
    pub fn spawn(&self, cancel: CancellationToken) -> TranscodeRun {
        let tool = self.program.tool_name();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut cmd = Command::new(self.program.program());
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("Spawning {}: {:?}", self.program, self.args);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(
                    input = %self.source.display(),
                    "Failed to spawn {}: {e}",
                    self.program
                );
                return TranscodeRun {
                    events: rx,
                    outcome: PendingOutcome::Ready(ConversionOutcome::failure(format!(
                        "failed to spawn {tool}: {e}"
                    ))),
                };
            }
        };

        let task = tokio::spawn(supervise(
            child,
            Supervision {
                tool,
                source: self.source.clone(),
                output_dir: self.output_dir.clone(),
                timeout: self.timeout,
                cancel,
                events: tx,
            },
        ));

        TranscodeRun {
            events: rx,
            outcome: PendingOutcome::Running(task),
        }
    }

    /// Spawn, forward every event to `on_event` in emission order, and
    /// return the terminal outcome.
    pub async fn run(
        &self,
        cancel: CancellationToken,
        mut on_event: impl FnMut(ProgressEvent),
    ) -> ConversionOutcome {
        let mut run = self.spawn(cancel);
        while let Some(event) = run.next().await {
            on_event(event);
        }
        run.outcome().await
    }
}

enum PendingOutcome {
    Ready(ConversionOutcome),
    Running(JoinHandle<ConversionOutcome>),
}

/// A running transcoder: an ordered stream of [`ProgressEvent`]s that ends
/// when the process does, followed by its [`ConversionOutcome`].
pub struct TranscodeRun {
    events: mpsc::UnboundedReceiver<ProgressEvent>,
    outcome: PendingOutcome,
}

impl TranscodeRun {
    /// Wait for the terminal outcome.
    ///
    /// Events not yet consumed are discarded; drain the stream first to see
    /// all of them.
    pub async fn outcome(self) -> ConversionOutcome {
        match self.outcome {
            PendingOutcome::Ready(outcome) => outcome,
            PendingOutcome::Running(task) => match task.await {
                Ok(outcome) => outcome,
                Err(e) => ConversionOutcome::failure(format!(
                    "transcoder supervision stopped unexpectedly: {e}"
                )),
            },
        }
    }
}

impl Stream for TranscodeRun {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

struct Supervision {
    tool: String,
    source: PathBuf,
    output_dir: PathBuf,
    timeout: Option<Duration>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<ProgressEvent>,
}

enum Interrupt {
    Cancelled,
    TimedOut,
}

async fn supervise(mut child: Child, ctx: Supervision) -> ConversionOutcome {
    let Some(stderr) = child.stderr.take() else {
        let _ = child.kill().await;
        return ConversionOutcome::failure(format!("{} stderr was not captured", ctx.tool));
    };

    let mut lines = FramedRead::new(stderr, DiagnosticLines);
    let mut diagnostics = String::new();

    let expiry = expire(ctx.timeout.map(|d| Instant::now() + d));
    tokio::pin!(expiry);

    let interrupted = loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => break Some(Interrupt::Cancelled),
            _ = &mut expiry => break Some(Interrupt::TimedOut),
            line = lines.next() => match line {
                Some(Ok(line)) => {
                    tracing::trace!(target: "rapidhls::ffmpeg", "{line}");
                    diagnostics.push_str(&line);
                    diagnostics.push('\n');
                    // A dropped receiver only means nobody is listening.
                    let _ = ctx.events.send(ProgressEvent::observe(&ctx.source, line));
                }
                Some(Err(e)) => {
                    tracing::warn!("Failed reading {} diagnostics: {e}", ctx.tool);
                    break None;
                }
                None => break None,
            },
        }
    };

    if let Some(why) = interrupted {
        return interrupt(&mut child, &ctx, why).await;
    }

    let status = tokio::select! {
        _ = ctx.cancel.cancelled() => return interrupt(&mut child, &ctx, Interrupt::Cancelled).await,
        _ = &mut expiry => return interrupt(&mut child, &ctx, Interrupt::TimedOut).await,
        status = child.wait() => status,
    };

    match status {
        Ok(status) if status.success() => {
            tracing::info!(
                input = %ctx.source.display(),
                output = %ctx.output_dir.display(),
                "{} finished",
                ctx.tool
            );
            ConversionOutcome::success(ctx.output_dir)
        }
        Ok(status) => {
            let message = if diagnostics.trim().is_empty() {
                describe_exit(&ctx.tool, status)
            } else {
                diagnostics.trim_end().to_string()
            };
            tracing::error!(
                input = %ctx.source.display(),
                %status,
                "{} failed",
                ctx.tool
            );
            let _ = ctx.events.send(ProgressEvent::log(
                &ctx.source,
                format!("[{}] {message}", ctx.tool),
            ));
            ConversionOutcome::failure(message)
        }
        Err(e) => ConversionOutcome::failure(format!("failed waiting for {}: {e}", ctx.tool)),
    }
}

async fn interrupt(child: &mut Child, ctx: &Supervision, why: Interrupt) -> ConversionOutcome {
    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill {}: {e}", ctx.tool);
    }

    let message = match why {
        Interrupt::Cancelled => CANCELLED_MESSAGE.to_string(),
        Interrupt::TimedOut => format!(
            "{} timed out after {:?}",
            ctx.tool,
            ctx.timeout.unwrap_or_default()
        ),
    };
    tracing::warn!(input = %ctx.source.display(), "{message}");
    ConversionOutcome::failure(message)
}

/// Resolve at `deadline`, or never.
async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

fn describe_exit(tool: &str, status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("{tool} exited with code {code}");
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("{tool} terminated by signal {signal}");
        }
    }

    format!("{tool} exited with code unknown")
}

/// Splits transcoder stderr on `\n` and `\r`.
///
/// ffmpeg rewrites its status line with bare carriage returns, so each
/// refresh becomes its own line. Empty lines are dropped.
#[derive(Debug, Default)]
struct DiagnosticLines;

impl DiagnosticLines {
    fn take_line(buf: &mut BytesMut) -> Option<String> {
        while let Some(pos) = buf.iter().position(|b| *b == b'\n' || *b == b'\r') {
            let chunk = buf.split_to(pos + 1);
            let text = String::from_utf8_lossy(&chunk[..pos]);
            if !text.is_empty() {
                return Some(text.into_owned());
            }
        }
        None
    }
}

impl Decoder for DiagnosticLines {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<String>> {
        Ok(Self::take_line(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<String>> {
        if let Some(line) = Self::take_line(buf) {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        let rest = buf.split();
        Ok(Some(String::from_utf8_lossy(&rest).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_newline_and_carriage_return() {
        let mut codec = DiagnosticLines;
        let mut buf = BytesMut::from(&b"Input #0\r\ntime=00:00:01\rtime=00:00:02\rpart"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("Input #0"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("time=00:00:01"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("time=00:00:02"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("part"));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn builder_collects_args() {
        let mut cmd = TranscodeCommand::new(ResolvedExecutable::fallback());
        cmd.arg("-i").args(["in.mp4", "out.m3u8"]);
        assert_eq!(cmd.get_args(), ["-i", "in.mp4", "out.m3u8"]);
    }

    #[cfg(unix)]
    mod process {
        use super::super::*;
        use std::path::Path;

        fn shell(script: &str) -> TranscodeCommand {
            let mut cmd = TranscodeCommand::new(ResolvedExecutable::SearchPath("sh".into()));
            cmd.args(["-c", script])
                .source("/media/movie.mp4")
                .output_dir("/media/movie");
            cmd
        }

        async fn collect(cmd: &TranscodeCommand) -> (Vec<ProgressEvent>, ConversionOutcome) {
            let mut events = Vec::new();
            let outcome = cmd
                .run(CancellationToken::new(), |e| events.push(e))
                .await;
            (events, outcome)
        }

        #[tokio::test]
        async fn zero_exit_is_success() {
            let cmd = shell(
                "echo 'Input #0, mov' >&2; echo 'frame=1 time=00:00:02.00 bitrate=1k' >&2; echo ignored; exit 0",
            );
            let (events, outcome) = collect(&cmd).await;

            assert_eq!(outcome, ConversionOutcome::success("/media/movie"));
            assert_eq!(events.len(), 2);
            assert_eq!(events[0].line, "Input #0, mov");
            assert!(!events[0].is_progress());
            assert_eq!(events[1].elapsed.map(|t| t.seconds), Some(2));
            assert!(events.iter().all(|e| e.file == Path::new("/media/movie.mp4")));
        }

        #[tokio::test]
        async fn silent_non_zero_exit_has_message() {
            let (events, outcome) = collect(&shell("exit 3")).await;
            assert_eq!(outcome.failure_message(), Some("sh exited with code 3"));
            assert_eq!(events.last().map(|e| e.line.as_str()), Some("[sh] sh exited with code 3"));
        }

        #[tokio::test]
        async fn killed_by_signal_has_message() {
            let (events, outcome) = collect(&shell("kill -KILL $$")).await;

            let message = outcome.failure_message().unwrap();
            assert!(!message.is_empty());
            assert_eq!(message, "sh terminated by signal 9");
            assert_eq!(
                events.last().map(|e| e.line.as_str()),
                Some("[sh] sh terminated by signal 9")
            );
        }

        #[tokio::test]
        async fn non_utf8_arguments_reach_the_process_unchanged() {
            use std::ffi::OsStr;
            use std::os::unix::ffi::OsStrExt;

            let mut cmd = shell(r#"printf '%s' "$0" | od -An -tx1 >&2"#);
            cmd.arg(OsStr::from_bytes(b"caf\xe9.mp4"));
            let (events, outcome) = collect(&cmd).await;

            assert!(outcome.is_success());
            let hex: String = events.iter().map(|e| e.line.replace(' ', "")).collect();
            assert_eq!(hex, "636166e92e6d7034");
        }

        #[tokio::test]
        async fn failure_carries_diagnostics() {
            let (events, outcome) =
                collect(&shell("echo 'movie.mp4: Invalid data found' >&2; exit 1")).await;

            let message = outcome.failure_message().unwrap();
            assert!(message.contains("Invalid data found"), "{message}");
            assert_eq!(events.len(), 2);
            assert!(events[1].line.starts_with("[sh] "));
        }

        #[tokio::test]
        async fn spawn_failure_has_no_events() {
            let cmd = TranscodeCommand::new(ResolvedExecutable::Path(
                "/nonexistent/dir/ffmpeg".into(),
            ));
            let (events, outcome) = collect(&cmd).await;

            assert!(events.is_empty());
            let message = outcome.failure_message().unwrap();
            assert!(message.starts_with("failed to spawn ffmpeg"), "{message}");
        }

        #[tokio::test]
        async fn carriage_return_status_lines_are_separate_events() {
            let (events, outcome) = collect(&shell(
                "printf 'time=00:00:01.00\\rtime=00:00:02.00\\rtime=00:00:03.00\\n' >&2",
            ))
            .await;

            assert!(outcome.is_success());
            let secs: Vec<u32> = events.iter().filter_map(|e| e.elapsed).map(|t| t.seconds).collect();
            assert_eq!(secs, vec![1, 2, 3]);
        }

        #[tokio::test]
        async fn cancellation_kills_the_process() {
            let cmd = shell("exec sleep 30");
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                trigger.cancel();
            });

            let started = std::time::Instant::now();
            let outcome = cmd.run(cancel, |_| {}).await;
            assert_eq!(outcome.failure_message(), Some(CANCELLED_MESSAGE));
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[tokio::test]
        async fn timeout_fires() {
            let mut cmd = shell("exec sleep 30");
            cmd.timeout(Some(Duration::from_millis(100)));

            let outcome = cmd.run(CancellationToken::new(), |_| {}).await;
            let message = outcome.failure_message().unwrap();
            assert!(message.contains("timed out"), "unexpected error: {message}");
        }
    }
}
