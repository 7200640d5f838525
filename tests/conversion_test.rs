//! Conversion engine tests against a stand-in ffmpeg.

#![cfg(unix)]

mod common;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rapidhls::config::Config;
use rapidhls::conversion::{run_batch, ConversionEvent, Engine, SharedOptions};
use rapidhls_core::{ConversionOutcome, OutputMode};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn shared(out: &Path) -> SharedOptions {
    SharedOptions {
        output_mode: OutputMode::Custom,
        custom_path: Some(out.to_path_buf()),
        ffmpeg_override: Some(common::fake_ffmpeg().to_path_buf()),
        ..Default::default()
    }
}

fn log_position(logs: &[String], prefix: &str) -> usize {
    logs.iter()
        .position(|l| l.starts_with(prefix))
        .unwrap_or_else(|| panic!("no log line starting with {prefix:?} in {logs:#?}"))
}

#[tokio::test]
async fn batch_continues_past_a_failed_file() {
    let media = tempdir().unwrap();
    let out = tempdir().unwrap();
    let files = common::touch_media(media.path(), &["a.mp4", "bad.mp4", "c.mkv"]);

    let engine = Engine::new(Config::default());
    let mut seen = Vec::new();
    let state = run_batch(
        &engine,
        &files,
        &shared(out.path()),
        CancellationToken::new(),
        |e| seen.push(e),
    )
    .await;

    assert!(state.finished);
    assert!(!state.cancelled);
    assert_eq!(state.total, 3);
    assert_eq!(state.attempted(), 3);
    assert_eq!(state.succeeded, 2);
    assert_eq!(state.failed(), 1);

    let logs = &state.logs;
    let header2 = log_position(logs, "=== Processing file 2/3: bad.mp4 ===");
    let done1 = log_position(logs, "✓ File 1 completed: ");
    let failed2 = log_position(logs, "✗ File 2 failed: bad.mp4: ");
    let done3 = log_position(logs, "✓ File 3 completed: ");
    assert!(done1 < header2 && header2 < failed2 && failed2 < done3);
    assert_eq!(logs.iter().filter(|l| l.starts_with("✗ File")).count(), 1);
    assert!(logs[failed2].contains("Invalid data found"));
    assert!(logs.iter().any(|l| l.starts_with("[ffmpeg] ")));
    assert_eq!(
        logs.last().map(String::as_str),
        Some("✓ Batch conversion completed! 2/3 files processed successfully.")
    );

    assert_eq!(state.progress, 100);
    assert_eq!(state.last_output_dir, Some(out.path().join("c")));
    assert!(out.path().join("a").join("playlist.m3u8").is_file());
    assert!(out.path().join("c").join("playlist.m3u8").is_file());
    assert_eq!(
        state.results[1].outcome.failure_message().map(|m| m.contains("bad.mp4")),
        Some(true)
    );

    let seen_logs: Vec<&str> = seen
        .iter()
        .filter_map(|e| match e {
            ConversionEvent::Log { line } => Some(line.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(seen_logs, logs.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn batch_events_never_interleave_across_files() {
    let media = tempdir().unwrap();
    let out = tempdir().unwrap();
    let files = common::touch_media(media.path(), &["one.mp4", "two.mp4", "three.mp4"]);

    let engine = Engine::new(Config::default());
    let mut seen = Vec::new();
    run_batch(
        &engine,
        &files,
        &shared(out.path()),
        CancellationToken::new(),
        |e| seen.push(e),
    )
    .await;

    let mut current: Option<usize> = None;
    let mut percents = Vec::new();
    for event in &seen {
        match event {
            ConversionEvent::Log { line } if line.starts_with("=== Processing file ") => {
                current = Some(current.map_or(0, |i| i + 1));
            }
            ConversionEvent::Progress { file, percent, .. } => {
                let i = current.expect("progress before any file started");
                assert_eq!(file, &files[i]);
                percents.push(*percent);
            }
            _ => {}
        }
    }

    // Two time markers per file, then the per-file completion percentage.
    assert_eq!(percents, vec![5, 10, 33, 38, 43, 67, 72, 77, 100]);
}

#[tokio::test]
async fn batch_outputs_with_same_stem_do_not_collide() {
    let media = tempdir().unwrap();
    let out = tempdir().unwrap();
    let files = common::touch_media(media.path(), &["x/clip.mp4", "y/clip.mov"]);

    let engine = Engine::new(Config::default());
    let state = run_batch(
        &engine,
        &files,
        &shared(out.path()),
        CancellationToken::new(),
        |_| {},
    )
    .await;

    let dirs: Vec<Option<&Path>> = state.results.iter().map(|r| r.outcome.output_dir()).collect();
    assert_eq!(
        dirs,
        vec![
            Some(out.path().join("clip").as_path()),
            Some(out.path().join("clip-1").as_path()),
        ]
    );
}

#[tokio::test]
async fn cancellation_stops_the_batch() {
    let media = tempdir().unwrap();
    let out = tempdir().unwrap();
    let files = common::touch_media(media.path(), &["slow.mp4", "next.mp4"]);

    let engine = Engine::new(Config::default());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let state = run_batch(&engine, &files, &shared(out.path()), cancel, |_| {}).await;

    assert!(state.cancelled);
    assert!(state.finished);
    assert_eq!(state.attempted(), 1);
    assert_eq!(
        state.results[0].outcome,
        ConversionOutcome::failure("conversion cancelled")
    );
    assert!(!out.path().join("next").exists());
    assert!(state
        .logs
        .last()
        .is_some_and(|l| l.starts_with("✗ Batch conversion cancelled!")));
}

#[tokio::test]
async fn single_file_conversion_reports_progress_and_output() {
    let media = tempdir().unwrap();
    let out = tempdir().unwrap();
    let input = common::touch_media(media.path(), &["movie.mp4"]).remove(0);

    let engine = Engine::new(Config::default());
    let request = engine.request_for(&input, "movie", &shared(out.path()));

    let mut logs = Vec::new();
    let mut percents = Vec::new();
    let outcome = engine
        .convert(&request, CancellationToken::new(), |e| match e {
            ConversionEvent::Log { line } => logs.push(line),
            ConversionEvent::Progress { percent, .. } => percents.push(percent),
        })
        .await;

    let expected_dir: PathBuf = out.path().join("movie");
    assert_eq!(outcome, ConversionOutcome::success(&expected_dir));
    assert!(expected_dir.join("playlist.m3u8").is_file());
    assert_eq!(percents, vec![5, 10, 100]);
    assert_eq!(
        &logs[logs.len() - 2..],
        &[
            "✓ Conversion completed successfully!".to_string(),
            format!("✓ Output saved to: {}", expected_dir.display()),
        ]
    );
}

#[tokio::test]
async fn single_file_failure_keeps_diagnostics() {
    let media = tempdir().unwrap();
    let out = tempdir().unwrap();
    let input = common::touch_media(media.path(), &["bad.mp4"]).remove(0);

    let engine = Engine::new(Config::default());
    let request = engine.request_for(&input, "", &shared(out.path()));

    let mut logs = Vec::new();
    let outcome = engine
        .convert(&request, CancellationToken::new(), |e| {
            if let ConversionEvent::Log { line } = e {
                logs.push(line);
            }
        })
        .await;

    let message = outcome.failure_message().unwrap();
    assert!(message.contains("Invalid data found"));
    // The output directory was allocated before the transcoder ran.
    assert!(out.path().join("output").is_dir());
    let expected = format!("✗ Conversion failed: {}: ", input.display());
    assert!(logs.last().is_some_and(|l| l.starts_with(&expected)));
}
