mod cli;

use rapidhls::{
    config,
    conversion::{run_batch, ConversionEvent, Engine, Plan},
    scanner,
};
use rapidhls_core::media::derive_output_name;
use rapidhls_core::ConversionOutcome;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, ConvertArgs};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "rapidhls=trace,rapidhls_av=debug,rapidhls_core=debug".to_string()
        } else {
            "rapidhls=info,rapidhls_av=info,rapidhls_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert { input, name, opts } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_file(&input, name.as_deref(), &opts, cli.config.as_deref()))
        }
        Commands::Bulk { inputs, opts } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert_bulk(&inputs, &opts, cli.config.as_deref()))
        }
        Commands::CheckTools { ffmpeg } => check_tools(ffmpeg.as_deref(), cli.config.as_deref()),
        Commands::Version => {
            println!("rapidhls {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn convert_file(
    input: &Path,
    name: Option<&str>,
    opts: &ConvertArgs,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let shared = opts.shared(&config);
    let engine = Engine::new(config);
    let request = engine.request_for(input, name.unwrap_or_default(), &shared);

    if opts.dry_run {
        return print_plans(&[engine.plan(&request)], opts.json);
    }

    let cancel = cancel_on_ctrl_c();
    let outcome = engine.convert(&request, cancel, print_event).await;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    match outcome {
        ConversionOutcome::Success { output_dir } => {
            if !opts.json {
                println!("{}", output_dir.display());
            }
            Ok(())
        }
        ConversionOutcome::Failure { .. } => anyhow::bail!("Conversion of {:?} failed", input),
    }
}

async fn convert_bulk(inputs: &[PathBuf], opts: &ConvertArgs, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let shared = opts.shared(&config);
    let engine = Engine::new(config);

    let files = scanner::expand_inputs(inputs);
    if files.is_empty() {
        anyhow::bail!("No media files found in {:?}", inputs);
    }

    if opts.dry_run {
        let plans: Vec<Plan> = files
            .iter()
            .enumerate()
            .map(|(i, f)| engine.plan(&engine.request_for(f, &derive_output_name(f, i), &shared)))
            .collect();
        return print_plans(&plans, opts.json);
    }

    let cancel = cancel_on_ctrl_c();
    let state = run_batch(&engine, &files, &shared, cancel, print_event).await;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else if let Some(ref dir) = state.last_output_dir {
        println!("{}", dir.display());
    }

    if state.cancelled {
        anyhow::bail!(
            "Batch cancelled after {} of {} files",
            state.attempted(),
            state.total
        );
    }
    if state.all_failed() {
        anyhow::bail!("All {} files failed to convert", state.total);
    }

    Ok(())
}

fn check_tools(ffmpeg: Option<&Path>, config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let engine = Engine::new(config);
    let info = rapidhls_av::check(&engine.resolve_executable(ffmpeg));

    let status = if info.available { "✓" } else { "✗" };
    print!("{} {}", status, info.command);

    if let Some(ref version) = info.version {
        print!(" ({})", version);
    }

    if let Some(ref path) = info.path {
        print!(" - {}", path.display());
    }

    println!();
    println!();
    if info.available {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Install it or point --ffmpeg at it.");
    }

    Ok(())
}

fn print_plans(plans: &[Plan], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(plans)?);
        return Ok(());
    }

    for plan in plans {
        println!("[DRY RUN] {}", plan.executable);
        println!("  Output directory: {}", plan.output_dir.display());
        println!("  Arguments: {}", plan.invocation.display_args().join(" "));
    }

    Ok(())
}

fn print_event(event: ConversionEvent) {
    match event {
        ConversionEvent::Log { line } => eprintln!("{}", line),
        ConversionEvent::Progress {
            elapsed: Some(time),
            percent,
            ..
        } => eprintln!("[{:>3}%] time={}", percent, time),
        ConversionEvent::Progress { percent, .. } => eprintln!("[{:>3}%]", percent),
    }
}

/// A token cancelled when the user presses Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping conversion");
            trigger.cancel();
        }
    });
    token
}
