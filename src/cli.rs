use clap::{Args, Parser, Subcommand};
use rapidhls::config::Config;
use rapidhls::conversion::SharedOptions;
use rapidhls_core::{ConversionOptions, OutputMode, Quality};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rapidhls")]
#[command(author, version, about = "Convert media files to HTTP Live Streaming (HLS)")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a single media file into an HLS playlist and segments
    Convert {
        /// Input media file
        #[arg(required = true)]
        input: PathBuf,

        /// Output directory name (defaults to "output")
        #[arg(short, long)]
        name: Option<String>,

        #[command(flatten)]
        opts: ConvertArgs,
    },

    /// Convert several files (or folders of media) one after another
    Bulk {
        /// Input files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        opts: ConvertArgs,
    },

    /// Check that ffmpeg can be found
    CheckTools {
        /// ffmpeg binary or the directory containing it
        #[arg(long)]
        ffmpeg: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Options shared by `convert` and `bulk`.
#[derive(Args, Clone, Debug)]
pub struct ConvertArgs {
    /// Where output directories go: default, same-as-input or custom
    #[arg(long)]
    pub output_mode: Option<OutputMode>,

    /// Base directory for output (implies --output-mode custom)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// HLS segment duration in seconds
    #[arg(long)]
    pub segment_duration: Option<String>,

    /// Quality tier: low, medium or high
    #[arg(short, long)]
    pub quality: Option<String>,

    /// Drop video and produce audio-only output
    #[arg(long)]
    pub audio_only: bool,

    /// ffmpeg binary or the directory containing it
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,

    /// Show the ffmpeg invocation without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

impl ConvertArgs {
    /// Merge the flags over the configured defaults.
    pub fn shared(&self, config: &Config) -> SharedOptions {
        let defaults = config.conversion.options();

        let output_mode = match (self.output_mode, &self.output) {
            (Some(mode), _) => mode,
            (None, Some(_)) => OutputMode::Custom,
            (None, None) => OutputMode::Default,
        };

        SharedOptions {
            options: ConversionOptions {
                segment_duration: self
                    .segment_duration
                    .clone()
                    .unwrap_or(defaults.segment_duration),
                quality: self
                    .quality
                    .as_deref()
                    .map(Quality::from_tier)
                    .unwrap_or(defaults.quality),
                audio_only: self.audio_only || defaults.audio_only,
            },
            output_mode,
            custom_path: self.output.clone(),
            ffmpeg_override: self.ffmpeg.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    fn convert_args(cli: Cli) -> ConvertArgs {
        match cli.command {
            Commands::Convert { opts, .. } | Commands::Bulk { opts, .. } => opts,
            _ => panic!("expected convert or bulk"),
        }
    }

    #[test]
    fn output_flag_implies_custom_mode() {
        let opts = convert_args(parse(&["rapidhls", "convert", "a.mp4", "-o", "/out"]));
        let shared = opts.shared(&Config::default());
        assert_eq!(shared.output_mode, OutputMode::Custom);
        assert_eq!(shared.custom_path, Some(PathBuf::from("/out")));
    }

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        config.conversion.segment_duration = "6".into();
        config.conversion.quality = Quality::Low;

        let opts = convert_args(parse(&[
            "rapidhls",
            "bulk",
            "a.mp4",
            "b.mp4",
            "--quality",
            "high",
            "--output-mode",
            "same-as-input",
        ]));
        let shared = opts.shared(&config);
        assert_eq!(shared.options.quality, Quality::High);
        assert_eq!(shared.options.segment_duration, "6");
        assert_eq!(shared.output_mode, OutputMode::SameAsInput);
    }

    #[test]
    fn quality_tier_is_matched_exactly() {
        let opts = convert_args(parse(&["rapidhls", "convert", "a.mp4", "-q", "HIGH"]));
        let shared = opts.shared(&Config::default());
        assert_eq!(shared.options.quality, Quality::Medium);
        assert_eq!(shared.options.quality.video_bitrate(), "1500k");
    }

    #[test]
    fn unknown_output_mode_is_rejected() {
        assert!(Cli::try_parse_from(["rapidhls", "convert", "a.mp4", "--output-mode", "nowhere"])
            .is_err());
    }
}
