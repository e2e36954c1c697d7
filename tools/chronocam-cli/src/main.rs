//! Chronocam CLI: assemble and render multi-camera CCTV timelines.
//!
//! Usage:
//!   chronocam plan <CLIPS>               Show the timeline and how it would render
//!   chronocam render <CLIPS> -o <OUT>    Render the timeline to a video file
//!   chronocam check                      Check that the encoder is available

use std::path::PathBuf;

use chronocam_common::config::AppConfig;
use chronocam_common::error::ChronocamError;
use clap::{Parser, Subcommand};

mod commands;

use commands::RenderArgs;

#[derive(Parser)]
#[command(
    name = "chronocam",
    about = "Chronological multi-camera CCTV timeline renderer",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a clip list and show the segments, estimate and batch plan
    Plan {
        /// Clip list (JSON array or `{ "clips": [...] }`)
        clips: PathBuf,

        /// Output path the render would write to
        #[arg(short, long, default_value = "timeline.mp4")]
        output: PathBuf,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Render a clip list to one video file
    Render {
        /// Clip list (JSON array or `{ "clips": [...] }`)
        clips: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Keep the working directory and batch outputs
        #[arg(long)]
        keep_temp: bool,

        #[command(flatten)]
        render: RenderArgs,
    },

    /// Check that the encoder is installed and runnable
    Check {
        /// Encoder binary to check instead of the configured one
        #[arg(long)]
        ffmpeg: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    logging.json |= cli.json_logs;
    chronocam_common::logging::init_logging(&logging);

    let result = match cli.command {
        Commands::Plan {
            clips,
            output,
            json,
            render,
        } => commands::plan::run(&config, clips, output, json, render),
        Commands::Render {
            clips,
            output,
            keep_temp,
            render,
        } => commands::render::run(&config, clips, output, keep_temp, render).await,
        Commands::Check { ffmpeg } => commands::check::run(&config, ffmpeg).await,
    };

    if let Err(e) = &result {
        if let Some(err) = e.downcast_ref::<ChronocamError>() {
            eprintln!("Hint: {}", err.remediation());
        }
    }
    result
}
