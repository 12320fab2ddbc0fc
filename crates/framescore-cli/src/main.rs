mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "framescore", about = "Per-frame video quality metrics")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a sequence (or a reference/distorted pair) with one metric
    Score(commands::score::ScoreArgs),
    /// Summary statistics of a persisted result table
    Stats(commands::stats::StatsArgs),
    /// Plot columns of a persisted result table as SVG
    Plot(commands::plot::PlotArgs),
    /// Write a banding visibility mask per frame
    Banding(commands::banding::BandingArgs),
    /// Show sequence metadata
    Info(commands::info::InfoArgs),
    /// Print a default scoring config as TOML
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Score(args) => commands::score::run(args),
        Commands::Stats(args) => commands::stats::run(args),
        Commands::Plot(args) => commands::plot::run(args),
        Commands::Banding(args) => commands::banding::run(args),
        Commands::Info(args) => commands::info::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
