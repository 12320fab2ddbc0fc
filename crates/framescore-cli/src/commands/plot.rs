use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use framescore_core::aggregate::{plot, PlotOptions, ResultTable};

#[derive(Args)]
pub struct PlotArgs {
    /// Result table written by `framescore score --csv`
    pub table: PathBuf,

    /// Columns to plot (default: all)
    pub columns: Vec<String>,

    /// Output SVG path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Add min-max normalized series on a secondary axis
    #[arg(long)]
    pub normalize: bool,

    /// Add series divided by their maximum on a secondary axis
    #[arg(long, conflicts_with = "normalize")]
    pub relative: bool,

    /// Chart title
    #[arg(long)]
    pub title: Option<String>,
}

pub fn run(args: &PlotArgs) -> Result<()> {
    let table = ResultTable::read_csv(&args.table)
        .with_context(|| format!("Failed to read {}", args.table.display()))?;
    let options = PlotOptions {
        normalize: args.normalize,
        relative_scale: args.relative,
        title: args.title.clone(),
    };
    plot(&table, &args.columns, &options, &args.output)
        .with_context(|| format!("Failed to plot {}", args.output.display()))?;
    println!("Plot saved to {}", args.output.display());
    Ok(())
}
