use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use framescore_core::aggregate::{statistics, ResultTable};

use crate::summary::print_statistics;

#[derive(Args)]
pub struct StatsArgs {
    /// Result table written by `framescore score --csv`
    pub table: PathBuf,

    /// Columns to summarize (default: all)
    pub columns: Vec<String>,
}

pub fn run(args: &StatsArgs) -> Result<()> {
    let table = ResultTable::read_csv(&args.table)
        .with_context(|| format!("Failed to read {}", args.table.display()))?;
    let stats = statistics(&table, &args.columns)?;
    let title = args
        .table
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    print_statistics(&title, &stats);
    Ok(())
}
