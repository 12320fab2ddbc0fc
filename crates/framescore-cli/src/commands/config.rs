use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use framescore_core::compose::Reduction;
use framescore_core::config::{MetricConfig, ScoreConfig};

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Metric whose parameters to include
    #[arg(long, default_value = "psnr")]
    pub metric: String,
}

/// Print or save a full default ScoreConfig as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let metric = MetricConfig::from_kind(&args.metric)
        .with_context(|| format!("Unknown metric '{}'", args.metric))?;
    let config = ScoreConfig {
        metric,
        reduction: Some(Reduction::crop()),
        ..ScoreConfig::default()
    };
    let toml_str = toml::to_string_pretty(&config)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
