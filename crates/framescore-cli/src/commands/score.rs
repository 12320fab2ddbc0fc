use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use framescore_core::aggregate::{plot, statistics, PlotOptions};
use framescore_core::compose::{compare, Reduction};
use framescore_core::config::{MetricConfig, ScoreConfig};
use framescore_core::consts::DEFAULT_READ_AHEAD;
use framescore_core::io::open_sequence;
use indicatif::{ProgressBar, ProgressStyle};

use crate::summary::{print_score_summary, print_statistics};

#[derive(Clone, Copy, ValueEnum)]
pub enum MetricArg {
    Psnr,
    Ssim,
    Gmsd,
    Mdsi,
    Vif,
    Cambi,
    Hash,
    Lbp,
    Glcm,
    Sharpness,
    Blur,
    Svd,
    Stats,
    Compare,
    Edge,
}

impl MetricArg {
    fn kind(self) -> &'static str {
        match self {
            MetricArg::Psnr => "psnr",
            MetricArg::Ssim => "ssim",
            MetricArg::Gmsd => "gmsd",
            MetricArg::Mdsi => "mdsi",
            MetricArg::Vif => "vif",
            MetricArg::Cambi => "cambi",
            MetricArg::Hash => "hash",
            MetricArg::Lbp => "lbp",
            MetricArg::Glcm => "glcm",
            MetricArg::Sharpness => "sharpness",
            MetricArg::Blur => "blur",
            MetricArg::Svd => "svd",
            MetricArg::Stats => "stats",
            MetricArg::Compare => "compare",
            MetricArg::Edge => "edge",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ReduceArg {
    Crop,
    Downsample,
    Hybrid,
}

#[derive(Args)]
pub struct ScoreArgs {
    /// Reference SER or image file (optional with --config)
    pub reference: Option<PathBuf>,

    /// Distorted SER or image file
    pub distorted: Option<PathBuf>,

    /// Metric to compute
    #[arg(short, long, value_enum)]
    pub metric: Option<MetricArg>,

    /// Reduce both inputs before scoring
    #[arg(long, value_enum)]
    pub reduce: Option<ReduceArg>,

    /// Frames computed ahead of the one being consumed
    #[arg(long)]
    pub read_ahead: Option<usize>,

    /// Write the result table as CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Replace an existing CSV
    #[arg(long)]
    pub overwrite: bool,

    /// Plot every column as SVG
    #[arg(long)]
    pub plot: Option<PathBuf>,

    /// Load settings from a TOML file; other flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn load_config(args: &ScoreArgs) -> Result<ScoreConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str::<ScoreConfig>(&text)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        }
        None => ScoreConfig {
            reference: args
                .reference
                .clone()
                .context("A reference input is required")?,
            distorted: None,
            read_ahead: DEFAULT_READ_AHEAD,
            output: None,
            overwrite: false,
            metric: MetricConfig::default(),
            reduction: None,
        },
    };

    if let Some(ref reference) = args.reference {
        config.reference = reference.clone();
    }
    if let Some(ref distorted) = args.distorted {
        config.distorted = Some(distorted.clone());
    }
    if let Some(metric) = args.metric {
        if config.metric.kind() != metric.kind() {
            config.metric = MetricConfig::from_kind(metric.kind())
                .with_context(|| format!("Unknown metric '{}'", metric.kind()))?;
        }
    }
    if let Some(reduce) = args.reduce {
        config.reduction = Some(match reduce {
            ReduceArg::Crop => Reduction::crop(),
            ReduceArg::Downsample => Reduction::downsample(),
            ReduceArg::Hybrid => Reduction::hybrid(),
        });
    }
    if let Some(read_ahead) = args.read_ahead {
        config.read_ahead = read_ahead;
    }
    if let Some(ref csv) = args.csv {
        config.output = Some(csv.clone());
    }
    config.overwrite |= args.overwrite;
    Ok(config)
}

pub fn run(args: &ScoreArgs) -> Result<()> {
    let config = load_config(args)?;
    let metric = config.metric.build();

    let reference = open_sequence(&config.reference)
        .with_context(|| format!("Failed to open {}", config.reference.display()))?;
    let distorted = config
        .distorted
        .as_ref()
        .map(|path| {
            open_sequence(path).with_context(|| format!("Failed to open {}", path.display()))
        })
        .transpose()?;

    let scored = match (&distorted, &config.reduction) {
        (Some(distorted), reduction) if metric.requires_reference() => {
            compare(&reference, distorted, metric.as_ref(), reduction.as_ref())?
        }
        (subject, Some(reduction)) => {
            let subject = reduction.apply(subject.as_ref().unwrap_or(&reference))?;
            metric.compute(&subject, None)?
        }
        (subject, None) => metric.compute(&reference, subject.as_ref())?,
    };

    print_score_summary(&config, scored.primary());

    let pb = ProgressBar::new(scored.primary().len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    pb.set_message(format!("Scoring frames ({})", scored.metric_name()));
    let table = scored.table_with_progress(config.read_ahead, |done| {
        pb.set_position(done as u64);
    })?;
    pb.finish_with_message(format!("Scored frames ({})", scored.metric_name()));

    if let Some(ref path) = config.output {
        table
            .persist(path, config.overwrite)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Result table saved to {}", path.display());
    }
    if let Some(ref path) = args.plot {
        let columns: [&str; 0] = [];
        plot(&table, &columns, &PlotOptions::default(), path)
            .with_context(|| format!("Failed to plot {}", path.display()))?;
        println!("Plot saved to {}", path.display());
    }

    let columns: [&str; 0] = [];
    print_statistics(scored.metric_name(), &statistics(&table, &columns)?);
    Ok(())
}
