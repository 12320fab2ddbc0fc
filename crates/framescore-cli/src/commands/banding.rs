use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use framescore_core::aggregate::render;
use framescore_core::compose::{banding_mask, banding_params};
use framescore_core::consts::DEFAULT_READ_AHEAD;
use framescore_core::io::image_io::save_png;
use framescore_core::io::open_sequence;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Args)]
pub struct BandingArgs {
    /// Input SER or image file
    pub file: PathBuf,

    /// Output directory for the per-frame PNG masks
    #[arg(short, long)]
    pub output: PathBuf,

    /// Mask gain (multiplied in as ln(scale))
    #[arg(long, default_value = "2.0")]
    pub scale: f64,

    /// Fraction of the highest c-values pooled per scale
    #[arg(long)]
    pub topk: Option<f64>,

    /// Contrast visibility threshold
    #[arg(long)]
    pub tvi_threshold: Option<f64>,

    /// Frames computed ahead of the one being written
    #[arg(long, default_value_t = DEFAULT_READ_AHEAD)]
    pub read_ahead: usize,
}

pub fn run(args: &BandingArgs) -> Result<()> {
    let sequence = open_sequence(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let mut params = banding_params();
    if let Some(topk) = args.topk {
        params.topk = topk;
    }
    if let Some(tvi) = args.tvi_threshold {
        params.tvi_threshold = tvi;
    }
    let masks = banding_mask(&sequence, args.scale, params)?;

    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    let pb = ProgressBar::new(masks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    pb.set_message("Writing banding masks");

    for item in render(&masks, args.read_ahead)? {
        let (index, frame) = item?;
        let path = args.output.join(format!("banding_{index:05}.png"));
        save_png(&frame, &path).with_context(|| format!("Failed to write {}", path.display()))?;
        pb.set_position(index as u64 + 1);
    }
    pb.finish_with_message("Banding masks written");
    println!("Masks saved to {}", args.output.display());
    Ok(())
}
