use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use framescore_core::io::open_sequence;
use framescore_core::io::ser::SerReader;

#[derive(Args)]
pub struct InfoArgs {
    /// Input SER or image file
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let sequence = open_sequence(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;

    println!("File:        {}", args.file.display());
    println!("Frames:      {}", sequence.len());
    println!("Dimensions:  {}x{}", sequence.width(), sequence.height());
    println!("Layout:      {}", sequence.layout());

    let is_ser = args
        .file
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("ser"));
    if is_ser {
        let reader = SerReader::open(&args.file)?;
        let header = &reader.header;
        for (label, value) in [
            ("Observer:", &header.observer),
            ("Telescope:", &header.telescope),
            ("Instrument:", &header.instrument),
        ] {
            if !value.is_empty() {
                println!("{:<13}{}", label, value);
            }
        }
        let frame_bytes = header.frame_byte_size()?;
        let total_mb = (frame_bytes * sequence.len()) as f64 / (1024.0 * 1024.0);
        println!("Data size:   {:.1} MB", total_mb);
    }

    Ok(())
}
