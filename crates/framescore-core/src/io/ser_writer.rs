use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{MetricError, Result};
use crate::frame::{ColorFamily, Frame};
use crate::io::ser::{SerHeader, SER_COLOR_MONO, SER_COLOR_RGB, SER_HEADER_SIZE, SER_MAGIC};
use crate::sequence::Sequence;

/// Writes a SER file frame by frame.
pub struct SerWriter {
    writer: BufWriter<File>,
    header: SerHeader,
    frames_written: u32,
}

impl SerWriter {
    /// Create the file and write the header.
    pub fn create(path: &Path, header: &SerHeader) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer, header)?;
        Ok(Self {
            writer,
            header: header.clone(),
            frames_written: 0,
        })
    }

    /// Quantize a frame to the header's depth and append it.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let (w, h) = (self.header.width as usize, self.header.height as usize);
        let planes = self.header.planes_per_pixel();
        if frame.width() != w || frame.height() != h || frame.planes.len() != planes {
            return Err(MetricError::DimensionMismatch {
                reference: format!("{w}x{h}, {planes} planes"),
                distorted: format!(
                    "{}x{}, {} planes",
                    frame.width(),
                    frame.height(),
                    frame.planes.len()
                ),
            });
        }

        let max_val = ((1u32 << self.header.pixel_depth) - 1) as f32;
        let wide = self.header.bytes_per_sample() == 2;
        let mut bytes = Vec::with_capacity(self.header.frame_byte_size()?);
        for row in 0..h {
            for col in 0..w {
                for plane in &frame.planes {
                    let val = (plane[[row, col]].clamp(0.0, 1.0) * max_val).round() as u16;
                    if wide {
                        bytes.extend_from_slice(&val.to_le_bytes());
                    } else {
                        bytes.push(val as u8);
                    }
                }
            }
        }
        self.writer.write_all(&bytes)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Optional timestamp trailer (one little-endian u64 per frame).
    pub fn write_timestamps(&mut self, timestamps: &[u64]) -> Result<()> {
        for &ts in timestamps {
            self.writer.write_all(&ts.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn finalize(mut self) -> Result<()> {
        if self.frames_written != self.header.frame_count {
            return Err(MetricError::InvalidSer(format!(
                "header declares {} frames but {} were written",
                self.header.frame_count, self.frames_written
            )));
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Write every frame of a Gray or RGB sequence at `pixel_depth` bits.
pub fn write_sequence(path: &Path, sequence: &Sequence, pixel_depth: u32) -> Result<()> {
    let color_id = match sequence.layout().family {
        ColorFamily::Gray => SER_COLOR_MONO,
        ColorFamily::Rgb => SER_COLOR_RGB,
        _ => return Err(MetricError::InvalidColorFamily(sequence.layout().name())),
    };
    let header = SerHeader {
        color_id,
        little_endian: true,
        width: sequence.width() as u32,
        height: sequence.height() as u32,
        pixel_depth,
        frame_count: sequence.len() as u32,
        observer: String::new(),
        instrument: String::new(),
        telescope: String::new(),
        date_time: 0,
        date_time_utc: 0,
    };
    let mut writer = SerWriter::create(path, &header)?;
    for frame in sequence.frames() {
        writer.write_frame(&frame?)?;
    }
    writer.finalize()
}

fn write_header(w: &mut impl Write, header: &SerHeader) -> Result<()> {
    w.write_all(SER_MAGIC)?;
    // LuID
    w.write_all(&0i32.to_le_bytes())?;
    w.write_all(&header.color_id.to_le_bytes())?;
    // 0 = little-endian (Siril convention)
    let le_flag: i32 = if header.little_endian { 0 } else { 1 };
    w.write_all(&le_flag.to_le_bytes())?;
    w.write_all(&(header.width as i32).to_le_bytes())?;
    w.write_all(&(header.height as i32).to_le_bytes())?;
    w.write_all(&(header.pixel_depth as i32).to_le_bytes())?;
    w.write_all(&(header.frame_count as i32).to_le_bytes())?;
    write_fixed_string(w, &header.observer, 40)?;
    write_fixed_string(w, &header.instrument, 40)?;
    write_fixed_string(w, &header.telescope, 40)?;
    w.write_all(&header.date_time.to_le_bytes())?;
    w.write_all(&header.date_time_utc.to_le_bytes())?;

    debug_assert_eq!(
        14 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 40 + 40 + 40 + 8 + 8,
        SER_HEADER_SIZE
    );
    Ok(())
}

fn write_fixed_string(w: &mut impl Write, s: &str, len: usize) -> Result<()> {
    let bytes = s.as_bytes();
    let n = bytes.len().min(len);
    w.write_all(&bytes[..n])?;
    w.write_all(&vec![0u8; len - n])?;
    Ok(())
}
