use std::fs::File;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::Array2;

use crate::error::{MetricError, Result};
use crate::frame::{Frame, PixelLayout, SampleType};
use crate::sequence::{FrameSource, Sequence};

pub(crate) const SER_HEADER_SIZE: usize = 178;
pub(crate) const SER_MAGIC: &[u8; 14] = b"LUCAM-RECORDER";

pub const SER_COLOR_MONO: i32 = 0;
pub const SER_COLOR_RGB: i32 = 100;
pub const SER_COLOR_BGR: i32 = 101;

/// SER file header (178 bytes).
#[derive(Clone, Debug)]
pub struct SerHeader {
    pub color_id: i32,
    pub little_endian: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_depth: u32,
    pub frame_count: u32,
    pub observer: String,
    pub instrument: String,
    pub telescope: String,
    pub date_time: u64,
    pub date_time_utc: u64,
}

impl SerHeader {
    /// Bytes per sample (1 for 8-bit, 2 for 9-16 bit).
    pub fn bytes_per_sample(&self) -> usize {
        if self.pixel_depth <= 8 {
            1
        } else {
            2
        }
    }

    /// Interleaved samples per pixel (3 for RGB/BGR, 1 otherwise).
    pub fn planes_per_pixel(&self) -> usize {
        match self.color_id {
            SER_COLOR_RGB | SER_COLOR_BGR => 3,
            _ => 1,
        }
    }

    pub fn frame_byte_size(&self) -> Result<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|px| px.checked_mul(self.bytes_per_sample() * self.planes_per_pixel()))
            .ok_or_else(|| MetricError::InvalidSer("frame size overflows".into()))
    }

    /// Layout frames decode to. Bayer mosaics are read as single-plane data.
    pub fn layout(&self) -> PixelLayout {
        let base = if self.planes_per_pixel() == 3 {
            PixelLayout::RGB24
        } else {
            PixelLayout::GRAY8
        };
        base.with_depth(SampleType::Integer, self.pixel_depth as u8)
    }
}

/// Memory-mapped SER file, usable directly as a frame source.
#[derive(Debug)]
pub struct SerReader {
    mmap: Mmap,
    pub header: SerHeader,
    frame_size: usize,
}

impl SerReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < SER_HEADER_SIZE {
            return Err(MetricError::InvalidSer("File too small for SER header".into()));
        }
        if &mmap[0..14] != SER_MAGIC {
            return Err(MetricError::InvalidSer("Missing LUCAM-RECORDER magic".into()));
        }

        let header = parse_header(&mmap[..SER_HEADER_SIZE])?;
        let frame_size = header.frame_byte_size()?;
        let expected = SER_HEADER_SIZE + frame_size * header.frame_count as usize;
        if mmap.len() < expected {
            return Err(MetricError::InvalidSer(format!(
                "File truncated: expected at least {} bytes, got {}",
                expected,
                mmap.len()
            )));
        }

        Ok(Self {
            mmap,
            header,
            frame_size,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count as usize
    }

    /// Raw bytes of one frame (zero-copy from the map).
    pub fn frame_raw(&self, index: usize) -> Result<&[u8]> {
        let total = self.frame_count();
        if index >= total {
            return Err(MetricError::FrameIndexOutOfRange { index, total });
        }
        let offset = SER_HEADER_SIZE + index * self.frame_size;
        Ok(&self.mmap[offset..offset + self.frame_size])
    }

    /// Decode one frame to normalized planes. BGR data is reordered to RGB.
    pub fn read_frame(&self, index: usize) -> Result<Frame> {
        let raw = self.frame_raw(index)?;
        let h = self.header.height as usize;
        let w = self.header.width as usize;
        let planes = self.header.planes_per_pixel();

        let order: &[usize] = match self.header.color_id {
            SER_COLOR_RGB => &[0, 1, 2],
            SER_COLOR_BGR => &[2, 1, 0],
            _ => &[0],
        };
        let data = order
            .iter()
            .map(|&channel| self.decode_plane(raw, h, w, planes, channel))
            .collect();

        let mut frame = Frame::new(data, self.header.layout())?;
        if let Some(ts) = self.read_timestamp(index) {
            frame.set_prop("timestamp", ts as i64);
        }
        Ok(frame)
    }

    fn decode_plane(
        &self,
        raw: &[u8],
        height: usize,
        width: usize,
        planes: usize,
        channel: usize,
    ) -> Array2<f32> {
        let bytes = self.header.bytes_per_sample();
        let max_val = ((1u32 << self.header.pixel_depth) - 1) as f32;
        let little_endian = self.header.little_endian;
        Array2::from_shape_fn((height, width), |(row, col)| {
            let idx = ((row * width + col) * planes + channel) * bytes;
            let val = if bytes == 1 {
                raw[idx] as f32
            } else {
                let pair = [raw[idx], raw[idx + 1]];
                if little_endian {
                    u16::from_le_bytes(pair) as f32
                } else {
                    u16::from_be_bytes(pair) as f32
                }
            };
            val / max_val
        })
    }

    /// Per-frame timestamp from the optional trailer.
    fn read_timestamp(&self, index: usize) -> Option<u64> {
        let trailer = SER_HEADER_SIZE + self.frame_size * self.frame_count();
        let offset = trailer + index * 8;
        let bytes = self.mmap.get(offset..offset + 8)?;
        Some(u64::from_le_bytes(bytes.try_into().ok()?))
    }

    pub fn into_sequence(self) -> Sequence {
        Sequence::new(self)
    }
}

impl FrameSource for SerReader {
    fn len(&self) -> usize {
        self.frame_count()
    }

    fn width(&self) -> usize {
        self.header.width as usize
    }

    fn height(&self) -> usize {
        self.header.height as usize
    }

    fn layout(&self) -> PixelLayout {
        self.header.layout()
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        self.read_frame(index)
    }
}

fn parse_header(buf: &[u8]) -> Result<SerHeader> {
    let mut cursor = std::io::Cursor::new(&buf[14..]);

    let _lu_id = cursor.read_i32::<LittleEndian>()?;
    let color_id = cursor.read_i32::<LittleEndian>()?;
    let le_flag = cursor.read_i32::<LittleEndian>()?;
    let width = cursor.read_i32::<LittleEndian>()?;
    let height = cursor.read_i32::<LittleEndian>()?;
    let pixel_depth = cursor.read_i32::<LittleEndian>()?;
    let frame_count = cursor.read_i32::<LittleEndian>()?;

    let observer = read_fixed_string(&buf[42..82]);
    let instrument = read_fixed_string(&buf[82..122]);
    let telescope = read_fixed_string(&buf[122..162]);

    let mut cursor = std::io::Cursor::new(&buf[162..]);
    let date_time = cursor.read_u64::<LittleEndian>()?;
    let date_time_utc = cursor.read_u64::<LittleEndian>()?;

    if width <= 0 || height <= 0 {
        return Err(MetricError::InvalidDimensions {
            width: width.max(0) as usize,
            height: height.max(0) as usize,
        });
    }
    if !(1..=16).contains(&pixel_depth) {
        return Err(MetricError::InvalidSer(format!(
            "Unsupported pixel depth {pixel_depth}"
        )));
    }
    if frame_count < 0 {
        return Err(MetricError::InvalidSer(format!("Negative frame count {frame_count}")));
    }

    // Writers disagree on the flag; 0 is treated as little-endian (Siril).
    let little_endian = le_flag != 1;

    Ok(SerHeader {
        color_id,
        little_endian,
        width: width as u32,
        height: height as u32,
        pixel_depth: pixel_depth as u32,
        frame_count: frame_count as u32,
        observer,
        instrument,
        telescope,
        date_time,
        date_time_utc,
    })
}

fn read_fixed_string(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}
