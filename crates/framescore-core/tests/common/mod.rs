use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use framescore_core::error::{MetricError, Result};
use framescore_core::frame::{Frame, PixelLayout};
use framescore_core::metrics::ScoringBackend;
use framescore_core::sequence::Sequence;
use framescore_core::validate::LayoutSet;
use ndarray::Array2;

/// Deterministic pseudo-random values in [0, 1) (64-bit LCG).
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407))
    }

    pub fn next_f32(&mut self) -> f32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 40) as f32) / (1u64 << 24) as f32
    }
}

/// Smooth textured plane: diagonal gradient plus a sine pattern, in [0, 1].
pub fn textured_plane(width: usize, height: usize, phase: f32) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(r, c)| {
        let gradient = (r + c) as f32 / (width + height) as f32;
        let wave = ((c as f32 * 0.3 + phase).sin() * (r as f32 * 0.2).cos()) * 0.25;
        (0.5 * gradient + 0.25 + wave).clamp(0.0, 1.0)
    })
}

pub fn constant_plane(width: usize, height: usize, value: f32) -> Array2<f32> {
    Array2::from_elem((height, width), value)
}

/// `plane` with uniform noise of amplitude `amount` added, clamped to [0, 1].
pub fn noisy(plane: &Array2<f32>, amount: f32, seed: u64) -> Array2<f32> {
    let mut rng = Lcg::new(seed);
    plane.mapv(|v| (v + (rng.next_f32() - 0.5) * 2.0 * amount).clamp(0.0, 1.0))
}

/// Round a float plane to `bits`-bit integer levels.
pub fn quantize(plane: &Array2<f32>, bits: u32) -> Array2<f32> {
    let max = ((1u32 << bits) - 1) as f32;
    plane.mapv(|v| (v.clamp(0.0, 1.0) * max).round() / max)
}

/// `frames` GRAYS frames of a slowly moving texture.
pub fn gray_sequence(width: usize, height: usize, frames: usize) -> Sequence {
    let frames = (0..frames)
        .map(|i| Frame::gray(textured_plane(width, height, i as f32 * 0.1)))
        .collect();
    Sequence::from_frames(frames).unwrap()
}

/// `reference` with per-frame noise.
pub fn distorted_sequence(reference: &Sequence, amount: f32) -> Sequence {
    let frames = reference
        .frames()
        .enumerate()
        .map(|(i, frame)| {
            let frame = frame.unwrap();
            let planes = frame
                .planes
                .iter()
                .enumerate()
                .map(|(p, plane)| noisy(plane, amount, (i * 7 + p) as u64 + 1))
                .collect();
            Frame::new(planes, frame.layout).unwrap()
        })
        .collect();
    Sequence::from_frames(frames).unwrap()
}

/// Three-plane frame of `layout` built from phase-shifted textures. Chroma
/// planes follow the layout's subsampling.
pub fn color_frame(layout: PixelLayout, width: usize, height: usize, phase: f32) -> Frame {
    let planes = (0..3)
        .map(|p| {
            let (h, w) = layout.plane_dims(p, width, height);
            textured_plane(w, h, phase + p as f32)
        })
        .collect();
    Frame::new(planes, layout).unwrap()
}

pub fn color_sequence(layout: PixelLayout, width: usize, height: usize, frames: usize) -> Sequence {
    let frames = (0..frames)
        .map(|i| color_frame(layout, width, height, i as f32 * 0.1))
        .collect();
    Sequence::from_frames(frames).unwrap()
}

/// Gray frame whose pixel at (row, col) encodes its position.
pub fn position_frame(width: usize, height: usize) -> Frame {
    Frame::gray(Array2::from_shape_fn((height, width), |(r, c)| {
        (r * width + c) as f32 / (width * height) as f32
    }))
}

/// Full-reference backend returning the mean absolute difference of plane 0
/// and counting its invocations.
#[derive(Clone, Default)]
pub struct CountingBackend {
    pub calls: Arc<AtomicUsize>,
    pub fail_at: Option<f32>,
}

impl CountingBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ScoringBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::from(PixelLayout::GRAYS)
    }

    fn props(&self, _layout: PixelLayout) -> Result<Vec<String>> {
        Ok(vec!["counting_mad".to_string()])
    }

    fn full_reference(&self) -> bool {
        true
    }

    fn score(&self, reference: &Frame, distorted: Option<&Frame>) -> Result<Vec<(String, f64)>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let distorted = distorted.ok_or_else(|| MetricError::MissingInput {
            metric: "counting".to_string(),
        })?;
        if let Some(marker) = self.fail_at {
            if reference.plane(0)[[0, 0]] == marker {
                return Err(MetricError::Backend("refusing marked frame".to_string()));
            }
        }
        let diff: f64 = reference
            .plane(0)
            .iter()
            .zip(distorted.plane(0).iter())
            .map(|(a, b)| (a - b).abs() as f64)
            .sum();
        Ok(vec![(
            "counting_mad".to_string(),
            diff / reference.plane(0).len() as f64,
        )])
    }
}

/// Build a minimal 178-byte SER header.
pub fn build_ser_header(
    width: u32,
    height: u32,
    bit_depth: u32,
    num_frames: u32,
    color_id: i32,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(178);
    buf.extend_from_slice(b"LUCAM-RECORDER");
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&color_id.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    buf.extend_from_slice(&(num_frames as i32).to_le_bytes());
    buf.extend_from_slice(&[0u8; 40]);
    buf.extend_from_slice(&[0u8; 40]);
    buf.extend_from_slice(&[0u8; 40]);
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf.extend_from_slice(&0u64.to_le_bytes());
    assert_eq!(buf.len(), 178);
    buf
}
