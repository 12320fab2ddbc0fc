use std::sync::Arc;

use ndarray::Array2;

use crate::consts::{HASH_COLUMNS, HASH_ROWS};
use crate::error::{MetricError, Result};
use crate::filters::{resize_plane, ResampleFilter};
use crate::frame::{Frame, PixelLayout};
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

use super::{compute_with, FrameScore, FrameScorer, Metric};

/// Length of a perceptual hash in bytes.
pub const HASH_LEN: usize = HASH_COLUMNS + HASH_ROWS;

/// "31 + 17" perceptual hash distance between reference and distorted luma.
#[derive(Clone, Copy, Debug, Default)]
pub struct PerceptualHash;

impl Metric for PerceptualHash {
    fn name(&self) -> &str {
        "hash_3117"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::new([PixelLayout::GRAY8, PixelLayout::GRAY16, PixelLayout::GRAYS])
    }

    fn props(&self, _layout: PixelLayout) -> Result<Vec<String>> {
        Ok(vec!["hash_3117".to_string()])
    }

    fn requires_reference(&self) -> bool {
        true
    }

    fn compute(
        &self,
        reference: &Sequence,
        distorted: Option<&Sequence>,
    ) -> Result<ScoredSequence> {
        compute_with(self, Arc::new(*self), reference, distorted)
    }
}

impl FrameScorer for PerceptualHash {
    fn score(&self, reference: &Frame, distorted: Option<&Frame>, _: bool) -> Result<FrameScore> {
        let distorted = distorted.ok_or_else(|| MetricError::MissingInput {
            metric: "hash_3117".to_string(),
        })?;
        let a = perceptual_hash(reference.plane(0));
        let b = perceptual_hash(distorted.plane(0));
        Ok(FrameScore::default().prop("hash_3117", hash_distance(&a, &b) as i64))
    }
}

/// 31 column means of a 31x31 resize followed by 17 row means of a 17x17
/// resize, each stretched to 0-255.
pub fn perceptual_hash(plane: &Array2<f32>) -> [u8; HASH_LEN] {
    let columns = resize_plane(plane, HASH_COLUMNS, HASH_COLUMNS, ResampleFilter::Lanczos3);
    let column_means: Vec<f64> = (0..HASH_COLUMNS)
        .map(|c| columns.column(c).iter().map(|&v| v as f64).sum::<f64>() / HASH_COLUMNS as f64)
        .collect();

    let rows = resize_plane(plane, HASH_ROWS, HASH_ROWS, ResampleFilter::Lanczos3);
    let row_means: Vec<f64> = (0..HASH_ROWS)
        .map(|r| rows.row(r).iter().map(|&v| v as f64).sum::<f64>() / HASH_ROWS as f64)
        .collect();

    let mut hash = [0u8; HASH_LEN];
    for (slot, value) in hash
        .iter_mut()
        .zip(stretch(&column_means).into_iter().chain(stretch(&row_means)))
    {
        *slot = value;
    }
    hash
}

/// Min-max stretch to 0-255; flat vectors are only rounded.
fn stretch(values: &[f64]) -> Vec<u8> {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    values
        .iter()
        .map(|&v| {
            let scaled = if hi > lo {
                (v - lo) / (hi - lo) * 255.0
            } else {
                v
            };
            scaled.round().clamp(0.0, 255.0) as u8
        })
        .collect()
}

pub fn hex_digest(hash: &[u8; HASH_LEN]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Sum of absolute byte differences.
pub fn hash_distance(a: &[u8; HASH_LEN], b: &[u8; HASH_LEN]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x as i32 - y as i32).unsigned_abs())
        .sum()
}
