use std::sync::Arc;

use ndarray::Array2;

use crate::error::Result;
use crate::frame::{Frame, PixelLayout};
use crate::metrics::{compute_with, FrameScore, FrameScorer, Metric};
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

const LEVELS: usize = 256;

const KEYS: [&str; 5] = [
    "texture_contrast",
    "texture_dissimilarity",
    "texture_homogeneity",
    "texture_energy",
    "texture_correlation",
];

/// Gray-level co-occurrence properties of plane 0 (distance 1, angle 0,
/// symmetric, normalized).
#[derive(Clone, Copy, Debug, Default)]
pub struct Glcm;

impl Metric for Glcm {
    fn name(&self) -> &str {
        "glcm"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::from(PixelLayout::GRAYS)
    }

    fn props(&self, _layout: PixelLayout) -> Result<Vec<String>> {
        Ok(KEYS.iter().map(|k| k.to_string()).collect())
    }

    fn requires_reference(&self) -> bool {
        false
    }

    fn compute(
        &self,
        reference: &Sequence,
        distorted: Option<&Sequence>,
    ) -> Result<ScoredSequence> {
        compute_with(self, Arc::new(*self), reference, distorted)
    }
}

impl FrameScorer for Glcm {
    fn score(&self, reference: &Frame, _: Option<&Frame>, _: bool) -> Result<FrameScore> {
        let matrix = co_occurrence(reference.plane(0));
        let props = GlcmProperties::from_matrix(&matrix);
        Ok(FrameScore::default()
            .prop(KEYS[0], props.contrast)
            .prop(KEYS[1], props.dissimilarity)
            .prop(KEYS[2], props.homogeneity)
            .prop(KEYS[3], props.energy)
            .prop(KEYS[4], props.correlation))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlcmProperties {
    pub contrast: f64,
    pub dissimilarity: f64,
    pub homogeneity: f64,
    pub energy: f64,
    pub correlation: f64,
}

impl GlcmProperties {
    pub fn from_matrix(p: &Array2<f64>) -> Self {
        let mut contrast = 0.0;
        let mut dissimilarity = 0.0;
        let mut homogeneity = 0.0;
        let mut asm = 0.0;
        let mut mean_i = 0.0;
        let mut mean_j = 0.0;
        for ((i, j), &v) in p.indexed_iter() {
            let d = i as f64 - j as f64;
            contrast += v * d * d;
            dissimilarity += v * d.abs();
            homogeneity += v / (1.0 + d * d);
            asm += v * v;
            mean_i += v * i as f64;
            mean_j += v * j as f64;
        }

        let mut var_i = 0.0;
        let mut var_j = 0.0;
        let mut cov = 0.0;
        for ((i, j), &v) in p.indexed_iter() {
            let di = i as f64 - mean_i;
            let dj = j as f64 - mean_j;
            var_i += v * di * di;
            var_j += v * dj * dj;
            cov += v * di * dj;
        }
        let (std_i, std_j) = (var_i.sqrt(), var_j.sqrt());
        // Constant images are perfectly correlated.
        let correlation = if std_i < 1e-15 || std_j < 1e-15 {
            1.0
        } else {
            cov / (std_i * std_j)
        };

        Self {
            contrast,
            dissimilarity,
            homogeneity,
            energy: asm.sqrt(),
            correlation,
        }
    }
}

/// Normalized symmetric co-occurrence matrix of horizontally adjacent
/// 8-bit levels.
pub fn co_occurrence(plane: &Array2<f32>) -> Array2<f64> {
    let levels = plane.mapv(|v| (v * 255.0).round().clamp(0.0, 255.0) as usize);
    let mut matrix = Array2::<f64>::zeros((LEVELS, LEVELS));
    for row in levels.rows() {
        for col in 1..row.len() {
            let (a, b) = (row[col - 1], row[col]);
            matrix[[a, b]] += 1.0;
            matrix[[b, a]] += 1.0;
        }
    }
    let total = matrix.sum();
    if total > 0.0 {
        matrix /= total;
    }
    matrix
}
