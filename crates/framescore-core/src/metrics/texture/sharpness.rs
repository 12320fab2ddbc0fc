use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame::PixelLayout;
use crate::metrics::{compute_with, input_layout, Metric};
use crate::naming::expand;
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

use super::{PlaneDescriptor, PlaneScorer};

/// Laplacian variance on the 8-bit scale. Higher means sharper.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Sharpness {
    pub planes: Vec<usize>,
}

impl Default for Sharpness {
    fn default() -> Self {
        Self { planes: vec![0] }
    }
}

impl Metric for Sharpness {
    fn name(&self) -> &str {
        "sharpness"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::float()
    }

    fn props(&self, layout: PixelLayout) -> Result<Vec<String>> {
        expand(&["sharpness"], layout, &self.planes)
    }

    fn requires_reference(&self) -> bool {
        false
    }

    fn compute(
        &self,
        reference: &Sequence,
        distorted: Option<&Sequence>,
    ) -> Result<ScoredSequence> {
        let layout = input_layout(self, reference, distorted)?;
        let scorer = PlaneScorer::new(LaplacianVariance, Some(&self.planes), layout)?;
        compute_with(self, Arc::new(scorer), reference, distorted)
    }
}

struct LaplacianVariance;

impl PlaneDescriptor for LaplacianVariance {
    fn base_names(&self) -> &[&'static str] {
        &["sharpness"]
    }

    fn describe(&self, plane: &Array2<f32>) -> Vec<f64> {
        let scaled = plane.mapv(|v| (v * 255.0).floor());
        vec![laplacian_variance(&scaled)]
    }
}

/// Variance of the 4-neighbour Laplacian over the interior pixels:
///
///   0  1  0
///   1 -4  1
///   0  1  0
pub fn laplacian_variance(data: &Array2<f32>) -> f64 {
    let (h, w) = data.dim();
    if h < 3 || w < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let count = ((h - 2) * (w - 2)) as f64;

    for row in 1..h - 1 {
        for col in 1..w - 1 {
            let lap = -4.0 * data[[row, col]] as f64
                + data[[row - 1, col]] as f64
                + data[[row + 1, col]] as f64
                + data[[row, col - 1]] as f64
                + data[[row, col + 1]] as f64;
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0)
}
