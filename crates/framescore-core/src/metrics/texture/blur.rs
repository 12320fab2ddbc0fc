use std::sync::Arc;

use ndarray::{s, Array2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};
use crate::filters::convolve::{convolve_cols, convolve_rows};
use crate::frame::PixelLayout;
use crate::metrics::{compute_with, input_layout, Metric};
use crate::naming::expand;
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

use super::{PlaneDescriptor, PlaneScorer};

/// Blur-effect estimator: 0 for sharp planes, approaching 1 as blur grows.
///
/// Compares edge strength before and after re-blurring along each axis; a
/// plane that is already blurry loses little when blurred again.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Blur {
    pub planes: Vec<usize>,
    pub h_size: usize,
}

impl Default for Blur {
    fn default() -> Self {
        Self {
            planes: vec![0],
            h_size: 11,
        }
    }
}

impl Metric for Blur {
    fn name(&self) -> &str {
        "blur"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::float()
    }

    fn props(&self, layout: PixelLayout) -> Result<Vec<String>> {
        expand(&["blur"], layout, &self.planes)
    }

    fn requires_reference(&self) -> bool {
        false
    }

    fn compute(
        &self,
        reference: &Sequence,
        distorted: Option<&Sequence>,
    ) -> Result<ScoredSequence> {
        if self.h_size == 0 {
            return Err(MetricError::InvalidParameter(
                "blur h_size must be positive".to_string(),
            ));
        }
        let layout = input_layout(self, reference, distorted)?;
        let descriptor = BlurEffect {
            h_size: self.h_size,
        };
        let scorer = PlaneScorer::new(descriptor, Some(&self.planes), layout)?;
        compute_with(self, Arc::new(scorer), reference, distorted)
    }
}

struct BlurEffect {
    h_size: usize,
}

impl PlaneDescriptor for BlurEffect {
    fn base_names(&self) -> &[&'static str] {
        &["blur"]
    }

    fn describe(&self, plane: &Array2<f32>) -> Vec<f64> {
        vec![blur_effect(&plane.mapv(f64::from), self.h_size)]
    }
}

/// Absolute Sobel response along `axis` (1 = horizontal derivative).
fn sobel_abs(data: &Array2<f64>, axis: Axis) -> Array2<f64> {
    let derivative = [1.0, 0.0, -1.0];
    let smooth = [0.25, 0.5, 0.25];
    let out = if axis == Axis(1) {
        convolve_cols(&convolve_rows(data, &derivative), &smooth)
    } else {
        convolve_rows(&convolve_cols(data, &derivative), &smooth)
    };
    out.mapv(f64::abs)
}

/// Maximum over both axes of `|M1 - M2| / M1`, where `M1` sums the sharp
/// edge response and `M2` the part of it that survives an `h_size` uniform
/// blur, both over the interior `[2, n - 1)`.
///
/// Planes without any edges score 1.
pub fn blur_effect(plane: &Array2<f64>, h_size: usize) -> f64 {
    let (h, w) = plane.dim();
    if h < 4 || w < 4 {
        return 1.0;
    }
    let uniform = vec![1.0 / h_size as f64; h_size];
    let mut worst = 0.0f64;
    for axis in [Axis(0), Axis(1)] {
        let blurred = if axis == Axis(1) {
            convolve_rows(plane, &uniform)
        } else {
            convolve_cols(plane, &uniform)
        };
        let sharp = sobel_abs(plane, axis);
        let soft = sobel_abs(&blurred, axis);
        let interior = s![2..h - 1, 2..w - 1];
        let m1 = sharp.slice(interior).sum();
        let mut m2 = 0.0;
        Zip::from(sharp.slice(interior))
            .and(soft.slice(interior))
            .for_each(|&a, &b| m2 += (a - b).max(0.0));
        let b = if m1 > 0.0 { (m1 - m2).abs() / m1 } else { 1.0 };
        worst = worst.max(b);
    }
    worst
}
