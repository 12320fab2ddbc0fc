use std::sync::Arc;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};
use crate::filters::convolve::{downsample_2x, prewitt_magnitude};
use crate::frame::{Frame, PixelLayout};
use crate::naming::expand;
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

use super::{compute_with, input_layout, FrameScore, FrameScorer, Metric};

/// Gradient magnitude similarity deviation.
///
/// The frame score is the standard deviation of the gradient similarity
/// map (0 for identical frames, larger means more distortion). The map is
/// exposed as `gradient_map`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Gmsd {
    pub plane: usize,
    pub downsample: bool,
    /// Stability constant for samples in [0, 1].
    pub c: f64,
}

impl Default for Gmsd {
    fn default() -> Self {
        Self {
            plane: 0,
            downsample: true,
            c: 0.0026,
        }
    }
}

impl Metric for Gmsd {
    fn name(&self) -> &str {
        "gmsd"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::known()
    }

    fn props(&self, layout: PixelLayout) -> Result<Vec<String>> {
        expand(&["gmsd"], layout, &[self.plane])
    }

    fn auxiliary_outputs(&self) -> &[&'static str] {
        &["gradient_map"]
    }

    fn requires_reference(&self) -> bool {
        true
    }

    fn compute(
        &self,
        reference: &Sequence,
        distorted: Option<&Sequence>,
    ) -> Result<ScoredSequence> {
        let layout = input_layout(self, reference, distorted)?;
        let key = self
            .props(layout)?
            .into_iter()
            .next()
            .unwrap_or_else(|| "gmsd".to_string());
        let scorer = GmsdScorer {
            params: self.clone(),
            layout,
            key,
        };
        compute_with(self, Arc::new(scorer), reference, distorted)
    }
}

struct GmsdScorer {
    params: Gmsd,
    layout: PixelLayout,
    key: String,
}

impl FrameScorer for GmsdScorer {
    fn score(&self, reference: &Frame, distorted: Option<&Frame>, want_maps: bool) -> Result<FrameScore> {
        let distorted = distorted.ok_or_else(|| MetricError::MissingInput {
            metric: "gmsd".to_string(),
        })?;
        let mut x = reference.plane(self.params.plane).mapv(f64::from);
        let mut y = distorted.plane(self.params.plane).mapv(f64::from);
        if self.params.downsample {
            x = downsample_2x(&x);
            y = downsample_2x(&y);
        }

        let map = gradient_similarity(&x, &y, self.params.c);
        let deviation = map.std(0.0);
        let mut score = FrameScore::default().prop(self.key.clone(), deviation);
        if want_maps {
            score = score.map("gradient_map", map.mapv(|v| v as f32));
        }
        Ok(score)
    }

    fn map_shape(&self, _name: &str, width: usize, height: usize) -> (usize, usize) {
        let (h, w) = self.layout.plane_dims(self.params.plane, width, height);
        if self.params.downsample {
            ((h / 2).max(1), (w / 2).max(1))
        } else {
            (h, w)
        }
    }
}

/// `(2 g1 g2 + c) / (g1^2 + g2^2 + c)` over Prewitt gradient magnitudes.
pub fn gradient_similarity(x: &Array2<f64>, y: &Array2<f64>, c: f64) -> Array2<f64> {
    let gx = prewitt_magnitude(x);
    let gy = prewitt_magnitude(y);
    Zip::from(&gx)
        .and(&gy)
        .map_collect(|&a, &b| (2.0 * a * b + c) / (a * a + b * b + c))
}
