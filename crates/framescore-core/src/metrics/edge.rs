use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::filters::convolve::prewitt_magnitude;
use crate::frame::{Frame, PixelLayout};
use crate::naming::expand;
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

use super::{compute_with, input_layout, resolve_planes, FrameScore, FrameScorer, Metric};

const OPERATORS: [&str; 3] = ["min", "average", "max"];

/// Prewitt edge-mask statistics per plane.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Edge {
    /// `None` means every plane.
    pub planes: Option<Vec<usize>>,
}

impl Edge {
    fn planes(&self, layout: PixelLayout) -> Vec<usize> {
        let mut planes = resolve_planes(self.planes.as_deref(), layout);
        planes.sort_unstable();
        planes.dedup();
        planes
    }
}

impl Metric for Edge {
    fn name(&self) -> &str {
        "edge"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::known()
    }

    fn props(&self, layout: PixelLayout) -> Result<Vec<String>> {
        let bases = expand(&["edge"], layout, &self.planes(layout))?;
        Ok(bases
            .iter()
            .flat_map(|base| OPERATORS.iter().map(move |op| format!("{base}_{op}")))
            .collect())
    }

    fn auxiliary_outputs(&self) -> &[&'static str] {
        &["edge_map"]
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
        let scorer = EdgeScorer {
            planes: self.planes(layout),
            keys: self.props(layout)?,
            layout,
        };
        compute_with(self, Arc::new(scorer), reference, distorted)
    }
}

struct EdgeScorer {
    planes: Vec<usize>,
    keys: Vec<String>,
    layout: PixelLayout,
}

impl FrameScorer for EdgeScorer {
    fn score(&self, reference: &Frame, _: Option<&Frame>, want_maps: bool) -> Result<FrameScore> {
        let mut score = FrameScore::default();
        let mut keys = self.keys.iter();
        let mut first_mask = None;
        for &p in &self.planes {
            let mask = edge_mask(reference.plane(p));
            let (min, max) = mask
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                    (lo.min(v), hi.max(v))
                });
            let average = mask.iter().map(|&v| v as f64).sum::<f64>() / mask.len() as f64;
            for value in [min as f64, average, max as f64] {
                if let Some(key) = keys.next() {
                    score = score.prop(key.clone(), value);
                }
            }
            if want_maps && first_mask.is_none() {
                first_mask = Some(mask);
            }
        }
        if let Some(mask) = first_mask {
            score = score.map("edge_map", mask);
        }
        Ok(score)
    }

    fn map_shape(&self, _name: &str, width: usize, height: usize) -> (usize, usize) {
        let plane = self.planes.first().copied().unwrap_or(0);
        self.layout.plane_dims(plane, width, height)
    }
}

/// Prewitt gradient magnitude clamped to [0, 1].
pub fn edge_mask(plane: &Array2<f32>) -> Array2<f32> {
    prewitt_magnitude(plane).mapv(|v| v.clamp(0.0, 1.0))
}
