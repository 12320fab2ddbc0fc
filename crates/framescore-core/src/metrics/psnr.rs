use std::sync::Arc;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::consts::{RGB_PLANE_WEIGHTS, YUV_PLANE_WEIGHTS};
use crate::error::{MetricError, Result};
use crate::frame::{ColorFamily, Frame, PixelLayout};
use crate::naming::expand;
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

use super::{compute_with, input_layout, resolve_planes, FrameScore, FrameScorer, Metric};

/// How per-plane PSNR values are combined into the `psnr` total.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsnrWeights {
    /// Per-plane values only.
    #[default]
    None,
    /// Colorimetric weights for RGB, chroma down-weighted for YUV.
    Auto,
    /// One weight per requested plane, in the order the planes were given.
    Custom(Vec<f64>),
}

/// Peak signal-to-noise ratio per plane, optionally combined across planes
/// in the power domain.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Psnr {
    pub weights: PsnrWeights,
    /// `None` means every plane.
    pub planes: Option<Vec<usize>>,
}

impl Psnr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(mut self, weights: PsnrWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_planes(mut self, planes: Vec<usize>) -> Self {
        self.planes = Some(planes);
        self
    }

    fn weighted(&self, layout: PixelLayout) -> bool {
        self.weights != PsnrWeights::None && layout.family != ColorFamily::Gray
    }

    fn plane_weights(&self, layout: PixelLayout, planes: &[usize]) -> Result<Option<Vec<f64>>> {
        if !self.weighted(layout) {
            return Ok(None);
        }
        let weights = match &self.weights {
            PsnrWeights::None => return Ok(None),
            PsnrWeights::Auto => {
                let table = match layout.family {
                    ColorFamily::Rgb => RGB_PLANE_WEIGHTS,
                    _ => YUV_PLANE_WEIGHTS,
                };
                planes.iter().map(|&p| table[p]).collect()
            }
            PsnrWeights::Custom(custom) => {
                if custom.len() != planes.len() {
                    return Err(MetricError::InvalidParameter(format!(
                        "{} PSNR weights given for {} planes",
                        custom.len(),
                        planes.len()
                    )));
                }
                custom.clone()
            }
        };
        if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
            return Err(MetricError::InvalidParameter(format!(
                "PSNR weights must be non-negative with a positive sum, got {weights:?}"
            )));
        }
        Ok(Some(weights))
    }
}

impl Metric for Psnr {
    fn name(&self) -> &str {
        "psnr"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::known()
    }

    fn props(&self, layout: PixelLayout) -> Result<Vec<String>> {
        let planes = resolve_planes(self.planes.as_deref(), layout);
        if layout.family == ColorFamily::Gray {
            crate::naming::check_planes(layout, &planes)?;
            return Ok(vec!["psnr_gray".to_string()]);
        }
        let mut keys = expand(&["psnr"], layout, &planes)?;
        if self.weighted(layout) {
            keys.push("psnr".to_string());
        }
        Ok(keys)
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
        let requested = resolve_planes(self.planes.as_deref(), layout);
        let keys = self.props(layout)?;
        let weights = self.plane_weights(layout, &requested)?;

        // Custom weights follow the requested plane order; keep each bound
        // to its plane while ordering planes like the keys.
        let mut bound: Vec<(usize, Option<f64>)> = match &weights {
            Some(weights) => requested
                .iter()
                .copied()
                .zip(weights.iter().copied().map(Some))
                .collect(),
            None => requested.iter().map(|&p| (p, None)).collect(),
        };
        bound.sort_by_key(|&(plane, _)| plane);
        bound.dedup_by_key(|&mut (plane, _)| plane);
        let planes: Vec<usize> = bound.iter().map(|&(plane, _)| plane).collect();
        let weights = weights.map(|_| bound.iter().filter_map(|&(_, w)| w).collect());

        let scorer = PsnrScorer {
            planes,
            keys,
            weights,
        };
        compute_with(self, Arc::new(scorer), reference, distorted)
    }
}

struct PsnrScorer {
    planes: Vec<usize>,
    /// One key per plane, then `psnr` when weighted.
    keys: Vec<String>,
    weights: Option<Vec<f64>>,
}

impl FrameScorer for PsnrScorer {
    fn score(&self, reference: &Frame, distorted: Option<&Frame>, _: bool) -> Result<FrameScore> {
        let distorted = distorted.ok_or_else(|| MetricError::MissingInput {
            metric: "psnr".to_string(),
        })?;
        let values: Vec<f64> = self
            .planes
            .iter()
            .map(|&p| plane_psnr(reference.plane(p), distorted.plane(p)))
            .collect();

        let mut score = FrameScore::default();
        for (key, value) in self.keys.iter().zip(&values) {
            score = score.prop(key.clone(), *value);
        }
        if let Some(weights) = &self.weights {
            score = score.prop("psnr", combine_psnr(&values, weights));
        }
        Ok(score)
    }
}

/// `10 * log10(1 / MSE)` on normalized samples; `+inf` for identical planes.
pub fn plane_psnr(reference: &Array2<f32>, distorted: &Array2<f32>) -> f64 {
    let mse = mean_squared_error(reference, distorted);
    if mse == 0.0 {
        f64::INFINITY
    } else {
        -10.0 * mse.log10()
    }
}

pub fn mean_squared_error(reference: &Array2<f32>, distorted: &Array2<f32>) -> f64 {
    let mut sum = 0.0f64;
    Zip::from(reference).and(distorted).for_each(|&a, &b| {
        let d = a as f64 - b as f64;
        sum += d * d;
    });
    sum / reference.len() as f64
}

/// Weighted PSNR combination in the linear power domain:
/// `-10 * log10(sum(w * 10^(-psnr / 10)) / sum(w))`.
///
/// Infinite plane values contribute zero noise power; the total is `+inf`
/// only when every weighted plane is.
pub fn combine_psnr(values: &[f64], weights: &[f64]) -> f64 {
    let total_weight: f64 = weights.iter().sum();
    let noise: f64 = values
        .iter()
        .zip(weights)
        .map(|(&psnr, &w)| {
            if psnr.is_infinite() && psnr > 0.0 {
                0.0
            } else {
                w * 10f64.powf(-psnr / 10.0)
            }
        })
        .sum();
    if noise == 0.0 {
        f64::INFINITY
    } else {
        -10.0 * (noise / total_weight).log10()
    }
}
