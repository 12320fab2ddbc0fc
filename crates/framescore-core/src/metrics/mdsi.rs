use std::sync::Arc;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};
use crate::filters::convolve::{box_average, prewitt_magnitude, subsample};
use crate::filters::{resize_plane, ResampleFilter};
use crate::frame::{Frame, PixelLayout};
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

use super::{
    auto_downsample_factor, compute_with, to_8bit_scale, FrameScore, FrameScorer, Metric,
};

const C1: f64 = 140.0;
const C2: f64 = 55.0;
const C3: f64 = 550.0;

const MAP_NAMES: [&str; 3] = [
    "gradient_map",
    "chromaticity_map",
    "gradient_chromaticity_map",
];

/// Mean deviation similarity index over gradient and chromaticity
/// similarity, pooled with a fourth-root deviation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Mdsi {
    /// Resize factor applied before the automatic downsampling.
    pub resolution_scale: f64,
    /// Weight of gradient similarity against chromaticity similarity.
    pub alpha: f64,
}

impl Default for Mdsi {
    fn default() -> Self {
        Self {
            resolution_scale: 1.0,
            alpha: 0.6,
        }
    }
}

impl Mdsi {
    fn working_dims(&self, width: usize, height: usize) -> (usize, usize, usize) {
        let w = ((width as f64 * self.resolution_scale).round() as usize).max(1);
        let h = ((height as f64 * self.resolution_scale).round() as usize).max(1);
        (w, h, auto_downsample_factor(w, h))
    }
}

impl Metric for Mdsi {
    fn name(&self) -> &str {
        "mdsi"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::new([
            PixelLayout::RGB24,
            PixelLayout::RGB30,
            PixelLayout::RGB48,
            PixelLayout::RGBS,
        ])
    }

    fn props(&self, _layout: PixelLayout) -> Result<Vec<String>> {
        Ok(vec!["mdsi".to_string()])
    }

    fn auxiliary_outputs(&self) -> &[&'static str] {
        &MAP_NAMES
    }

    fn requires_reference(&self) -> bool {
        true
    }

    fn compute(
        &self,
        reference: &Sequence,
        distorted: Option<&Sequence>,
    ) -> Result<ScoredSequence> {
        let scale_ok = self.resolution_scale.is_finite() && self.resolution_scale > 0.0;
        if !scale_ok || !(0.0..=1.0).contains(&self.alpha) {
            return Err(MetricError::InvalidParameter(format!(
                "MDSI needs resolution_scale > 0 and alpha in [0, 1], got {} and {}",
                self.resolution_scale, self.alpha
            )));
        }
        compute_with(self, Arc::new(self.clone()), reference, distorted)
    }
}

impl FrameScorer for Mdsi {
    fn score(&self, reference: &Frame, distorted: Option<&Frame>, want_maps: bool) -> Result<FrameScore> {
        let distorted = distorted.ok_or_else(|| MetricError::MissingInput {
            metric: "mdsi".to_string(),
        })?;
        let (w, h, factor) = self.working_dims(reference.width(), reference.height());
        let prepare = |frame: &Frame| -> Vec<Array2<f64>> {
            frame
                .planes
                .iter()
                .map(|plane| {
                    let plane = if (h, w) != plane.dim() {
                        resize_plane(plane, h, w, ResampleFilter::Bicubic)
                    } else {
                        plane.clone()
                    };
                    let plane = to_8bit_scale(&plane);
                    subsample(&box_average(&plane, factor), factor)
                })
                .collect()
        };
        let r = prepare(reference);
        let d = prepare(distorted);

        let maps = similarity_maps(&r, &d, self.alpha);
        let mdsi = deviation_pooling(&maps.gcs);

        let mut score = FrameScore::default().prop("mdsi", mdsi);
        if want_maps {
            score = score
                .map("gradient_map", maps.gs.mapv(|v| v as f32))
                .map("chromaticity_map", maps.cs.mapv(|v| v as f32))
                .map("gradient_chromaticity_map", maps.gcs.mapv(|v| v as f32));
        }
        Ok(score)
    }

    fn map_shape(&self, _name: &str, width: usize, height: usize) -> (usize, usize) {
        let (w, h, factor) = self.working_dims(width, height);
        (h.div_ceil(factor), w.div_ceil(factor))
    }
}

struct SimilarityMaps {
    gs: Array2<f64>,
    cs: Array2<f64>,
    gcs: Array2<f64>,
}

/// Luminance (L) and two opponent chromaticity channels (H, M).
fn opponent(rgb: &[Array2<f64>]) -> (Array2<f64>, Array2<f64>, Array2<f64>) {
    let (r, g, b) = (&rgb[0], &rgb[1], &rgb[2]);
    let l = r * 0.2989 + g * 0.5870 + b * 0.1140;
    let hc = r * 0.30 + g * 0.04 - b * 0.35;
    let m = r * 0.34 - g * 0.60 + b * 0.17;
    (l, hc, m)
}

fn similarity_maps(reference: &[Array2<f64>], distorted: &[Array2<f64>], alpha: f64) -> SimilarityMaps {
    let (l1, h1, m1) = opponent(reference);
    let (l2, h2, m2) = opponent(distorted);
    let fused = (&l1 + &l2) * 0.5;

    let g_r = prewitt_magnitude(&l1);
    let g_d = prewitt_magnitude(&l2);
    let g_f = prewitt_magnitude(&fused);

    let sim = |a: f64, b: f64, c: f64| (2.0 * a * b + c) / (a * a + b * b + c);
    let mut gs = Array2::<f64>::zeros(l1.dim());
    Zip::from(&mut gs)
        .and(&g_r)
        .and(&g_d)
        .and(&g_f)
        .for_each(|out, &r, &d, &f| {
            *out = sim(r, d, C1) + sim(d, f, C2) - sim(r, f, C2);
        });

    let mut cs = Array2::<f64>::zeros(l1.dim());
    Zip::from(&mut cs)
        .and(&h1)
        .and(&h2)
        .and(&m1)
        .and(&m2)
        .for_each(|out, &ha, &hb, &ma, &mb| {
            *out = (2.0 * (ha * hb + ma * mb) + C3) / (ha * ha + hb * hb + ma * ma + mb * mb + C3);
        });

    let gcs = Zip::from(&gs)
        .and(&cs)
        .map_collect(|&g, &c| alpha * g + (1.0 - alpha) * c);

    SimilarityMaps { gs, cs, gcs }
}

/// `(mean |q - mean(q)|)^(1/4)` with `q = sign(x) |x|^(1/4)`.
fn deviation_pooling(gcs: &Array2<f64>) -> f64 {
    let q = gcs.mapv(|v| v.signum() * v.abs().powf(0.25));
    let mean = q.mean().unwrap_or(0.0);
    let mad = q.mapv(|v| (v - mean).abs()).mean().unwrap_or(0.0);
    mad.powf(0.25)
}
