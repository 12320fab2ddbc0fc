use std::sync::Arc;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::consts::{SSIM_SIGMA, SSIM_WINDOW};
use crate::error::{MetricError, Result};
use crate::filters::convolve::{box_average, separable_convolve, subsample};
use crate::filters::gaussian_blur::make_gaussian_kernel;
use crate::frame::{Frame, PixelLayout};
use crate::naming::expand;
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

use super::{
    auto_downsample_factor, compute_with, input_layout, FrameScore, FrameScorer, Metric,
};

/// Structural similarity on one plane; exposes the similarity map as `map`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Ssim {
    pub plane: usize,
    pub downsample: bool,
    pub k1: f64,
    pub k2: f64,
    pub dynamic_range: f64,
}

impl Default for Ssim {
    fn default() -> Self {
        Self {
            plane: 0,
            downsample: true,
            k1: 0.01,
            k2: 0.03,
            dynamic_range: 1.0,
        }
    }
}

impl Metric for Ssim {
    fn name(&self) -> &str {
        "ssim"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::known()
    }

    fn props(&self, layout: PixelLayout) -> Result<Vec<String>> {
        expand(&["ssim"], layout, &[self.plane])
    }

    fn auxiliary_outputs(&self) -> &[&'static str] {
        &["map"]
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
            .unwrap_or_else(|| "ssim".to_string());
        let scorer = SsimScorer {
            params: self.clone(),
            layout,
            key,
        };
        compute_with(self, Arc::new(scorer), reference, distorted)
    }
}

struct SsimScorer {
    params: Ssim,
    layout: PixelLayout,
    key: String,
}

impl SsimScorer {
    fn factor(&self, width: usize, height: usize) -> usize {
        if self.params.downsample {
            auto_downsample_factor(width, height)
        } else {
            1
        }
    }
}

impl FrameScorer for SsimScorer {
    fn score(&self, reference: &Frame, distorted: Option<&Frame>, want_maps: bool) -> Result<FrameScore> {
        let distorted = distorted.ok_or_else(|| MetricError::MissingInput {
            metric: "ssim".to_string(),
        })?;
        let x = reference.plane(self.params.plane).mapv(f64::from);
        let y = distorted.plane(self.params.plane).mapv(f64::from);
        let (h, w) = x.dim();
        let factor = self.factor(w, h);
        let (x, y) = if factor > 1 {
            (
                subsample(&box_average(&x, factor), factor),
                subsample(&box_average(&y, factor), factor),
            )
        } else {
            (x, y)
        };

        let map = ssim_map(&x, &y, &self.params);
        let mean = map.mean().unwrap_or(f64::NAN);
        let mut score = FrameScore::default().prop(self.key.clone(), mean);
        if want_maps {
            score = score.map("map", map.mapv(|v| v as f32));
        }
        Ok(score)
    }

    fn map_shape(&self, _name: &str, width: usize, height: usize) -> (usize, usize) {
        let (h, w) = self.layout.plane_dims(self.params.plane, width, height);
        let factor = self.factor(w, h);
        (h.div_ceil(factor), w.div_ceil(factor))
    }
}

/// Per-pixel SSIM with an 11x11 Gaussian window.
pub fn ssim_map(x: &Array2<f64>, y: &Array2<f64>, params: &Ssim) -> Array2<f64> {
    let kernel = make_gaussian_kernel::<f64>(SSIM_SIGMA as f64, SSIM_WINDOW / 2);
    let blur = |a: &Array2<f64>| separable_convolve(a, &kernel);

    let c1 = (params.k1 * params.dynamic_range).powi(2);
    let c2 = (params.k2 * params.dynamic_range).powi(2);

    let mu_x = blur(x);
    let mu_y = blur(y);
    let xx = blur(&(x * x));
    let yy = blur(&(y * y));
    let xy = blur(&(x * y));

    let mut map = Array2::<f64>::zeros(x.dim());
    Zip::from(&mut map)
        .and(&mu_x)
        .and(&mu_y)
        .and(&xx)
        .and(&yy)
        .and(&xy)
        .for_each(|out, &mx, &my, &sxx, &syy, &sxy| {
            let var_x = sxx - mx * mx;
            let var_y = syy - my * my;
            let cov = sxy - mx * my;
            *out = ((2.0 * mx * my + c1) * (2.0 * cov + c2))
                / ((mx * mx + my * my + c1) * (var_x + var_y + c2));
        });
    map
}
