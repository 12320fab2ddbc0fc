use std::sync::Arc;

use ndarray::{Array2, Zip};

use crate::consts::{VIF_SCALES, VIF_VARIANCE_FLOOR};
use crate::error::{MetricError, Result};
use crate::filters::convolve::subsample;
use crate::filters::gaussian_blur::gaussian_filter;
use crate::frame::{Frame, PixelLayout};
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

use super::{compute_with, FrameScore, FrameScorer, Metric};

/// Pixel-domain visual information fidelity on plane 0, in CIE L*.
#[derive(Clone, Copy, Debug, Default)]
pub struct Vif;

impl Metric for Vif {
    fn name(&self) -> &str {
        "vif"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::new([PixelLayout::GRAYS, PixelLayout::YUV444PS, PixelLayout::RGBS])
    }

    fn props(&self, _layout: PixelLayout) -> Result<Vec<String>> {
        Ok(vec!["vif".to_string()])
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

impl FrameScorer for Vif {
    fn score(&self, reference: &Frame, distorted: Option<&Frame>, _: bool) -> Result<FrameScore> {
        let distorted = distorted.ok_or_else(|| MetricError::MissingInput {
            metric: "vif".to_string(),
        })?;
        let value = vif(
            &reference.plane(0).mapv(f64::from),
            &distorted.plane(0).mapv(f64::from),
        );
        Ok(FrameScore::default().prop("vif", value))
    }
}

/// CIE L* from relative luminance.
fn lightness(y: f64) -> f64 {
    if y > 0.008856 {
        116.0 * y.cbrt() - 16.0
    } else {
        903.3 * y
    }
}

/// VIF over four dyadic scales. Identical inputs score 1.0.
pub fn vif(reference: &Array2<f64>, distorted: &Array2<f64>) -> f64 {
    let eps = VIF_VARIANCE_FLOOR;
    let mut sigma_nsq = 0.5;
    let mut num = 0.0f64;
    let mut den = 0.0f64;

    let mut reference = reference.clone();
    let mut distorted = distorted.clone();

    for scale in 1..=VIF_SCALES {
        let n = (1usize << (VIF_SCALES - scale + 1)) + 1;
        let sd = n as f64 / 3.0;
        let truncate = 1.4;

        if scale > 1 {
            sigma_nsq = 0.1;
            reference = subsample(&gaussian_filter(&reference, 1.08, 1.5), 2);
            distorted = subsample(&gaussian_filter(&distorted, 1.08, 1.5), 2);
        }

        let l1 = reference.mapv(lightness);
        let l2 = distorted.mapv(lightness);

        let mu1 = gaussian_filter(&l1, sd, truncate);
        let mu2 = gaussian_filter(&l2, sd, truncate);
        let s11 = gaussian_filter(&(&l1 * &l1), sd, truncate);
        let s22 = gaussian_filter(&(&l2 * &l2), sd, truncate);
        let s12 = gaussian_filter(&(&l1 * &l2), sd, truncate);

        Zip::from(&mu1)
            .and(&mu2)
            .and(&s11)
            .and(&s22)
            .and(&s12)
            .for_each(|&m1, &m2, &e11, &e22, &e12| {
                let sigma1_sq = (e11 - m1 * m1).max(eps);
                let sigma2_sq = (e22 - m2 * m2).max(eps);
                let sigma12 = (e12 - m1 * m2).max(eps);

                let mut g = sigma12 / sigma1_sq;
                let sv_sq = (sigma2_sq - g * sigma12).max(0.0);
                if sigma1_sq < sigma_nsq {
                    g = 1.0;
                }

                num += (1.0 + g * g * sigma1_sq / (sv_sq + sigma_nsq)).log2();
                den += (1.0 + sigma1_sq / sigma_nsq).log2();
            });
    }

    num / den
}
