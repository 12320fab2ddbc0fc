use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};
use crate::frame::{Frame, PixelLayout};
use crate::metrics::{compute_with, FrameScore, FrameScorer, Metric};
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

/// Local binary pattern code variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LbpMethod {
    /// Plain `sum(s_i * 2^i)`.
    Default,
    /// Rotation invariant: minimum over bit rotations.
    Ror,
    /// Rotation invariant uniform patterns (`points + 2` codes).
    #[default]
    Uniform,
    /// Uniform patterns without rotation invariance.
    NriUniform,
    /// Rotation invariant local variance.
    Var,
}

/// Entropy of the local binary pattern histogram of plane 0.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalBinaryPattern {
    pub radius: f64,
    pub points: usize,
    pub method: LbpMethod,
}

impl Default for LocalBinaryPattern {
    fn default() -> Self {
        Self {
            radius: 3.0,
            points: 24,
            method: LbpMethod::Uniform,
        }
    }
}

impl Metric for LocalBinaryPattern {
    fn name(&self) -> &str {
        "lbp"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::from(PixelLayout::GRAYS)
    }

    fn props(&self, _layout: PixelLayout) -> Result<Vec<String>> {
        Ok(vec!["texture".to_string()])
    }

    fn auxiliary_outputs(&self) -> &[&'static str] {
        &["lbp_map"]
    }

    fn requires_reference(&self) -> bool {
        false
    }

    fn compute(
        &self,
        reference: &Sequence,
        distorted: Option<&Sequence>,
    ) -> Result<ScoredSequence> {
        if self.points == 0 || self.points > 32 || self.radius <= 0.0 {
            return Err(MetricError::InvalidParameter(format!(
                "LBP needs 1..=32 points and a positive radius, got {} and {}",
                self.points, self.radius
            )));
        }
        compute_with(self, Arc::new(self.clone()), reference, distorted)
    }
}

impl FrameScorer for LocalBinaryPattern {
    fn score(&self, reference: &Frame, _: Option<&Frame>, want_maps: bool) -> Result<FrameScore> {
        let codes = local_binary_pattern(reference.plane(0), self.points, self.radius, self.method);
        let mut score = FrameScore::default().prop("texture", histogram_entropy(&codes));
        if want_maps {
            let max = codes.iter().copied().fold(0.0f64, f64::max);
            let map = if max > 0.0 {
                codes.mapv(|v| (v / max) as f32)
            } else {
                codes.mapv(|_| 0.0)
            };
            score = score.map("lbp_map", map);
        }
        Ok(score)
    }
}

/// Bilinear sample with zeros outside the image.
fn sample(image: &Array2<f32>, r: f64, c: f64) -> f64 {
    let (h, w) = image.dim();
    let at = |rr: isize, cc: isize| -> f64 {
        if rr < 0 || cc < 0 || rr >= h as isize || cc >= w as isize {
            0.0
        } else {
            image[[rr as usize, cc as usize]] as f64
        }
    };
    let r0 = r.floor();
    let c0 = c.floor();
    let dr = r - r0;
    let dc = c - c0;
    let (ri, ci) = (r0 as isize, c0 as isize);
    let top = (1.0 - dc) * at(ri, ci) + dc * at(ri, ci + 1);
    let bottom = (1.0 - dc) * at(ri + 1, ci) + dc * at(ri + 1, ci + 1);
    (1.0 - dr) * top + dr * bottom
}

fn rotate_right(value: u32, points: usize) -> u32 {
    let mask = if points == 32 {
        u32::MAX
    } else {
        (1u32 << points) - 1
    };
    ((value >> 1) | ((value & 1) << (points - 1))) & mask
}

/// Per-pixel LBP codes with `points` circular neighbours at `radius`.
pub fn local_binary_pattern(
    image: &Array2<f32>,
    points: usize,
    radius: f64,
    method: LbpMethod,
) -> Array2<f64> {
    let offsets: Vec<(f64, f64)> = (0..points)
        .map(|p| {
            let angle = 2.0 * PI * p as f64 / points as f64;
            let round5 = |v: f64| (v * 1e5).round() / 1e5;
            (round5(-radius * angle.sin()), round5(radius * angle.cos()))
        })
        .collect();

    Array2::from_shape_fn(image.dim(), |(r, c)| {
        let center = image[[r, c]] as f64;
        let texture: Vec<f64> = offsets
            .iter()
            .map(|&(dr, dc)| sample(image, r as f64 + dr, c as f64 + dc))
            .collect();
        let signed: Vec<u32> = texture
            .iter()
            .map(|&t| u32::from(t - center >= 0.0))
            .collect();

        match method {
            LbpMethod::Var => {
                let sum: f64 = texture.iter().sum();
                let sum_sq: f64 = texture.iter().map(|t| t * t).sum();
                let n = points as f64;
                (sum_sq - sum * sum / n) / n
            }
            LbpMethod::Default | LbpMethod::Ror => {
                let code = signed
                    .iter()
                    .enumerate()
                    .fold(0u32, |acc, (i, &s)| acc | (s << i));
                if method == LbpMethod::Ror {
                    let mut best = code;
                    let mut rotated = code;
                    for _ in 1..points {
                        rotated = rotate_right(rotated, points);
                        best = best.min(rotated);
                    }
                    best as f64
                } else {
                    code as f64
                }
            }
            LbpMethod::Uniform | LbpMethod::NriUniform => {
                let changes = signed.windows(2).filter(|w| w[0] != w[1]).count();
                let ones = signed.iter().sum::<u32>() as usize;
                if method == LbpMethod::Uniform {
                    if changes <= 2 {
                        ones as f64
                    } else {
                        (points + 1) as f64
                    }
                } else if changes > 2 {
                    (points * (points - 1) + 2) as f64
                } else if ones == 0 {
                    0.0
                } else if ones == points {
                    (points * (points - 1) + 1) as f64
                } else {
                    let first_one = signed.iter().position(|&s| s == 1).unwrap_or(0);
                    let first_zero = signed.iter().position(|&s| s == 0).unwrap_or(0);
                    let rot_index = if first_one == 0 {
                        ones - first_zero
                    } else {
                        points - first_one
                    };
                    (1 + (ones - 1) * points + rot_index) as f64
                }
            }
        }
    })
}

/// `-sum(p * log2(p + 1e-7))` over integer-width bins `0..=max`.
pub fn histogram_entropy(codes: &Array2<f64>) -> f64 {
    let max = codes.iter().copied().fold(0.0f64, f64::max);
    let bins = max as usize + 1;
    let mut hist = vec![0.0f64; bins];
    for &v in codes.iter() {
        let bin = (v.max(0.0) as usize).min(bins - 1);
        hist[bin] += 1.0;
    }
    let total: f64 = hist.iter().sum::<f64>() + 1e-7;
    -hist
        .iter()
        .map(|&h| {
            let p = h / total;
            p * (p + 1e-7).log2()
        })
        .sum::<f64>()
}
