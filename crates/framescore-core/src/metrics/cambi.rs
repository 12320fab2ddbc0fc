use std::sync::Arc;

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::{CAMBI_BIT_DEPTH, CAMBI_MASK_FILTER_SIZE, CAMBI_SCALES, CAMBI_SCALE_WEIGHTS};
use crate::error::{MetricError, Result};
use crate::frame::{Frame, PixelLayout};
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

use super::{compute_with, FrameScore, FrameScorer, Metric};

/// Names of the per-scale c-value maps, finest scale first.
pub const CAMBI_MAP_NAMES: [&str; CAMBI_SCALES] =
    ["scale0", "scale1", "scale2", "scale3", "scale4"];

/// Luminance step sizes checked for banding, with their weights.
const DIFFS: [usize; 4] = [1, 2, 3, 4];
const DIFF_WEIGHTS: [f64; 4] = [1.0, 2.0, 3.0, 4.0];

/// Reference resolution the window size is expressed at.
const WINDOW_REFERENCE_DIM: f64 = 3840.0 + 2160.0;

// BT.1886 display model.
const DISPLAY_WHITE: f64 = 300.0;
const DISPLAY_BLACK: f64 = 0.01;
const DISPLAY_GAMMA: f64 = 2.4;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CambiParams {
    /// Side of the histogram window at 4K; scaled with resolution.
    pub window_size: usize,
    /// Fraction of the highest c-values pooled per scale.
    pub topk: f64,
    /// Contrast threshold of visibility (threshold-vs-intensity).
    pub tvi_threshold: f64,
    /// Multiplier applied to the exported per-scale maps.
    pub scaling: f64,
}

impl Default for CambiParams {
    fn default() -> Self {
        Self {
            window_size: 63,
            topk: 0.6,
            tvi_threshold: 0.019,
            scaling: 1.0,
        }
    }
}

/// Contrast-aware multi-scale banding index (no-reference).
#[derive(Clone, Debug, Default)]
pub struct Cambi {
    pub params: CambiParams,
}

/// CAMBI result for one frame.
#[derive(Clone, Debug)]
pub struct CambiFrame {
    pub score: f64,
    /// Scaled c-value map per scale, finest first.
    pub maps: Vec<Array2<f32>>,
}

impl Cambi {
    pub fn new(params: CambiParams) -> Self {
        Self { params }
    }

    pub fn check_params(&self) -> Result<()> {
        let p = &self.params;
        if p.window_size < 3 || !(p.topk > 0.0 && p.topk <= 1.0) || p.tvi_threshold <= 0.0 {
            return Err(MetricError::InvalidParameter(format!(
                "CAMBI needs window_size >= 3, topk in (0, 1] and tvi_threshold > 0, got {p:?}"
            )));
        }
        Ok(())
    }

    /// Score one frame's luma and build every per-scale map.
    pub fn score_frame(&self, frame: &Frame) -> Result<CambiFrame> {
        self.check_params()?;
        let luma = frame.plane(0);
        let (h, w) = luma.dim();
        let window = adjusted_window(self.params.window_size, w, h);
        let thresholds = tvi_thresholds(self.params.tvi_threshold);

        let mut image = anti_dither(&quantize(luma));
        let mut maps = Vec::with_capacity(CAMBI_SCALES);
        let mut weighted = 0.0;
        for (scale, weight) in CAMBI_SCALE_WEIGHTS.iter().enumerate() {
            if scale > 0 {
                image = downsample_levels(&image);
            }
            let mask = flat_mask(&image);
            let c_values = c_value_map(&image, &mask, window, &thresholds);
            weighted += weight * topk_pool(&c_values, self.params.topk);
            let scaling = self.params.scaling;
            maps.push(c_values.mapv(|c| (c * scaling) as f32));
        }
        let score = weighted / CAMBI_SCALE_WEIGHTS.iter().sum::<f64>();
        Ok(CambiFrame { score, maps })
    }
}

impl Metric for Cambi {
    fn name(&self) -> &str {
        "cambi"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::new([
            PixelLayout::GRAY8,
            PixelLayout::GRAY10,
            PixelLayout::YUV420P8,
            PixelLayout::YUV422P8,
            PixelLayout::YUV444P8,
            PixelLayout::YUV420P10,
            PixelLayout::YUV422P10,
            PixelLayout::YUV444P10,
        ])
    }

    fn props(&self, _layout: PixelLayout) -> Result<Vec<String>> {
        Ok(vec!["cambi".to_string()])
    }

    fn auxiliary_outputs(&self) -> &[&'static str] {
        &CAMBI_MAP_NAMES
    }

    fn requires_reference(&self) -> bool {
        false
    }

    fn compute(
        &self,
        reference: &Sequence,
        distorted: Option<&Sequence>,
    ) -> Result<ScoredSequence> {
        self.check_params()?;
        compute_with(self, Arc::new(self.clone()), reference, distorted)
    }
}

impl FrameScorer for Cambi {
    fn score(&self, reference: &Frame, _: Option<&Frame>, want_maps: bool) -> Result<FrameScore> {
        let result = self.score_frame(reference)?;
        let mut score = FrameScore::default().prop("cambi", result.score);
        if want_maps {
            for (name, map) in CAMBI_MAP_NAMES.iter().zip(result.maps) {
                score = score.map(*name, map);
            }
        }
        Ok(score)
    }

    fn map_shape(&self, name: &str, width: usize, height: usize) -> (usize, usize) {
        let scale = CAMBI_MAP_NAMES
            .iter()
            .position(|n| *n == name)
            .unwrap_or(0);
        (0..scale).fold((height, width), |(h, w), _| ((h / 2).max(1), (w / 2).max(1)))
    }
}

fn quantize(plane: &Array2<f32>) -> Array2<u16> {
    let max = ((1u32 << CAMBI_BIT_DEPTH) - 1) as f32;
    plane.mapv(|v| (v.clamp(0.0, 1.0) * max).round() as u16)
}

/// 2x2 average (bottom/right edges clamped) to suppress dither noise.
fn anti_dither(image: &Array2<u16>) -> Array2<u16> {
    let (h, w) = image.dim();
    Array2::from_shape_fn((h, w), |(r, c)| {
        let r1 = (r + 1).min(h - 1);
        let c1 = (c + 1).min(w - 1);
        let sum = image[[r, c]] as u32
            + image[[r, c1]] as u32
            + image[[r1, c]] as u32
            + image[[r1, c1]] as u32;
        (sum / 4) as u16
    })
}

fn downsample_levels(image: &Array2<u16>) -> Array2<u16> {
    let (h, w) = image.dim();
    let (nh, nw) = ((h / 2).max(1), (w / 2).max(1));
    Array2::from_shape_fn((nh, nw), |(r, c)| {
        let r0 = (2 * r).min(h - 1);
        let r1 = (2 * r + 1).min(h - 1);
        let c0 = (2 * c).min(w - 1);
        let c1 = (2 * c + 1).min(w - 1);
        let sum = image[[r0, c0]] as u32
            + image[[r0, c1]] as u32
            + image[[r1, c0]] as u32
            + image[[r1, c1]] as u32;
        ((sum + 2) / 4) as u16
    })
}

/// Window side for a `width` x `height` frame (odd, at least 3).
fn adjusted_window(window_size: usize, width: usize, height: usize) -> usize {
    let scaled = (window_size as f64 * (width + height) as f64 / WINDOW_REFERENCE_DIM).round();
    let side = (scaled as usize).max(3);
    side | 1
}

/// A pixel is flat when most of its neighbourhood has zero horizontal and
/// vertical derivative.
fn flat_mask(image: &Array2<u16>) -> Array2<bool> {
    let (h, w) = image.dim();
    let zero_deriv = Array2::from_shape_fn((h, w), |(r, c)| {
        let v = image[[r, c]];
        let right = image[[r, (c + 1).min(w - 1)]];
        let below = image[[(r + 1).min(h - 1), c]];
        u32::from(v == right && v == below)
    });

    let mut integral = Array2::<u32>::zeros((h + 1, w + 1));
    for r in 0..h {
        for c in 0..w {
            integral[[r + 1, c + 1]] =
                zero_deriv[[r, c]] + integral[[r, c + 1]] + integral[[r + 1, c]] - integral[[r, c]];
        }
    }

    let radius = CAMBI_MASK_FILTER_SIZE / 2;
    let threshold = (CAMBI_MASK_FILTER_SIZE * CAMBI_MASK_FILTER_SIZE / 2) as u32;
    Array2::from_shape_fn((h, w), |(r, c)| {
        let r0 = r.saturating_sub(radius);
        let c0 = c.saturating_sub(radius);
        let r1 = (r + radius + 1).min(h);
        let c1 = (c + radius + 1).min(w);
        let count = integral[[r1, c1]] + integral[[r0, c0]] - integral[[r0, c1]] - integral[[r1, c0]];
        // Windows clipped by the border need the same density, not the same count.
        let area = ((r1 - r0) * (c1 - c0)) as u32;
        let full = (CAMBI_MASK_FILTER_SIZE * CAMBI_MASK_FILTER_SIZE) as u32;
        count * full > threshold * area
    })
}

fn bt1886_luminance(code: usize) -> f64 {
    let max = ((1u32 << CAMBI_BIT_DEPTH) - 1) as f64;
    let v = code as f64 / max;
    let white = DISPLAY_WHITE.powf(1.0 / DISPLAY_GAMMA);
    let black = DISPLAY_BLACK.powf(1.0 / DISPLAY_GAMMA);
    let a = (white - black).powf(DISPLAY_GAMMA);
    let b = black / (white - black);
    a * (v + b).max(0.0).powf(DISPLAY_GAMMA)
}

/// For each diff, the highest code value at which a step of that size is
/// still visible (`None` when it never is).
fn tvi_thresholds(tvi_threshold: f64) -> [Option<usize>; 4] {
    let levels = 1usize << CAMBI_BIT_DEPTH;
    let mut out = [None; 4];
    for (slot, &diff) in out.iter_mut().zip(DIFFS.iter()) {
        *slot = (0..levels - diff).rev().find(|&v| {
            let l0 = bt1886_luminance(v);
            let l1 = bt1886_luminance(v + diff);
            (l1 - l0) / l0 > tvi_threshold
        });
    }
    out
}

/// Banding strength per masked pixel from the value histogram of its
/// surrounding window.
fn c_value_map(
    image: &Array2<u16>,
    mask: &Array2<bool>,
    window: usize,
    thresholds: &[Option<usize>; 4],
) -> Array2<f64> {
    let (h, w) = image.dim();
    let radius = window / 2;
    let levels = 1usize << CAMBI_BIT_DEPTH;

    let rows: Vec<Vec<f64>> = (0..h)
        .into_par_iter()
        .map(|row| {
            let r0 = row.saturating_sub(radius);
            let r1 = (row + radius + 1).min(h);
            let mut window_hist = WindowHistogram {
                counts: vec![0u32; levels],
                total: 0,
            };
            for col in 0..radius.min(w) {
                window_hist.update(image, mask, r0..r1, col, true);
            }

            let mut out = vec![0.0f64; w];
            for (col, slot) in out.iter_mut().enumerate() {
                let entering = col + radius;
                if entering < w {
                    window_hist.update(image, mask, r0..r1, entering, true);
                }
                if col > radius {
                    window_hist.update(image, mask, r0..r1, col - radius - 1, false);
                }
                if mask[[row, col]] && window_hist.total > 0 {
                    *slot = c_value_pixel(
                        &window_hist.counts,
                        window_hist.total,
                        image[[row, col]] as usize,
                        thresholds,
                    );
                }
            }
            out
        })
        .collect();

    let mut result = Array2::<f64>::zeros((h, w));
    for (row, values) in rows.into_iter().enumerate() {
        for (col, v) in values.into_iter().enumerate() {
            result[[row, col]] = v;
        }
    }
    result
}

/// Histogram of masked values inside the current window.
struct WindowHistogram {
    counts: Vec<u32>,
    total: u32,
}

impl WindowHistogram {
    /// Add or remove the masked samples of column `col` over `rows`.
    fn update(
        &mut self,
        image: &Array2<u16>,
        mask: &Array2<bool>,
        rows: std::ops::Range<usize>,
        col: usize,
        add: bool,
    ) {
        for r in rows {
            if mask[[r, col]] {
                let v = image[[r, col]] as usize;
                if add {
                    self.counts[v] += 1;
                    self.total += 1;
                } else {
                    self.counts[v] -= 1;
                    self.total -= 1;
                }
            }
        }
    }
}

fn c_value_pixel(hist: &[u32], total: u32, value: usize, thresholds: &[Option<usize>; 4]) -> f64 {
    let total = total as f64;
    let p0 = hist[value] as f64 / total;
    let mut c_value = 0.0f64;
    for (d, (&diff, &weight)) in DIFFS.iter().zip(DIFF_WEIGHTS.iter()).enumerate() {
        let visible = thresholds[d].is_some_and(|t| value <= t);
        if !visible {
            continue;
        }
        let above = hist.get(value + diff).copied().unwrap_or(0) as f64 / total;
        let below = value
            .checked_sub(diff)
            .map(|v| hist[v] as f64 / total)
            .unwrap_or(0.0);
        let neighbour = above.max(below);
        if neighbour + p0 > 0.0 {
            c_value = c_value.max(weight * p0 * neighbour / (neighbour + p0));
        }
    }
    c_value
}

/// Mean of the largest `topk` fraction of values.
fn topk_pool(values: &Array2<f64>, topk: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(|a, b| b.total_cmp(a));
    let k = ((sorted.len() as f64 * topk).ceil() as usize).clamp(1, sorted.len());
    sorted[..k].iter().sum::<f64>() / k as f64
}
