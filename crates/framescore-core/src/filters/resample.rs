use std::f64::consts::PI;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Interpolation kernel used when resizing planes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleFilter {
    Point,
    Bilinear,
    /// Catmull-Rom cubic.
    Bicubic,
    #[default]
    Lanczos3,
}

impl ResampleFilter {
    fn support(&self) -> f64 {
        match self {
            ResampleFilter::Point => 0.5,
            ResampleFilter::Bilinear => 1.0,
            ResampleFilter::Bicubic => 2.0,
            ResampleFilter::Lanczos3 => 3.0,
        }
    }

    fn weight(&self, x: f64) -> f64 {
        let x = x.abs();
        match self {
            ResampleFilter::Point => {
                if x <= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            ResampleFilter::Bilinear => (1.0 - x).max(0.0),
            ResampleFilter::Bicubic => {
                if x < 1.0 {
                    1.5 * x * x * x - 2.5 * x * x + 1.0
                } else if x < 2.0 {
                    -0.5 * x * x * x + 2.5 * x * x - 4.0 * x + 2.0
                } else {
                    0.0
                }
            }
            ResampleFilter::Lanczos3 => {
                if x < 3.0 {
                    sinc(x) * sinc(x / 3.0)
                } else {
                    0.0
                }
            }
        }
    }
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-8 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

/// Contributing source taps for one output sample.
struct Taps {
    start: usize,
    weights: Vec<f32>,
}

fn axis_taps(src_len: usize, dst_len: usize, filter: ResampleFilter) -> Vec<Taps> {
    let scale = src_len as f64 / dst_len as f64;
    if filter == ResampleFilter::Point {
        return (0..dst_len)
            .map(|i| {
                let center = (i as f64 + 0.5) * scale;
                Taps {
                    start: (center.floor() as usize).min(src_len - 1),
                    weights: vec![1.0],
                }
            })
            .collect();
    }

    let filter_scale = scale.max(1.0);
    let support = filter.support() * filter_scale;
    let last = src_len as isize - 1;

    (0..dst_len)
        .map(|i| {
            let center = (i as f64 + 0.5) * scale;
            let left = (center - support).floor() as isize;
            let right = (center + support).ceil() as isize;
            let lo = left.clamp(0, last);
            let hi = right.clamp(0, last);
            let mut weights = vec![0.0f64; (hi - lo + 1) as usize];
            for j in left..=right {
                let w = filter.weight((j as f64 + 0.5 - center) / filter_scale);
                if w != 0.0 {
                    weights[(j.clamp(0, last) - lo) as usize] += w;
                }
            }
            let sum: f64 = weights.iter().sum();
            let norm = if sum.abs() > 1e-12 { sum } else { 1.0 };
            Taps {
                start: lo as usize,
                weights: weights.into_iter().map(|w| (w / norm) as f32).collect(),
            }
        })
        .collect()
}

/// Resize a plane to `(new_h, new_w)` with separable filtering and clamped edges.
pub fn resize_plane(
    data: &Array2<f32>,
    new_h: usize,
    new_w: usize,
    filter: ResampleFilter,
) -> Array2<f32> {
    let (h, w) = data.dim();
    if (h, w) == (new_h, new_w) {
        return data.clone();
    }

    let col_taps = axis_taps(w, new_w, filter);
    let mut horizontal = Array2::<f32>::zeros((h, new_w));
    let horizontal_tap = |(row, col): (usize, usize), out: &mut f32| {
        let taps = &col_taps[col];
        *out = taps
            .weights
            .iter()
            .enumerate()
            .map(|(k, &wt)| data[[row, taps.start + k]] * wt)
            .sum();
    };
    if h * new_w >= PARALLEL_PIXEL_THRESHOLD {
        Zip::indexed(&mut horizontal).par_for_each(horizontal_tap);
    } else {
        Zip::indexed(&mut horizontal).for_each(horizontal_tap);
    }

    let row_taps = axis_taps(h, new_h, filter);
    let mut result = Array2::<f32>::zeros((new_h, new_w));
    let vertical_tap = |(row, col): (usize, usize), out: &mut f32| {
        let taps = &row_taps[row];
        *out = taps
            .weights
            .iter()
            .enumerate()
            .map(|(k, &wt)| horizontal[[taps.start + k, col]] * wt)
            .sum();
    };
    if new_h * new_w >= PARALLEL_PIXEL_THRESHOLD {
        Zip::indexed(&mut result).par_for_each(vertical_tap);
    } else {
        Zip::indexed(&mut result).for_each(vertical_tap);
    }
    result
}
