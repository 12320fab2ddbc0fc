use std::sync::Arc;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{MetricError, Result};
use crate::frame::PixelLayout;
use crate::metrics::{compute_with, input_layout, Metric};
use crate::naming::expand;
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

use super::{PlaneDescriptor, PlaneScorer};

const DESCRIPTORS: [&str; 8] = [
    "compression_error",
    "texture_entropy",
    "texture_energy",
    "singular_value_spectrum",
    "singular_value_ratio",
    "left_singular_vector_entropy",
    "right_singular_vector_entropy",
    "percentage_retained",
];

const JACOBI_TOLERANCE: f64 = 1e-12;
const JACOBI_MAX_SWEEPS: usize = 40;

/// Singular value descriptors of each requested plane.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Svd {
    pub planes: Vec<usize>,
    /// Fraction of singular values kept for `compression_error`.
    pub compression_ratio: f64,
    /// Singular values above this count towards `percentage_retained`.
    pub threshold: f64,
}

impl Default for Svd {
    fn default() -> Self {
        Self {
            planes: vec![0],
            compression_ratio: 0.1,
            threshold: 0.1,
        }
    }
}

impl Metric for Svd {
    fn name(&self) -> &str {
        "svd"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::float()
    }

    fn props(&self, layout: PixelLayout) -> Result<Vec<String>> {
        expand(&DESCRIPTORS, layout, &self.planes)
    }

    fn requires_reference(&self) -> bool {
        false
    }

    fn compute(
        &self,
        reference: &Sequence,
        distorted: Option<&Sequence>,
    ) -> Result<ScoredSequence> {
        if !(0.0..=1.0).contains(&self.compression_ratio) {
            return Err(MetricError::InvalidParameter(format!(
                "SVD compression ratio must lie in [0, 1], got {}",
                self.compression_ratio
            )));
        }
        let layout = input_layout(self, reference, distorted)?;
        let scorer = PlaneScorer::new(self.clone(), Some(&self.planes), layout)?;
        compute_with(self, Arc::new(scorer), reference, distorted)
    }
}

impl PlaneDescriptor for Svd {
    fn base_names(&self) -> &[&'static str] {
        &DESCRIPTORS
    }

    fn describe(&self, plane: &Array2<f32>) -> Vec<f64> {
        let svd = SingularValues::decompose(&plane.mapv(f64::from));
        let s = &svd.values;
        let total: f64 = s.iter().sum();
        let rank = (self.compression_ratio * s.len() as f64) as usize;

        // Eckart-Young: the rank-k residual carries the discarded energy.
        let compression_error: f64 = s[rank.min(s.len())..].iter().map(|v| v * v).sum();
        let texture_entropy = -s.iter().filter(|&&v| v > 0.0).map(|v| v * v.log2()).sum::<f64>();
        let texture_energy: f64 = s.iter().map(|v| v * v).sum();
        let (spectrum, ratio) = if total > 0.0 {
            let spectrum = s.iter().map(|v| v / total).sum::<f64>() / s.len() as f64;
            (spectrum, s[0] / total)
        } else {
            (0.0, 0.0)
        };
        let retained = s.iter().filter(|&&v| v > self.threshold).count() as f64 / s.len() as f64;

        vec![
            compression_error,
            texture_entropy,
            texture_energy,
            spectrum,
            ratio,
            vector_entropy(&svd.left),
            vector_entropy(&svd.right),
            retained,
        ]
    }
}

/// `-sum(x^2 * log2(x^2))`, with `0 * log(0) = 0`.
fn vector_entropy(v: &[f64]) -> f64 {
    -v.iter()
        .map(|x| x * x)
        .filter(|&p| p > 0.0)
        .map(|p| p * p.log2())
        .sum::<f64>()
}

/// Singular values (descending) with the leading left and right singular
/// vectors.
#[derive(Clone, Debug)]
pub struct SingularValues {
    pub values: Vec<f64>,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

impl SingularValues {
    /// One-sided Jacobi SVD. Works on the columns of the taller orientation.
    pub fn decompose(matrix: &Array2<f64>) -> Self {
        let (m, n) = matrix.dim();
        let transposed = n > m;
        let a = if transposed {
            matrix.t().to_owned()
        } else {
            matrix.clone()
        };
        let (rows, cols) = a.dim();

        let mut columns: Vec<Vec<f64>> = (0..cols).map(|c| a.column(c).to_vec()).collect();
        let mut basis: Vec<Vec<f64>> = (0..cols)
            .map(|c| {
                let mut e = vec![0.0; cols];
                e[c] = 1.0;
                e
            })
            .collect();

        for _ in 0..JACOBI_MAX_SWEEPS {
            let mut off = 0.0f64;
            for p in 0..cols {
                for q in p + 1..cols {
                    let alpha = dot(&columns[p], &columns[p]);
                    let beta = dot(&columns[q], &columns[q]);
                    let gamma = dot(&columns[p], &columns[q]);
                    if alpha == 0.0 || beta == 0.0 {
                        continue;
                    }
                    let coupling = gamma.abs() / (alpha * beta).sqrt();
                    if coupling <= JACOBI_TOLERANCE {
                        continue;
                    }
                    off = off.max(coupling);
                    let zeta = (beta - alpha) / (2.0 * gamma);
                    let t = zeta.signum() / (zeta.abs() + (1.0 + zeta * zeta).sqrt());
                    let c = 1.0 / (1.0 + t * t).sqrt();
                    let s = c * t;
                    rotate(&mut columns, p, q, c, s);
                    rotate(&mut basis, p, q, c, s);
                }
            }
            if off <= JACOBI_TOLERANCE {
                break;
            }
        }

        let norms: Vec<f64> = columns.iter().map(|c| dot(c, c).sqrt()).collect();
        let mut order: Vec<usize> = (0..cols).collect();
        order.sort_by(|&x, &y| norms[y].total_cmp(&norms[x]));
        let values: Vec<f64> = order.iter().map(|&i| norms[i]).collect();

        let lead = order.first().copied().unwrap_or(0);
        let u0: Vec<f64> = if values.first().copied().unwrap_or(0.0) > 0.0 {
            columns[lead].iter().map(|x| x / norms[lead]).collect()
        } else {
            vec![0.0; rows]
        };
        let v0 = basis.get(lead).cloned().unwrap_or_default();

        let (left, right) = if transposed { (v0, u0) } else { (u0, v0) };
        Self {
            values,
            left,
            right,
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn rotate(vectors: &mut [Vec<f64>], p: usize, q: usize, c: f64, s: f64) {
    let (head, tail) = vectors.split_at_mut(q);
    let (vp, vq) = (&mut head[p], &mut tail[0]);
    for (x, y) in vp.iter_mut().zip(vq.iter_mut()) {
        let (a, b) = (*x, *y);
        *x = c * a - s * b;
        *y = s * a + c * b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn diagonal_matrix_singular_values() {
        let m = array![[3.0, 0.0], [0.0, 4.0], [0.0, 0.0]];
        let svd = SingularValues::decompose(&m);
        assert!((svd.values[0] - 4.0).abs() < 1e-9);
        assert!((svd.values[1] - 3.0).abs() < 1e-9);
        assert!((svd.left[1].abs() - 1.0).abs() < 1e-9);
        assert!((svd.right[1].abs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn wide_matrix_matches_frobenius_norm() {
        let m = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let svd = SingularValues::decompose(&m);
        let energy: f64 = svd.values.iter().map(|v| v * v).sum();
        assert!((energy - 91.0).abs() < 1e-9);
        assert_eq!(svd.left.len(), 2);
        assert_eq!(svd.right.len(), 3);
    }
}
