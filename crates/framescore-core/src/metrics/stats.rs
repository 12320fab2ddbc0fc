use std::sync::Arc;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{MetricError, Result};
use crate::frame::{Frame, PixelLayout};
use crate::naming::expand;
use crate::scored::ScoredSequence;
use crate::sequence::Sequence;
use crate::validate::LayoutSet;

use super::{compute_with, input_layout, FrameScore, FrameScorer, Metric};

/// Single-plane summary statistic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Mean,
    /// Mean absolute deviation from the plane mean.
    Mad,
    Variance,
    StdDev,
    Rms,
}

impl Statistic {
    pub const ALL: [Statistic; 5] = [
        Statistic::Mean,
        Statistic::Mad,
        Statistic::Variance,
        Statistic::StdDev,
        Statistic::Rms,
    ];

    pub fn base_name(self) -> &'static str {
        match self {
            Statistic::Mean => "plane_mean",
            Statistic::Mad => "plane_mad",
            Statistic::Variance => "plane_var",
            Statistic::StdDev => "plane_std",
            Statistic::Rms => "plane_rms",
        }
    }
}

/// Two-plane comparison statistic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Mae,
    Rmse,
    Covariance,
    Correlation,
}

impl Comparison {
    pub const ALL: [Comparison; 4] = [
        Comparison::Mae,
        Comparison::Rmse,
        Comparison::Covariance,
        Comparison::Correlation,
    ];

    pub fn base_name(self) -> &'static str {
        match self {
            Comparison::Mae => "plane_mae",
            Comparison::Rmse => "plane_rmse",
            Comparison::Covariance => "plane_cov",
            Comparison::Correlation => "plane_corr",
        }
    }
}

/// Summary statistics of one plane.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneStatistics {
    pub plane: usize,
    pub stats: Vec<Statistic>,
}

impl Default for PlaneStatistics {
    fn default() -> Self {
        Self {
            plane: 0,
            stats: Statistic::ALL.to_vec(),
        }
    }
}

fn check_selection<T>(metric: &str, selection: &[T]) -> Result<()> {
    if selection.is_empty() {
        return Err(MetricError::InvalidParameter(format!(
            "{metric} needs at least one statistic"
        )));
    }
    Ok(())
}

impl Metric for PlaneStatistics {
    fn name(&self) -> &str {
        "stats"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::known()
    }

    fn props(&self, layout: PixelLayout) -> Result<Vec<String>> {
        let bases: Vec<&str> = self.stats.iter().map(|s| s.base_name()).collect();
        expand(&bases, layout, &[self.plane])
    }

    fn requires_reference(&self) -> bool {
        false
    }

    fn compute(
        &self,
        reference: &Sequence,
        distorted: Option<&Sequence>,
    ) -> Result<ScoredSequence> {
        check_selection(self.name(), &self.stats)?;
        let layout = input_layout(self, reference, distorted)?;
        let keys = self.props(layout)?;
        let scorer = StatisticsScorer {
            plane: self.plane,
            stats: self.stats.clone(),
            keys,
        };
        compute_with(self, Arc::new(scorer), reference, distorted)
    }
}

struct StatisticsScorer {
    plane: usize,
    stats: Vec<Statistic>,
    keys: Vec<String>,
}

impl FrameScorer for StatisticsScorer {
    fn score(&self, reference: &Frame, _: Option<&Frame>, _: bool) -> Result<FrameScore> {
        let summary = PlaneSummary::of(reference.plane(self.plane));
        let mut score = FrameScore::default();
        for (key, stat) in self.keys.iter().zip(&self.stats) {
            score = score.prop(key.clone(), summary.get(*stat));
        }
        Ok(score)
    }
}

struct PlaneSummary {
    mean: f64,
    mad: f64,
    variance: f64,
    mean_square: f64,
}

impl PlaneSummary {
    fn of(plane: &Array2<f32>) -> Self {
        let n = plane.len() as f64;
        let mean = plane.iter().map(|&v| v as f64).sum::<f64>() / n;
        let (mut abs_dev, mut sq_dev, mut sq) = (0.0, 0.0, 0.0);
        for &v in plane.iter() {
            let v = v as f64;
            abs_dev += (v - mean).abs();
            sq_dev += (v - mean) * (v - mean);
            sq += v * v;
        }
        Self {
            mean,
            mad: abs_dev / n,
            variance: sq_dev / n,
            mean_square: sq / n,
        }
    }

    fn get(&self, stat: Statistic) -> f64 {
        match stat {
            Statistic::Mean => self.mean,
            Statistic::Mad => self.mad,
            Statistic::Variance => self.variance,
            Statistic::StdDev => self.variance.sqrt(),
            Statistic::Rms => self.mean_square.sqrt(),
        }
    }
}

/// Reference-versus-distorted statistics of one plane.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneComparison {
    pub plane: usize,
    pub stats: Vec<Comparison>,
}

impl Default for PlaneComparison {
    fn default() -> Self {
        Self {
            plane: 0,
            stats: Comparison::ALL.to_vec(),
        }
    }
}

impl Metric for PlaneComparison {
    fn name(&self) -> &str {
        "compare"
    }

    fn formats(&self) -> LayoutSet {
        LayoutSet::known()
    }

    fn props(&self, layout: PixelLayout) -> Result<Vec<String>> {
        let bases: Vec<&str> = self.stats.iter().map(|s| s.base_name()).collect();
        expand(&bases, layout, &[self.plane])
    }

    fn requires_reference(&self) -> bool {
        true
    }

    fn compute(
        &self,
        reference: &Sequence,
        distorted: Option<&Sequence>,
    ) -> Result<ScoredSequence> {
        check_selection(self.name(), &self.stats)?;
        let layout = input_layout(self, reference, distorted)?;
        let keys = self.props(layout)?;
        let scorer = ComparisonScorer {
            plane: self.plane,
            stats: self.stats.clone(),
            keys,
        };
        compute_with(self, Arc::new(scorer), reference, distorted)
    }
}

struct ComparisonScorer {
    plane: usize,
    stats: Vec<Comparison>,
    keys: Vec<String>,
}

impl FrameScorer for ComparisonScorer {
    fn score(&self, reference: &Frame, distorted: Option<&Frame>, _: bool) -> Result<FrameScore> {
        let distorted = distorted.ok_or_else(|| MetricError::MissingInput {
            metric: "compare".to_string(),
        })?;
        let a = reference.plane(self.plane);
        let b = distorted.plane(self.plane);
        let mut score = FrameScore::default();
        for (key, stat) in self.keys.iter().zip(&self.stats) {
            let value = match stat {
                Comparison::Mae => mean_absolute_error(a, b),
                Comparison::Rmse => super::psnr::mean_squared_error(a, b).sqrt(),
                Comparison::Covariance => covariance(a, b).0,
                Comparison::Correlation => correlation(a, b),
            };
            score = score.prop(key.clone(), value);
        }
        Ok(score)
    }
}

pub fn mean_absolute_error(a: &Array2<f32>, b: &Array2<f32>) -> f64 {
    let mut sum = 0.0f64;
    Zip::from(a)
        .and(b)
        .for_each(|&x, &y| sum += (x as f64 - y as f64).abs());
    sum / a.len() as f64
}

/// Population covariance together with both population variances.
fn covariance(a: &Array2<f32>, b: &Array2<f32>) -> (f64, f64, f64) {
    let n = a.len() as f64;
    let mean_a = a.iter().map(|&v| v as f64).sum::<f64>() / n;
    let mean_b = b.iter().map(|&v| v as f64).sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    Zip::from(a).and(b).for_each(|&x, &y| {
        let dx = x as f64 - mean_a;
        let dy = y as f64 - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    });
    (cov / n, var_a / n, var_b / n)
}

/// Pearson correlation; NaN when either plane is flat.
pub fn correlation(a: &Array2<f32>, b: &Array2<f32>) -> f64 {
    let (cov, var_a, var_b) = covariance(a, b);
    if var_a == 0.0 || var_b == 0.0 {
        warn!("Correlation of a flat plane is undefined");
        return f64::NAN;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}
