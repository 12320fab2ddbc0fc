use serde::Serialize;
use tracing::warn;

use crate::error::Result;

use super::table::ResultTable;

/// Descriptive statistics of one table column.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ColumnStatistics {
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std_dev: f64,
    pub p5: f64,
    pub p95: f64,
}

/// Statistics for `columns` of `table`, in the requested order.
/// An empty `columns` slice selects every column.
pub fn statistics<S: AsRef<str>>(
    table: &ResultTable,
    columns: &[S],
) -> Result<Vec<(String, ColumnStatistics)>> {
    let selected: Vec<String> = if columns.is_empty() {
        table.columns().to_vec()
    } else {
        columns.iter().map(|c| c.as_ref().to_string()).collect()
    };

    selected
        .into_iter()
        .map(|name| {
            let values = table.column(&name)?;
            Ok((name, describe(&values)))
        })
        .collect()
}

pub fn describe(values: &[f64]) -> ColumnStatistics {
    let n = values.len();
    if n == 0 {
        warn!("Statistics requested for an empty column");
        return ColumnStatistics {
            mean: f64::NAN,
            median: f64::NAN,
            std_dev: f64::NAN,
            p5: f64::NAN,
            p95: f64::NAN,
        };
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let std_dev = if n > 1 {
        let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        (ss / (n - 1) as f64).sqrt()
    } else {
        f64::NAN
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    ColumnStatistics {
        mean,
        median: percentile(&sorted, 0.5),
        std_dev,
        p5: percentile(&sorted, 0.05),
        p95: percentile(&sorted, 0.95),
    }
}

/// Linearly interpolated quantile `q` of an ascending slice.
///
/// Position `q * (n - 1)` between closest ranks, the same as numpy's and
/// pandas' default `linear` interpolation.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = pos - lo as f64;
            if frac == 0.0 || sorted[lo] == sorted[hi] {
                sorted[lo]
            } else {
                sorted[lo] + (sorted[hi] - sorted[lo]) * frac
            }
        }
    }
}
