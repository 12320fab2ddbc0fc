use std::path::Path;

use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MetricError, Result};

use super::table::ResultTable;

const PLOT_SIZE: (u32, u32) = (1280, 720);

/// Chart options. `normalize` and `relative_scale` add dashed series on a
/// secondary [0, 1] axis (min-max normalized or divided by the maximum).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotOptions {
    pub normalize: bool,
    pub relative_scale: bool,
    pub title: Option<String>,
}

fn plot_err<E: std::fmt::Display>(e: E) -> MetricError {
    MetricError::Plot(e.to_string())
}

/// Render `columns` of `table` (all columns when empty) as an SVG line chart.
pub fn plot<S: AsRef<str>>(
    table: &ResultTable,
    columns: &[S],
    options: &PlotOptions,
    path: &Path,
) -> Result<()> {
    let names: Vec<String> = if columns.is_empty() {
        table.columns().to_vec()
    } else {
        columns.iter().map(|c| c.as_ref().to_string()).collect()
    };
    let mut series = Vec::with_capacity(names.len());
    for name in names {
        let values = table.column(&name)?;
        series.push((name, values));
    }
    if table.is_empty() || series.is_empty() {
        return Err(MetricError::Plot("nothing to plot".to_string()));
    }

    let finite: Vec<f64> = series
        .iter()
        .flat_map(|(_, v)| v.iter().copied())
        .filter(|v| v.is_finite())
        .collect();
    let (mut y_min, mut y_max) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if finite.is_empty() {
        (y_min, y_max) = (0.0, 1.0);
    }
    if finite.len() < series.iter().map(|(_, v)| v.len()).sum() {
        warn!(cap = y_max, "Capped non-finite values for plotting");
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }
    let cap = |v: f64| {
        if v.is_nan() {
            y_min
        } else {
            v.clamp(y_min, y_max)
        }
    };

    let secondary = options.normalize || options.relative_scale;
    let title = options.title.clone().unwrap_or_else(|| {
        let base = series
            .iter()
            .map(|(n, _)| n.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if options.normalize {
            format!("{base} (Normalized)")
        } else if options.relative_scale {
            format!("{base} (Relative Scale)")
        } else {
            base
        }
    });

    let x_max = (table.len().max(2) - 1) as f64;
    let root = SVGBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .right_y_label_area_size(if secondary { 60 } else { 0 })
        .build_cartesian_2d(0f64..x_max, y_min..y_max)
        .map_err(plot_err)?
        .set_secondary_coord(0f64..x_max, 0f64..1f64);

    chart
        .configure_mesh()
        .x_desc("Frame")
        .y_desc("Value")
        .axis_desc_style(("sans-serif", 16))
        .draw()
        .map_err(plot_err)?;
    if secondary {
        chart
            .configure_secondary_axes()
            .y_desc(if options.normalize {
                "Normalized"
            } else {
                "Relative"
            })
            .draw()
            .map_err(plot_err)?;
    }

    for (i, (name, values)) in series.iter().enumerate() {
        let (r, g, b) = Palette99::COLORS[i % Palette99::COLORS.len()];
        let color = RGBColor(r, g, b);
        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .map(|(x, &y)| (x as f64, cap(y)))
            .collect();
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))
            .map_err(plot_err)?
            .label(name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));

        if secondary {
            let scaled = rescale(values, options.normalize);
            let points: Vec<(f64, f64)> = scaled
                .into_iter()
                .enumerate()
                .map(|(x, y)| (x as f64, y))
                .collect();
            let suffix = if options.normalize {
                "normalized"
            } else {
                "relative"
            };
            chart
                .draw_secondary_series(DashedLineSeries::new(
                    points,
                    6u32,
                    4u32,
                    color.mix(0.6).stroke_width(1),
                ))
                .map_err(plot_err)?
                .label(format!("{name} ({suffix})"))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], &color.mix(0.6))
                });
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    info!(path = %path.display(), "Wrote plot");
    Ok(())
}

/// Min-max normalize (or divide by the maximum) the finite values into [0, 1].
fn rescale(values: &[f64], normalize: bool) -> Vec<f64> {
    let (lo, hi) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    values
        .iter()
        .map(|&v| {
            let v = if v.is_finite() { v } else { hi };
            let scaled = if normalize {
                if hi > lo {
                    (v - lo) / (hi - lo)
                } else {
                    0.0
                }
            } else if hi.abs() > f64::EPSILON {
                v / hi
            } else {
                0.0
            };
            scaled.clamp(0.0, 1.0)
        })
        .collect()
}
