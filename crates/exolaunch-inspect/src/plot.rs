//! SVG plots of config-averaged correlators.

use crate::correlator::InspectError;
use camino::Utf8Path;
use ndarray::Array1;
use plotters::prelude::*;

fn plot_err<E: std::fmt::Display>(e: E) -> InspectError {
    InspectError::Plot(e.to_string())
}

/// Plot `corr[t]` against `t` on a log y axis.
///
/// Non-positive values cannot be shown on the log axis and are dropped.
pub fn plot_correlator(
    path: &Utf8Path,
    title: &str,
    corr: &Array1<f64>,
) -> Result<(), InspectError> {
    let points: Vec<(f64, f64)> = corr
        .iter()
        .enumerate()
        .filter(|(_, y)| y.is_finite() && **y > 0.0)
        .map(|(t, y)| (t as f64, *y))
        .collect();
    if points.is_empty() {
        return Err(InspectError::NoPositiveValues);
    }

    let (y_min, y_max) = points
        .iter()
        .fold((f64::INFINITY, 0.0f64), |(lo, hi), (_, y)| (lo.min(*y), hi.max(*y)));
    let x_max = corr.len().max(2) as f64;

    let root = SVGBackend::new(path.as_std_path(), (1024, 768)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0f64..x_max, (y_min * 0.5..y_max * 2.0).log_scale())
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("t")
        .y_desc("C(t)")
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(points.iter().copied(), BLUE.mix(0.3)))
        .map_err(plot_err)?;
    chart
        .draw_series(points.iter().map(|&p| Circle::new(p, 3, BLUE.filled())))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    tracing::info!("Wrote plot {}", path);
    Ok(())
}
