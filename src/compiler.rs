use anyhow::Result;

use crate::config::{
    AxisChoice, BinFunction, ChartRequest, HistogramConfig, PairPlotConfig, SeriesAxis, ThreeDConfig,
    TimeSeriesConfig, Trendline, XyConfig, XyStyle,
};
use crate::data::Table;
use crate::ir::{
    Axis, AxisScale, Bar, CartesianPanel, Figure, Geometry, Panel, Scatter3dPanel, Trace, Trace3d,
};
use crate::palette::ColorPalette;
use crate::resolve::{axis_scale, choice_scale, group_labels, numeric_column};
use crate::scale::{finite_pairs, fit_domain, project};
use crate::transform::{bin_values, least_squares, lowess, partition_rows, select, BinEdges};

const MARKER_SIZE: f64 = 3.0;
const MARKER_SIZE_3D: f64 = 2.5;
const PAIR_MARKER_SIZE: f64 = 2.0;
const LOWESS_FRAC: f64 = 2.0 / 3.0;
const LOWESS_ITERATIONS: usize = 3;
const TRENDLINE_SAMPLES: usize = 50;

/// Build the figure for a complete request
pub fn compile(request: &ChartRequest<'_>, table: &Table) -> Result<Figure> {
    match request {
        ChartRequest::TimeSeries(ts) => compile_time_series(ts, table),
        ChartRequest::Xy(xy) => compile_xy(xy, table),
        ChartRequest::ThreeD(c) => compile_3d(c, table),
        ChartRequest::Histogram(h) => compile_histogram(h, table),
        ChartRequest::PairPlot(pp) => compile_pair_plot(pp, table),
    }
}

fn title(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn y_values(traces: &[Trace]) -> impl Iterator<Item = f64> + '_ {
    traces.iter().flat_map(|t| match &t.geometry {
        Geometry::Line(points) | Geometry::Markers { points, .. } => {
            points.iter().map(|p| p.1).collect::<Vec<_>>()
        }
        Geometry::Bars(bars) => bars.iter().flat_map(|b| [b.bottom, b.top]).collect(),
    })
}

// =============================================================================
// Time series
// =============================================================================

fn compile_time_series(ts: &TimeSeriesConfig, table: &Table) -> Result<Figure> {
    let time = numeric_column(table, &ts.time, "time variable")?;
    let x_scale = axis_scale(table, &ts.time, false);
    let x_domain = fit_domain(time.iter().copied(), false);

    let mut palette = ColorPalette::new();
    let enabled = ts.enabled_axes();
    let mut panels = Vec::with_capacity(enabled.len());

    for (idx, axes) in enabled.iter().enumerate() {
        let traces = series_traces(table, &time, &axes.left, &mut palette)?;
        let secondary = series_traces(table, &time, &axes.right, &mut palette)?;

        let y = Axis::new(
            axes.left.resolved_title(),
            log_scale(axes.left.log),
            fit_domain(y_values(&traces), false),
        );
        let y2 = if axes.right.series.is_empty() {
            None
        } else {
            Some(Axis::new(
                axes.right.resolved_title(),
                log_scale(axes.right.log),
                fit_domain(y_values(&secondary), false),
            ))
        };

        // Only the bottom panel carries the shared time axis title
        let x_title = if idx + 1 == enabled.len() { Some("Time".to_string()) } else { None };

        panels.push(Panel::Cartesian(CartesianPanel {
            x: Axis::new(x_title, x_scale, x_domain),
            y,
            y2,
            show_legend: !(traces.is_empty() && secondary.is_empty()),
            traces,
            secondary,
        }));
    }

    Ok(Figure {
        title: title(&ts.title),
        rows: panels.len(),
        cols: 1,
        panels,
    })
}

fn log_scale(log: bool) -> AxisScale {
    if log {
        AxisScale::Log
    } else {
        AxisScale::Linear
    }
}

fn series_traces(
    table: &Table,
    time: &[f64],
    axis: &SeriesAxis,
    palette: &mut ColorPalette,
) -> Result<Vec<Trace>> {
    let scale = log_scale(axis.log);
    axis.series
        .iter()
        .map(|name| {
            let values = numeric_column(table, name, "time series variable")?;
            Ok(Trace {
                name: name.clone(),
                color: palette.next_color(),
                geometry: Geometry::Line(finite_pairs(time, &project(&values, scale))),
            })
        })
        .collect()
}

// =============================================================================
// X-Y
// =============================================================================

fn compile_xy(xy: &XyConfig, table: &Table) -> Result<Figure> {
    let x_scale = choice_scale(table, &xy.x);
    let y_scale = choice_scale(table, &xy.y);
    let x_raw = numeric_column(table, &xy.x.variable, "X variable")?;
    let y_raw = numeric_column(table, &xy.y.variable, "Y variable")?;
    let x = project(&x_raw, x_scale);
    let y = project(&y_raw, y_scale);

    let labels = group_labels(table, xy.color.as_deref())?;
    let groups = partition_rows(labels.as_deref(), table.row_count());
    let mut palette = ColorPalette::new();
    let mut traces = Vec::new();

    for (name, rows) in &groups {
        let color = palette.next_color();
        let points = finite_pairs(&select(&x, rows), &select(&y, rows));

        let geometry = match xy.style {
            XyStyle::Scatter => Geometry::Markers { points, size: MARKER_SIZE },
            XyStyle::Line => Geometry::Line(points),
        };
        traces.push(Trace {
            name: name.clone(),
            color,
            geometry,
        });

        if xy.style == XyStyle::Scatter && xy.trendline != Trendline::None {
            // Fit in data space on the rows that are visible on these axes
            let visible: Vec<(f64, f64)> = rows
                .iter()
                .filter(|&&r| x[r].is_finite() && y[r].is_finite())
                .map(|&r| (x_raw[r], y_raw[r]))
                .collect();
            let fitted = trendline(&visible, xy.trendline);
            let (fx, fy): (Vec<f64>, Vec<f64>) = fitted.into_iter().unzip();
            let points = finite_pairs(&project(&fx, x_scale), &project(&fy, y_scale));
            if !points.is_empty() {
                traces.push(Trace {
                    name: String::new(),
                    color,
                    geometry: Geometry::Line(points),
                });
            }
        }
    }

    let x_domain = fit_domain(
        traces.iter().flat_map(|t| match &t.geometry {
            Geometry::Line(p) | Geometry::Markers { points: p, .. } => {
                p.iter().map(|p| p.0).collect::<Vec<f64>>()
            }
            Geometry::Bars(_) => Vec::new(),
        }),
        false,
    );
    let y_domain = fit_domain(y_values(&traces), false);

    let panel = CartesianPanel {
        x: Axis::new(Some(xy.x.resolved_title()), x_scale, x_domain),
        y: Axis::new(Some(xy.y.resolved_title()), y_scale, y_domain),
        y2: None,
        traces,
        secondary: Vec::new(),
        show_legend: labels.is_some(),
    };

    Ok(Figure {
        title: title(&xy.title),
        rows: 1,
        cols: 1,
        panels: vec![Panel::Cartesian(panel)],
    })
}

/// Fitted trendline points in data space, sorted by x
fn trendline(points: &[(f64, f64)], kind: Trendline) -> Vec<(f64, f64)> {
    match kind {
        Trendline::None => Vec::new(),
        Trendline::LeastSquares => {
            let Some((slope, intercept)) = least_squares(points) else {
                return Vec::new();
            };
            let min = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
            let max = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
            (0..TRENDLINE_SAMPLES)
                .map(|i| {
                    let x = min + (max - min) * i as f64 / (TRENDLINE_SAMPLES - 1) as f64;
                    (x, slope * x + intercept)
                })
                .collect()
        }
        Trendline::Lowess => lowess(points, LOWESS_FRAC, LOWESS_ITERATIONS),
    }
}

// =============================================================================
// 3D
// =============================================================================

fn compile_3d(config: &ThreeDConfig, table: &Table) -> Result<Figure> {
    let x = numeric_column(table, &config.x.variable, "X variable")?;
    let y = numeric_column(table, &config.y.variable, "Y variable")?;
    let z = numeric_column(table, &config.z.variable, "Z variable")?;

    let labels = group_labels(table, config.color.as_deref())?;
    let groups = partition_rows(labels.as_deref(), table.row_count());
    let mut palette = ColorPalette::new();

    let traces: Vec<Trace3d> = groups
        .iter()
        .map(|(name, rows)| Trace3d {
            name: name.clone(),
            color: palette.next_color(),
            points: rows
                .iter()
                .map(|&r| (x[r], y[r], z[r]))
                .filter(|(a, b, c)| a.is_finite() && b.is_finite() && c.is_finite())
                .collect(),
        })
        .collect();

    let axis = |choice: &AxisChoice, component: fn(&(f64, f64, f64)) -> f64| {
        Axis::new(
            Some(choice.resolved_title()),
            axis_scale(table, &choice.variable, false),
            fit_domain(traces.iter().flat_map(|t| t.points.iter().map(component)), false),
        )
    };

    let panel = Scatter3dPanel {
        x: axis(&config.x, |p| p.0),
        y: axis(&config.y, |p| p.1),
        z: axis(&config.z, |p| p.2),
        traces,
        marker_size: MARKER_SIZE_3D,
    };

    Ok(Figure {
        title: title(&config.title),
        rows: 1,
        cols: 1,
        panels: vec![Panel::Scatter3d(panel)],
    })
}

// =============================================================================
// Histogram
// =============================================================================

fn compile_histogram(hist: &HistogramConfig, table: &Table) -> Result<Figure> {
    let x = numeric_column(table, &hist.x.variable, "histogram variable")?;
    let values = match hist.value_column() {
        Some(name) => numeric_column(table, name, "bin value")?,
        None => vec![1.0; x.len()],
    };

    let labels = group_labels(table, hist.color.as_deref())?;
    let groups = partition_rows(labels.as_deref(), table.row_count());
    let mut palette = ColorPalette::new();
    let mut traces = Vec::new();
    let mut x_extent = Vec::new();

    if let Some(edges) = BinEdges::fit(&x, hist.bins) {
        x_extent = vec![edges.left(0), edges.left(edges.count)];
        let mut base = vec![0.0; edges.count];

        for (name, rows) in &groups {
            let heights = bin_values(
                &edges,
                &select(&x, rows),
                &select(&values, rows),
                hist.function,
                hist.normalization,
            );

            // Groups stack on top of each other
            let mut bars = Vec::new();
            for (i, h) in heights.into_iter().enumerate() {
                if h == 0.0 || !h.is_finite() {
                    continue;
                }
                bars.push(Bar {
                    left: edges.left(i),
                    right: edges.left(i + 1),
                    bottom: base[i],
                    top: base[i] + h,
                });
                base[i] += h;
            }

            traces.push(Trace {
                name: name.clone(),
                color: palette.next_color(),
                geometry: Geometry::Bars(bars),
            });
        }
    }

    let x_scale = axis_scale(table, &hist.x.variable, false);
    let panel = CartesianPanel {
        x: Axis::new(Some(hist.x.resolved_title()), x_scale, fit_domain(x_extent, false)),
        y: Axis::new(
            Some(histogram_y_title(hist)),
            AxisScale::Linear,
            fit_domain(y_values(&traces), true),
        ),
        y2: None,
        traces,
        secondary: Vec::new(),
        show_legend: labels.is_some(),
    };

    Ok(Figure {
        title: title(&hist.title),
        rows: 1,
        cols: 1,
        panels: vec![Panel::Cartesian(panel)],
    })
}

/// "count", "sum of v", "percent", "density of avg of v", ...
pub fn histogram_y_title(hist: &HistogramConfig) -> String {
    let base = match (hist.function, hist.value_column()) {
        (BinFunction::Count, _) | (_, None) => "count".to_string(),
        (function, Some(y)) => format!("{} of {}", function.label(), y),
    };
    match hist.normalization.label() {
        None => base,
        Some(norm) if base == "count" => norm.to_string(),
        Some(norm) => format!("{} of {}", norm, base),
    }
}

// =============================================================================
// Pair plot
// =============================================================================

fn compile_pair_plot(pp: &PairPlotConfig, table: &Table) -> Result<Figure> {
    let columns = pp
        .variables
        .iter()
        .map(|name| numeric_column(table, name, "pair plot variable"))
        .collect::<Result<Vec<_>>>()?;
    let scales: Vec<AxisScale> = pp
        .variables
        .iter()
        .map(|name| axis_scale(table, name, false))
        .collect();

    let labels = group_labels(table, pp.color.as_deref())?;
    let groups = partition_rows(labels.as_deref(), table.row_count());
    let n = pp.variables.len();
    let mut panels = Vec::with_capacity(n * n);

    for row in 0..n {
        for col in 0..n {
            let traces: Vec<Trace> = groups
                .iter()
                .enumerate()
                .map(|(g, (name, rows))| Trace {
                    name: name.clone(),
                    color: ColorPalette::color_at(g),
                    geometry: Geometry::Markers {
                        points: finite_pairs(&select(&columns[col], rows), &select(&columns[row], rows)),
                        size: PAIR_MARKER_SIZE,
                    },
                })
                .collect();

            let x_title = (row + 1 == n).then(|| pp.variables[col].clone());
            let y_title = (col == 0).then(|| pp.variables[row].clone());

            panels.push(Panel::Cartesian(CartesianPanel {
                x: Axis::new(x_title, scales[col], fit_domain(columns[col].iter().copied(), false)),
                y: Axis::new(y_title, scales[row], fit_domain(columns[row].iter().copied(), false)),
                y2: None,
                traces,
                secondary: Vec::new(),
                show_legend: labels.is_some() && row == 0 && col + 1 == n,
            }));
        }
    }

    Ok(Figure {
        title: title(&pp.title),
        rows: n,
        cols: n,
        panels,
    })
}
