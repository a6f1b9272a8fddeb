use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::data::from_epoch_seconds;
use crate::ir::{Axis, AxisScale, CartesianPanel, Figure, Geometry, Panel, Scatter3dPanel, Trace};
use crate::scale::rescale;

const LIGHT_GRID: RGBColor = RGBColor(235, 235, 235);
const BOLD_GRID: RGBColor = RGBColor(215, 215, 215);
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Render the figure as an SVG document
pub fn render_svg(figure: &Figure, width: u32, height: u32) -> Result<String> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        draw_figure(&root, figure)?;
        root.present().context("Failed to present drawing")?;
    }
    Ok(svg)
}

/// Render the figure and encode it as PNG
pub fn render_png(figure: &Figure, width: u32, height: u32) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; rgb_buffer_len(width, height)?];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        draw_figure(&root, figure)?;
        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }
    Ok(png_bytes)
}

/// Bytes in an RGB bitmap of the given size
fn rgb_buffer_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(3))
        .with_context(|| format!("Image size {}x{} is too large", width, height))
}

fn draw_figure<DB>(root: &DrawingArea<DB, Shift>, figure: &Figure) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;

    let area = match &figure.title {
        Some(title) => root
            .titled(title, ("sans-serif", 24))
            .context("Failed to draw title")?,
        None => root.clone(),
    };

    let cells = area.split_evenly((figure.rows.max(1), figure.cols.max(1)));
    for (cell, panel) in cells.iter().zip(&figure.panels) {
        match panel {
            Panel::Cartesian(p) => draw_cartesian(cell, p)?,
            Panel::Scatter3d(p) => draw_scatter3d(cell, p)?,
        }
    }
    Ok(())
}

// =============================================================================
// 2D panels
// =============================================================================

fn draw_cartesian<DB>(area: &DrawingArea<DB, Shift>, panel: &CartesianPanel) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let x_range = panel.x.domain.0..panel.x.domain.1;
    let y_range = panel.y.domain.0..panel.y.domain.1;

    let mut builder = ChartBuilder::on(area);
    builder.margin(10).x_label_area_size(40).y_label_area_size(60);
    if panel.y2.is_some() {
        builder.right_y_label_area_size(60);
    }
    let mut chart = builder
        .build_cartesian_2d(x_range.clone(), y_range)
        .context("Failed to build chart")?;

    let x_fmt = tick_formatter(&panel.x);
    let y_fmt = tick_formatter(&panel.y);
    {
        let mut mesh = chart.configure_mesh();
        mesh.x_label_formatter(&*x_fmt)
            .y_label_formatter(&*y_fmt)
            .light_line_style(&LIGHT_GRID)
            .bold_line_style(&BOLD_GRID);
        if let Some(title) = &panel.x.title {
            mesh.x_desc(title.as_str());
        }
        if let Some(title) = &panel.y.title {
            mesh.y_desc(title.as_str());
        }
        mesh.draw().context("Failed to draw mesh")?;
    }

    draw_traces(&mut chart, &panel.traces, |y| y)?;
    if let Some(y2) = &panel.y2 {
        // Right-axis traces are mapped onto the left axis range
        let (from, to) = (y2.domain, panel.y.domain);
        draw_traces(&mut chart, &panel.secondary, |y| rescale(y, from, to))?;
    }

    if panel.show_legend {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK.mix(0.3))
            .position(SeriesLabelPosition::UpperRight)
            .draw()
            .context("Failed to draw legend")?;
    }

    if let Some(y2) = &panel.y2 {
        let y2_fmt = tick_formatter(y2);
        let mut chart = chart.set_secondary_coord(x_range, y2.domain.0..y2.domain.1);
        let mut axes = chart.configure_secondary_axes();
        axes.y_label_formatter(&*y2_fmt);
        if let Some(title) = &y2.title {
            axes.y_desc(title.as_str());
        }
        axes.draw().context("Failed to draw secondary axis")?;
    }

    Ok(())
}

fn draw_traces<DB>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    traces: &[Trace],
    map_y: impl Fn(f64) -> f64,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    for trace in traces {
        let color = trace.color;
        let anno = match &trace.geometry {
            Geometry::Line(points) => chart
                .draw_series(LineSeries::new(
                    points.iter().map(|&(x, y)| (x, map_y(y))),
                    color.stroke_width(2),
                ))
                .context("Failed to draw line series")?,
            Geometry::Markers { points, size } => {
                let radius = marker_radius(*size);
                chart
                    .draw_series(
                        points
                            .iter()
                            .map(|&(x, y)| Circle::new((x, map_y(y)), radius, color.filled())),
                    )
                    .context("Failed to draw point series")?
            }
            Geometry::Bars(bars) => chart
                .draw_series(bars.iter().map(|b| {
                    Rectangle::new(
                        [(b.left, map_y(b.top)), (b.right, map_y(b.bottom))],
                        color.mix(0.85).filled(),
                    )
                }))
                .context("Failed to draw bars")?,
        };

        if trace.name.is_empty() {
            continue;
        }
        anno.label(trace.name.as_str());
        if matches!(trace.geometry, Geometry::Line(_)) {
            anno.legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        } else {
            anno.legend(move |(x, y)| Rectangle::new([(x, y - 4), (x + 8, y + 4)], color.filled()));
        }
    }
    Ok(())
}

fn marker_radius(size: f64) -> i32 {
    (size.round() as i32).max(1)
}

// =============================================================================
// 3D panels
// =============================================================================

fn draw_scatter3d<DB>(area: &DrawingArea<DB, Shift>, panel: &Scatter3dPanel) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (_, height) = area.dim_in_pixel();
    let caption = format!(
        "x: {}    y: {}    z: {}",
        panel.x.title.as_deref().unwrap_or(""),
        panel.y.title.as_deref().unwrap_or(""),
        panel.z.title.as_deref().unwrap_or("")
    );
    area.draw(&Text::new(
        caption,
        (10, height as i32 - 24),
        ("sans-serif", 14).into_font(),
    ))
    .context("Failed to draw axis titles")?;

    let mut chart = ChartBuilder::on(area)
        .margin(20)
        .build_cartesian_3d(
            panel.x.domain.0..panel.x.domain.1,
            panel.y.domain.0..panel.y.domain.1,
            panel.z.domain.0..panel.z.domain.1,
        )
        .context("Failed to build 3D chart")?;

    chart.with_projection(|mut pb| {
        pb.yaw = 0.6;
        pb.pitch = 0.35;
        pb.scale = 0.8;
        pb.into_matrix()
    });

    chart
        .configure_axes()
        .light_grid_style(LIGHT_GRID)
        .max_light_lines(3)
        .draw()
        .context("Failed to draw 3D axes")?;

    let radius = marker_radius(panel.marker_size);
    let mut labelled = false;
    for trace in &panel.traces {
        let color = trace.color;
        let anno = chart
            .draw_series(
                trace
                    .points
                    .iter()
                    .map(|&(x, y, z)| Circle::new((x, y, z), radius, color.filled())),
            )
            .context("Failed to draw 3D markers")?;
        if !trace.name.is_empty() {
            labelled = true;
            anno.label(trace.name.as_str())
                .legend(move |(x, y)| Circle::new((x + 4, y), 4, color.filled()));
        }
    }

    if labelled {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK.mix(0.3))
            .draw()
            .context("Failed to draw legend")?;
    }
    Ok(())
}

// =============================================================================
// Tick labels
// =============================================================================

fn tick_formatter(axis: &Axis) -> Box<dyn Fn(&f64) -> String> {
    match axis.scale {
        AxisScale::Linear => Box::new(|v| format_number(*v)),
        AxisScale::Log => Box::new(|v| format_log_tick(*v)),
        AxisScale::Time => {
            let span = axis.domain.1 - axis.domain.0;
            let pattern = if span < SECONDS_PER_DAY {
                "%H:%M:%S"
            } else if span < 30.0 * SECONDS_PER_DAY {
                "%m-%d %H:%M"
            } else {
                "%Y-%m-%d"
            };
            Box::new(move |v| format_time_tick(*v, pattern))
        }
    }
}

pub fn format_number(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    let magnitude = v.abs();
    if !(1e-3..1e6).contains(&magnitude) {
        return format!("{:.2e}", v);
    }
    let text = format!("{:.3}", v);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Log axes are drawn in log10 space; whole exponents read as powers of ten
pub fn format_log_tick(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("10^{}", v.round() as i64)
    } else {
        format_number(10f64.powf(v))
    }
}

pub fn format_time_tick(seconds: f64, pattern: &str) -> String {
    from_epoch_seconds(seconds)
        .map(|dt| dt.format(pattern).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_buffer_len() {
        assert_eq!(rgb_buffer_len(1000, 800).unwrap(), 2_400_000);
        assert_eq!(rgb_buffer_len(0, 800).unwrap(), 0);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_rgb_buffer_len_beyond_u32() {
        assert_eq!(rgb_buffer_len(40_000, 40_000).unwrap(), 4_800_000_000);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(-0.125), "-0.125");
        assert_eq!(format_number(1.5e7), "1.50e7");
    }

    #[test]
    fn test_format_log_tick() {
        assert_eq!(format_log_tick(3.0), "10^3");
        assert_eq!(format_log_tick(-1.0), "10^-1");
        assert_eq!(format_log_tick(0.30103), "2");
    }

    #[test]
    fn test_format_time_tick() {
        assert_eq!(format_time_tick(0.0, "%Y-%m-%d"), "1970-01-01");
        assert_eq!(format_time_tick(3661.0, "%H:%M:%S"), "01:01:01");
    }
}
