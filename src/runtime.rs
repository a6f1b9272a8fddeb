// Runtime executor: validates a chart request, compiles it and writes the chart document

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::compiler;
use crate::config::ChartRequest;
use crate::data::Table;
use crate::graph;
use crate::ir::Figure;
use crate::resolve;
use crate::{OutputFormat, RenderOptions};

/// Result of a chart build
#[derive(Debug, Clone, PartialEq)]
pub enum ChartOutcome {
    /// The document was written to this path
    Written(PathBuf),
    /// A required variable is unset; nothing was built
    MissingVariables,
}

/// Build the chart for `request` and write it to `<output_dir>/<stem>.<ext>`,
/// overwriting any previous document of the same kind
pub fn render_chart(
    request: &ChartRequest<'_>,
    table: &Table,
    options: &RenderOptions,
    output_dir: &Path,
) -> Result<ChartOutcome> {
    if !resolve::is_complete(request) {
        return Ok(ChartOutcome::MissingVariables);
    }

    let figure = compiler::compile(request, table)
        .with_context(|| format!("Failed to build the {} chart", request.kind()))?;
    let bytes = render_figure(&figure, options)?;

    fs::create_dir_all(output_dir).with_context(|| {
        format!("Failed to create output directory '{}'", output_dir.display())
    })?;
    let path = output_dir.join(format!(
        "{}.{}",
        request.kind().file_stem(),
        options.format.extension()
    ));
    fs::write(&path, bytes).with_context(|| format!("Failed to write '{}'", path.display()))?;

    Ok(ChartOutcome::Written(path))
}

/// Render a figure to bytes in the requested format
pub fn render_figure(figure: &Figure, options: &RenderOptions) -> Result<Vec<u8>> {
    let (width, height) = (options.width, options.height);
    let bytes = match options.format {
        OutputFormat::Html => {
            let svg = graph::render_svg(figure, width, height)?;
            html_document(figure.title.as_deref(), &svg).into_bytes()
        }
        OutputFormat::Svg => graph::render_svg(figure, width, height)?.into_bytes(),
        OutputFormat::Png => graph::render_png(figure, width, height)?,
    };
    Ok(bytes)
}

/// Self-contained HTML page around an inline SVG drawing
pub fn html_document(title: Option<&str>, svg: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body style=\"margin:0\">\n{}\n</body>\n</html>\n",
        escape_html(title.unwrap_or("Plot Bot")),
        svg
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AxisChoice, ChartKind, PlotConfig};
    use crate::data::{Column, ColumnData};
    use tempfile::TempDir;

    fn make_table() -> Table {
        Table::new(vec![
            Column::new("a", ColumnData::Numeric(vec![1.0, 2.0, 3.0])),
            Column::new("b", ColumnData::Numeric(vec![2.0, 4.0, 7.0])),
        ])
        .unwrap()
    }

    fn xy_config() -> PlotConfig {
        let mut config = PlotConfig::default();
        config.xy.x = AxisChoice::new("a");
        config.xy.y = AxisChoice::new("b");
        config
    }

    #[test]
    fn test_html_document_escapes_title() {
        let doc = html_document(Some("a < b & c"), "<svg></svg>");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<title>a &lt; b &amp; c</title>"));
        assert!(doc.contains("<svg></svg>"));
    }

    #[test]
    fn test_missing_variables_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = PlotConfig::default();
        let outcome = render_chart(
            &config.request(ChartKind::Xy),
            &make_table(),
            &RenderOptions::default(),
            dir.path(),
        )
        .unwrap();
        assert_eq!(outcome, ChartOutcome::MissingVariables);
        assert!(!dir.path().join("xy_temp.html").exists());
    }

    #[test]
    fn test_render_chart_writes_html() {
        let dir = TempDir::new().unwrap();
        let config = xy_config();
        let outcome = render_chart(
            &config.request(ChartKind::Xy),
            &make_table(),
            &RenderOptions::default(),
            dir.path(),
        )
        .unwrap();
        let path = dir.path().join("xy_temp.html");
        assert_eq!(outcome, ChartOutcome::Written(path.clone()));
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("<svg"));
    }

    #[test]
    fn test_render_chart_overwrites() {
        let dir = TempDir::new().unwrap();
        let mut config = xy_config();
        let table = make_table();
        let options = RenderOptions::default();
        render_chart(&config.request(ChartKind::Xy), &table, &options, dir.path()).unwrap();
        config.xy.title = "Second".to_string();
        render_chart(&config.request(ChartKind::Xy), &table, &options, dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join("xy_temp.html")).unwrap();
        assert!(text.contains("<title>Second</title>"));
    }

    #[test]
    fn test_render_png_signature() {
        let config = xy_config();
        let figure = compiler::compile(&config.request(ChartKind::Xy), &make_table()).unwrap();
        let options = RenderOptions { width: 400, height: 300, format: OutputFormat::Png };
        let png_bytes = render_figure(&figure, &options).unwrap();
        assert!(png_bytes.len() > 8);
        assert_eq!(&png_bytes[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[test]
    fn test_unknown_variable_is_error() {
        let dir = TempDir::new().unwrap();
        let mut config = xy_config();
        config.xy.y = AxisChoice::new("missing");
        let result = render_chart(
            &config.request(ChartKind::Xy),
            &make_table(),
            &RenderOptions::default(),
            dir.path(),
        );
        assert!(result.is_err());
    }
}
