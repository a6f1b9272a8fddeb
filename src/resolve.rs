use anyhow::{Context, Result};

use crate::config::{AxisChoice, ChartRequest};
use crate::data::Table;
use crate::ir::AxisScale;

/// Whether every required variable of the request has been chosen
pub fn is_complete(request: &ChartRequest<'_>) -> bool {
    match request {
        ChartRequest::TimeSeries(ts) => {
            !ts.time.is_empty() && !ts.axes[0].left.series.is_empty()
        }
        ChartRequest::Xy(xy) => xy.x.is_set() && xy.y.is_set(),
        ChartRequest::ThreeD(c) => c.x.is_set() && c.y.is_set() && c.z.is_set(),
        ChartRequest::Histogram(h) => h.x.is_set(),
        ChartRequest::PairPlot(pp) => pp.variables.len() >= 2,
    }
}

/// Numeric values of a column, with the role it plays in the error message
pub fn numeric_column(table: &Table, name: &str, role: &str) -> Result<Vec<f64>> {
    table
        .numeric(name)
        .with_context(|| format!("Cannot use '{}' as the {}", name, role))
}

/// Axis scale for a column: datetimes get a time axis, otherwise linear or log
pub fn axis_scale(table: &Table, name: &str, log: bool) -> AxisScale {
    if table.is_datetime(name) {
        AxisScale::Time
    } else if log {
        AxisScale::Log
    } else {
        AxisScale::Linear
    }
}

pub fn choice_scale(table: &Table, choice: &AxisChoice) -> AxisScale {
    axis_scale(table, &choice.variable, choice.log)
}

/// Group labels of the colour column, if one is chosen
pub fn group_labels(table: &Table, color: Option<&str>) -> Result<Option<Vec<String>>> {
    match color.filter(|c| !c.is_empty()) {
        Some(name) => {
            let labels = table
                .labels(name)
                .with_context(|| format!("Cannot group by '{}'", name))?;
            Ok(Some(labels))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PairPlotConfig, PlotConfig, TimeSeriesConfig, XyConfig};
    use crate::data::{Column, ColumnData};

    #[test]
    fn test_time_series_requires_time_and_first_left_axis() {
        let mut ts = TimeSeriesConfig::default();
        ts.time = "t".to_string();
        assert!(!is_complete(&ChartRequest::TimeSeries(&ts)));

        ts.axes[1].left.series.push("a".to_string());
        assert!(!is_complete(&ChartRequest::TimeSeries(&ts)));

        ts.axes[0].left.series.push("a".to_string());
        assert!(is_complete(&ChartRequest::TimeSeries(&ts)));
    }

    #[test]
    fn test_xy_requires_both_axes() {
        let mut xy = XyConfig::default();
        xy.x = AxisChoice::new("a");
        assert!(!is_complete(&ChartRequest::Xy(&xy)));
        xy.y = AxisChoice::new("b");
        assert!(is_complete(&ChartRequest::Xy(&xy)));
    }

    #[test]
    fn test_pair_plot_requires_two_variables() {
        let mut pp = PairPlotConfig::default();
        pp.variables.push("a".to_string());
        assert!(!is_complete(&ChartRequest::PairPlot(&pp)));
        pp.variables.push("b".to_string());
        assert!(is_complete(&ChartRequest::PairPlot(&pp)));
    }

    #[test]
    fn test_default_config_is_incomplete() {
        let config = PlotConfig::default();
        for kind in crate::config::ChartKind::ALL {
            assert!(!is_complete(&config.request(kind)));
        }
    }

    #[test]
    fn test_axis_scale() {
        let table = Table::new(vec![
            Column::new("t", ColumnData::DateTime(vec![None])),
            Column::new("v", ColumnData::Numeric(vec![1.0])),
        ])
        .unwrap();
        assert_eq!(axis_scale(&table, "t", true), AxisScale::Time);
        assert_eq!(axis_scale(&table, "v", true), AxisScale::Log);
        assert_eq!(axis_scale(&table, "v", false), AxisScale::Linear);
    }

    #[test]
    fn test_text_column_not_numeric() {
        let table = Table::new(vec![Column::new("s", ColumnData::Text(vec!["a".into()]))]).unwrap();
        assert!(numeric_column(&table, "s", "X variable").is_err());
        assert!(group_labels(&table, Some("s")).unwrap().is_some());
        assert!(group_labels(&table, None).unwrap().is_none());
        assert!(group_labels(&table, Some("missing")).is_err());
    }
}
