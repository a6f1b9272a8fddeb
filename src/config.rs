use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const MAX_SUBPLOTS: usize = 4;

/// The five chart kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ChartKind {
    TimeSeries,
    Xy,
    #[value(name = "3d")]
    ThreeD,
    Histogram,
    PairPlot,
}

impl ChartKind {
    pub const ALL: [ChartKind; 5] = [
        ChartKind::TimeSeries,
        ChartKind::Xy,
        ChartKind::ThreeD,
        ChartKind::Histogram,
        ChartKind::PairPlot,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ChartKind::TimeSeries => "Time Series",
            ChartKind::Xy => "X-Y",
            ChartKind::ThreeD => "3D",
            ChartKind::Histogram => "Histogram",
            ChartKind::PairPlot => "Pair Plot",
        }
    }

    /// File stem of the generated chart document
    pub fn file_stem(self) -> &'static str {
        match self {
            ChartKind::TimeSeries => "ts_temp",
            ChartKind::Xy => "xy_temp",
            ChartKind::ThreeD => "3d_temp",
            ChartKind::Histogram => "hist_temp",
            ChartKind::PairPlot => "pp_temp",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Time series
// =============================================================================

/// One y axis of a time series subplot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesAxis {
    pub series: Vec<String>,
    pub title: String,
    pub log: bool,
}

impl SeriesAxis {
    /// Axis title: the override, else the first series name
    pub fn resolved_title(&self) -> Option<String> {
        if !self.title.is_empty() {
            Some(self.title.clone())
        } else {
            self.series.first().cloned()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubplotAxes {
    pub left: SeriesAxis,
    pub right: SeriesAxis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesConfig {
    pub title: String,
    #[serde(deserialize_with = "clamped_subplots")]
    pub subplots: usize,
    pub time: String,
    pub axes: [SubplotAxes; MAX_SUBPLOTS],
}

impl Default for TimeSeriesConfig {
    fn default() -> Self {
        Self {
            title: String::new(),
            subplots: 1,
            time: String::new(),
            axes: Default::default(),
        }
    }
}

impl TimeSeriesConfig {
    pub fn set_subplots(&mut self, n: usize) {
        self.subplots = clamp_subplots(n);
    }

    /// Axes of the enabled subplots
    pub fn enabled_axes(&self) -> &[SubplotAxes] {
        &self.axes[..clamp_subplots(self.subplots)]
    }
}

fn clamp_subplots(n: usize) -> usize {
    n.clamp(1, MAX_SUBPLOTS)
}

fn clamped_subplots<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let n = i64::deserialize(deserializer)?;
    Ok(n.clamp(1, MAX_SUBPLOTS as i64) as usize)
}

// =============================================================================
// X-Y
// =============================================================================

/// A single variable choice with its axis options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisChoice {
    pub variable: String,
    pub title: String,
    pub log: bool,
}

impl AxisChoice {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            ..Default::default()
        }
    }

    pub fn is_set(&self) -> bool {
        !self.variable.is_empty()
    }

    /// Axis title: the override, else the variable name
    pub fn resolved_title(&self) -> String {
        if self.title.is_empty() {
            self.variable.clone()
        } else {
            self.title.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum XyStyle {
    #[default]
    Scatter,
    Line,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trendline {
    #[default]
    None,
    #[serde(rename = "Least Squares")]
    LeastSquares,
    #[serde(rename = "LOWESS")]
    Lowess,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct XyConfig {
    pub title: String,
    pub style: XyStyle,
    pub x: AxisChoice,
    pub y: AxisChoice,
    #[serde(deserialize_with = "Option::deserialize")]
    pub color: Option<String>,
    pub trendline: Trendline,
}

// =============================================================================
// 3D
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreeDConfig {
    pub title: String,
    pub x: AxisChoice,
    pub y: AxisChoice,
    pub z: AxisChoice,
    #[serde(deserialize_with = "Option::deserialize")]
    pub color: Option<String>,
}

// =============================================================================
// Histogram
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Normalization {
    #[default]
    None,
    Percent,
    Density,
    #[serde(rename = "Probability Density")]
    ProbabilityDensity,
}

impl Normalization {
    pub fn label(self) -> Option<&'static str> {
        match self {
            Normalization::None => None,
            Normalization::Percent => Some("percent"),
            Normalization::Density => Some("density"),
            Normalization::ProbabilityDensity => Some("probability density"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinFunction {
    #[default]
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl BinFunction {
    pub fn label(self) -> &'static str {
        match self {
            BinFunction::Count => "count",
            BinFunction::Sum => "sum",
            BinFunction::Avg => "avg",
            BinFunction::Min => "min",
            BinFunction::Max => "max",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramConfig {
    pub title: String,
    pub x: AxisChoice,
    /// 0 means automatic
    pub bins: usize,
    pub normalization: Normalization,
    #[serde(deserialize_with = "Option::deserialize")]
    pub color: Option<String>,
    pub function: BinFunction,
    #[serde(deserialize_with = "Option::deserialize")]
    pub y: Option<String>,
}

impl HistogramConfig {
    /// The value column only applies to functions other than count
    pub fn value_column(&self) -> Option<&str> {
        match self.function {
            BinFunction::Count => None,
            _ => self.y.as_deref().filter(|y| !y.is_empty()),
        }
    }
}

// =============================================================================
// Pair plot
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairPlotConfig {
    pub title: String,
    pub variables: Vec<String>,
    #[serde(deserialize_with = "Option::deserialize")]
    pub color: Option<String>,
}

// =============================================================================
// All chart kinds
// =============================================================================

/// Configuration for every chart kind; also the profile document.
/// Every key is required when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    #[serde(rename = "Time Series")]
    pub time_series: TimeSeriesConfig,
    #[serde(rename = "X-Y")]
    pub xy: XyConfig,
    #[serde(rename = "3D")]
    pub three_d: ThreeDConfig,
    #[serde(rename = "Histogram")]
    pub histogram: HistogramConfig,
    #[serde(rename = "Pair Plot")]
    pub pair_plot: PairPlotConfig,
}

/// A chart kind together with its configuration
#[derive(Debug, Clone, Copy)]
pub enum ChartRequest<'a> {
    TimeSeries(&'a TimeSeriesConfig),
    Xy(&'a XyConfig),
    ThreeD(&'a ThreeDConfig),
    Histogram(&'a HistogramConfig),
    PairPlot(&'a PairPlotConfig),
}

impl ChartRequest<'_> {
    pub fn kind(&self) -> ChartKind {
        match self {
            ChartRequest::TimeSeries(_) => ChartKind::TimeSeries,
            ChartRequest::Xy(_) => ChartKind::Xy,
            ChartRequest::ThreeD(_) => ChartKind::ThreeD,
            ChartRequest::Histogram(_) => ChartKind::Histogram,
            ChartRequest::PairPlot(_) => ChartKind::PairPlot,
        }
    }
}

impl PlotConfig {
    pub fn request(&self, kind: ChartKind) -> ChartRequest<'_> {
        match kind {
            ChartKind::TimeSeries => ChartRequest::TimeSeries(&self.time_series),
            ChartKind::Xy => ChartRequest::Xy(&self.xy),
            ChartKind::ThreeD => ChartRequest::ThreeD(&self.three_d),
            ChartKind::Histogram => ChartRequest::Histogram(&self.histogram),
            ChartKind::PairPlot => ChartRequest::PairPlot(&self.pair_plot),
        }
    }

    /// Drop every selection that no longer names a column
    pub fn reconcile(&mut self, columns: &[String]) {
        let exists = |name: &str| columns.iter().any(|c| c == name);
        let keep_single = |name: &mut String| {
            if !exists(name) {
                name.clear();
            }
        };
        let keep_optional = |name: &mut Option<String>| {
            if name.as_deref().is_some_and(|n| !exists(n)) {
                *name = None;
            }
        };
        let keep_list = |names: &mut Vec<String>| names.retain(|n| exists(n));

        let ts = &mut self.time_series;
        keep_single(&mut ts.time);
        for axes in ts.axes.iter_mut() {
            keep_list(&mut axes.left.series);
            keep_list(&mut axes.right.series);
        }

        keep_single(&mut self.xy.x.variable);
        keep_single(&mut self.xy.y.variable);
        keep_optional(&mut self.xy.color);

        keep_single(&mut self.three_d.x.variable);
        keep_single(&mut self.three_d.y.variable);
        keep_single(&mut self.three_d.z.variable);
        keep_optional(&mut self.three_d.color);

        keep_single(&mut self.histogram.x.variable);
        keep_optional(&mut self.histogram.color);
        keep_optional(&mut self.histogram.y);

        keep_list(&mut self.pair_plot.variables);
        keep_optional(&mut self.pair_plot.color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_subplots_clamped() {
        let mut ts = TimeSeriesConfig::default();
        ts.set_subplots(0);
        assert_eq!(ts.subplots, 1);
        ts.set_subplots(9);
        assert_eq!(ts.subplots, 4);
        ts.set_subplots(3);
        assert_eq!(ts.enabled_axes().len(), 3);
    }

    #[test]
    fn test_subplots_clamped_on_deserialize() {
        let mut json = serde_json::to_value(TimeSeriesConfig::default()).unwrap();
        json["subplots"] = serde_json::json!(7);
        let ts: TimeSeriesConfig = serde_json::from_value(json).unwrap();
        assert_eq!(ts.subplots, 4);
    }

    #[test]
    fn test_series_axis_title_fallback() {
        let axis = SeriesAxis {
            series: names(&["rpm", "speed"]),
            title: String::new(),
            log: false,
        };
        assert_eq!(axis.resolved_title(), Some("rpm".to_string()));
        assert_eq!(SeriesAxis::default().resolved_title(), None);
    }

    #[test]
    fn test_reconcile_keeps_existing_names() {
        let mut config = PlotConfig::default();
        config.time_series.time = "t".to_string();
        config.time_series.axes[0].left.series = names(&["a", "gone"]);
        config.xy.x = AxisChoice::new("a");
        config.xy.y = AxisChoice::new("gone");
        config.xy.color = Some("gone".to_string());
        config.histogram.y = Some("b".to_string());
        config.pair_plot.variables = names(&["gone", "b", "a"]);

        config.reconcile(&names(&["t", "a", "b"]));

        assert_eq!(config.time_series.time, "t");
        assert_eq!(config.time_series.axes[0].left.series, vec!["a"]);
        assert_eq!(config.xy.x.variable, "a");
        assert_eq!(config.xy.y.variable, "");
        assert_eq!(config.xy.color, None);
        assert_eq!(config.histogram.y, Some("b".to_string()));
        assert_eq!(config.pair_plot.variables, vec!["b", "a"]);
    }

    #[test]
    fn test_reconcile_is_case_sensitive() {
        let mut config = PlotConfig::default();
        config.xy.x = AxisChoice::new("Speed");
        config.reconcile(&names(&["speed"]));
        assert!(!config.xy.x.is_set());
    }

    #[test]
    fn test_histogram_value_column_only_for_aggregates() {
        let mut hist = HistogramConfig {
            y: Some("v".to_string()),
            ..Default::default()
        };
        assert_eq!(hist.value_column(), None);
        hist.function = BinFunction::Sum;
        assert_eq!(hist.value_column(), Some("v"));
    }

    #[test]
    fn test_request_dispatch() {
        let config = PlotConfig::default();
        for kind in ChartKind::ALL {
            assert_eq!(config.request(kind).kind(), kind);
        }
    }
}
