// Profile persistence: saving and restoring the plot configuration as JSON

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::config::{
    AxisChoice, BinFunction, Normalization, PlotConfig, SeriesAxis, Trendline, XyStyle,
};

/// Write the configuration of every chart kind to `path`
pub fn save_profile(config: &PlotConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config).context("Failed to serialize profile")?;
    fs::write(path, json).with_context(|| format!("Failed to write profile '{}'", path.display()))?;
    Ok(())
}

/// Read a profile. The whole document is decoded before anything is returned,
/// so a bad file never yields a partial configuration.
pub fn load_profile(path: &Path) -> Result<PlotConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile '{}'", path.display()))?;
    parse_profile(&text).with_context(|| format!("Invalid profile '{}'", path.display()))
}

/// Decode a profile document in either the keyed or the legacy flat format
pub fn parse_profile(text: &str) -> Result<PlotConfig> {
    let value: Value = serde_json::from_str(text).context("Profile is not valid JSON")?;
    match &value {
        Value::Object(map) if map.contains_key("n_sub") => decode_legacy(map),
        _ => serde_json::from_value(value).context("Profile does not match the expected layout"),
    }
}

// =============================================================================
// Legacy flat format
// =============================================================================

struct Legacy<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Legacy<'a> {
    fn get(&self, key: &str) -> Result<&'a Value> {
        self.map
            .get(key)
            .ok_or_else(|| anyhow!("Missing profile key '{}'", key))
    }

    fn text(&self, key: &str) -> Result<String> {
        self.get(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Profile key '{}' must be a string", key))
    }

    /// Colour selectors stored "None" for no selection
    fn optional(&self, key: &str) -> Result<Option<String>> {
        let text = self.text(key)?;
        Ok(match text.as_str() {
            "" | "None" => None,
            _ => Some(text),
        })
    }

    fn flag(&self, key: &str) -> Result<bool> {
        self.get(key)?
            .as_bool()
            .ok_or_else(|| anyhow!("Profile key '{}' must be true or false", key))
    }

    fn count(&self, key: &str) -> Result<usize> {
        let n = self
            .get(key)?
            .as_i64()
            .ok_or_else(|| anyhow!("Profile key '{}' must be an integer", key))?;
        Ok(n.max(0) as usize)
    }

    fn list(&self, key: &str) -> Result<Vec<String>> {
        self.get(key)?
            .as_array()
            .ok_or_else(|| anyhow!("Profile key '{}' must be a list", key))?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("Profile key '{}' must list names", key))
            })
            .collect()
    }

    fn axis(&self, key: &str) -> Result<SeriesAxis> {
        Ok(SeriesAxis {
            series: self.list(key)?,
            title: self.text(&format!("{}_title", key))?,
            log: self.flag(&format!("{}_log", key))?,
        })
    }

    fn choice(&self, prefix: &str, log: bool) -> Result<AxisChoice> {
        Ok(AxisChoice {
            variable: self.text(&format!("{}_var", prefix))?,
            title: self.text(&format!("{}_title", prefix))?,
            log: if log {
                self.flag(&format!("{}_log", prefix))?
            } else {
                false
            },
        })
    }
}

fn decode_legacy(map: &Map<String, Value>) -> Result<PlotConfig> {
    let legacy = Legacy { map };
    let mut config = PlotConfig::default();

    let ts = &mut config.time_series;
    ts.set_subplots(legacy.count("n_sub")?);
    ts.time = legacy.text("ts_time")?;
    for (i, axes) in ts.axes.iter_mut().enumerate() {
        axes.left = legacy.axis(&format!("y{}_l", i + 1))?;
        axes.right = legacy.axis(&format!("y{}_r", i + 1))?;
    }

    let xy = &mut config.xy;
    xy.style = match legacy.text("xy_style")?.as_str() {
        "Line" => XyStyle::Line,
        _ => XyStyle::Scatter,
    };
    xy.x = legacy.choice("xy_x", true)?;
    xy.y = legacy.choice("xy_y", true)?;
    xy.color = legacy.optional("xy_color")?;
    xy.trendline = match legacy.text("xy_trend")?.as_str() {
        "Least Squares" | "Least Sqaures" => Trendline::LeastSquares,
        "LOWESS" => Trendline::Lowess,
        _ => Trendline::None,
    };

    let three_d = &mut config.three_d;
    three_d.x = legacy.choice("3d_x", false)?;
    three_d.y = legacy.choice("3d_y", false)?;
    three_d.z = legacy.choice("3d_z", false)?;
    three_d.color = legacy.optional("3d_color")?;

    let hist = &mut config.histogram;
    hist.x = legacy.choice("hist_x", false)?;
    hist.bins = legacy.count("hist_bins")?;
    hist.normalization = match legacy.text("hist_normal")?.as_str() {
        "Percent" => Normalization::Percent,
        "Density" => Normalization::Density,
        "Probability Density" => Normalization::ProbabilityDensity,
        _ => Normalization::None,
    };
    hist.color = legacy.optional("hist_color")?;
    hist.function = match legacy.text("hist_bin_func")?.as_str() {
        "Sum" => BinFunction::Sum,
        "Avg" => BinFunction::Avg,
        "Min" => BinFunction::Min,
        "Max" => BinFunction::Max,
        _ => BinFunction::Count,
    };
    hist.y = legacy.optional("hist_y_var")?;

    config.pair_plot.variables = legacy.list("pp_var")?;
    config.pair_plot.color = legacy.optional("pp_color")?;

    Ok(config)
}
