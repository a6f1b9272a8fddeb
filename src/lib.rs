// Library exports for plotbot

pub mod config;
pub mod data;
pub mod derive;
pub mod error;
pub mod import;
pub mod loader;
pub mod logging;
pub mod parser;
pub mod profile;
pub mod session;
pub mod settings;

// Chart pipeline
pub mod compiler;
pub mod graph;
pub mod ir;
pub mod palette;
pub mod resolve;
pub mod runtime;
pub mod scale;
pub mod transform;

use serde::{Deserialize, Serialize};

pub use config::{ChartKind, PlotConfig};
pub use error::Notice;
pub use session::Session;
pub use settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    #[serde(rename = "html")]
    #[default]
    Html,
    #[serde(rename = "png")]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
}

fn default_width() -> u32 { 1000 }
fn default_height() -> u32 { 800 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            format: OutputFormat::Html,
        }
    }
}
