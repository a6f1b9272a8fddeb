use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::RenderOptions;

/// Settings file picked up from the working directory when none is given
pub const DEFAULT_SETTINGS_FILE: &str = "plotbot.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub profile_dir: PathBuf,
    pub import_dir: PathBuf,
    pub render: RenderOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("Temp Plots"),
            log_dir: PathBuf::from("Logs"),
            profile_dir: PathBuf::from("Profiles"),
            import_dir: PathBuf::from("CSV Import"),
            render: RenderOptions::default(),
        }
    }
}

impl Settings {
    /// Read settings from `path`, or from `plotbot.json` if it exists, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => {
                let fallback = Path::new(DEFAULT_SETTINGS_FILE);
                if fallback.is_file() {
                    Self::read(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings file '{}'", path.display()))
    }

    /// Path of a named profile in the profile directory
    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.profile_dir.join(format!("{}.json", name))
    }
}
