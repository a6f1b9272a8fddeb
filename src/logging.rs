// Run log: one plain-text file per application run

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use env_logger::{Env, Target, WriteStyle};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// File name of the log for a run started at `started`
pub fn log_file_name(started: NaiveDateTime) -> String {
    format!("plotbot_{}.log", started.format("%Y%m%d_%H%M%S"))
}

/// Create this run's log file in `dir` and route the `log` facade into it.
/// The level defaults to `info` and follows `RUST_LOG` when set.
pub fn init(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory '{}'", dir.display()))?;

    let path = dir.join(log_file_name(chrono::Local::now().naive_local()));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file '{}'", path.display()))?;

    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .write_style(WriteStyle::Never)
        .try_init()
        .context("Failed to install logger")?;

    log::info!("plotbot {} started", env!("CARGO_PKG_VERSION"));
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_log_file_name() {
        let started = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 9)
            .unwrap();
        assert_eq!(log_file_name(started), "plotbot_20240305_140709.log");
    }
}
