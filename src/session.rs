// Session: the loaded table, the plot configuration and the generated charts of one run

use anyhow::{anyhow, Context};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compiler;
use crate::config::{ChartKind, PlotConfig};
use crate::data::Table;
use crate::derive::{Derivation, UnitConversion};
use crate::error::Notice;
use crate::import::ImportMethod;
use crate::loader;
use crate::profile;
use crate::resolve;
use crate::runtime::{self, ChartOutcome};
use crate::settings::Settings;
use crate::{OutputFormat, RenderOptions};

/// Every user action is one method. Failures are logged in full and come back
/// as a shallow [`Notice`]; the session stays usable afterwards.
pub struct Session {
    settings: Settings,
    log_path: PathBuf,
    table: Option<Table>,
    config: PlotConfig,
    charts: HashMap<ChartKind, PathBuf>,
}

impl Session {
    pub fn new(settings: Settings, log_path: PathBuf) -> Self {
        Self {
            settings,
            log_path,
            table: None,
            config: PlotConfig::default(),
            charts: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn config(&self) -> &PlotConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PlotConfig {
        &mut self.config
    }

    /// Path of the chart document generated this session, if any
    pub fn chart_path(&self, kind: ChartKind) -> Option<&Path> {
        self.charts.get(&kind).map(PathBuf::as_path)
    }

    /// Column names of the loaded table
    pub fn variables(&self) -> Vec<String> {
        self.table.as_ref().map(Table::column_names).unwrap_or_default()
    }

    fn fail(&self, err: anyhow::Error) -> Notice {
        log::error!("{:?}", err);
        Notice::Failed { log: self.log_path.clone() }
    }

    fn require_table(&self) -> Result<&Table, Notice> {
        self.table.as_ref().ok_or(Notice::NoData)
    }

    // =========================================================================
    // Data
    // =========================================================================

    /// Load and concatenate files, replacing the table. Returns the files that
    /// were skipped; if none yields data the previous table is kept.
    pub fn open_files(&mut self, paths: &[PathBuf], method: &ImportMethod) -> Result<Vec<PathBuf>, Notice> {
        let outcome = loader::load_files(paths, method).map_err(|e| self.fail(e))?;

        let Some(table) = outcome.table else {
            if outcome.failures.is_empty() {
                return Err(Notice::NoData);
            }
            for (path, err) in &outcome.failures {
                log::error!("Failed to load '{}': {:?}", path.display(), err);
            }
            return Err(Notice::Failed { log: self.log_path.clone() });
        };
        let skipped: Vec<PathBuf> = outcome.failures.into_iter().map(|(path, _)| path).collect();
        log::info!(
            "Loaded {} rows and {} columns from {} file(s)",
            table.row_count(),
            table.column_count(),
            paths.len() - skipped.len()
        );
        self.config.reconcile(&table.column_names());
        self.table = Some(table);
        Ok(skipped)
    }

    /// Start a derivation on a working copy of the table
    pub fn begin_derivation(&self) -> Result<Derivation, Notice> {
        Ok(Derivation::new(self.require_table()?))
    }

    /// Replace the table with the derivation's working copy
    pub fn commit_derivation(&mut self, derivation: Derivation) {
        let table = derivation.into_table();
        log::info!("Table now has {} columns", table.column_count());
        self.table = Some(table);
    }

    pub fn convert_units(&mut self, source: &str, conversion: UnitConversion, output: &str) -> Result<(), Notice> {
        let mut derivation = self.begin_derivation()?;
        derivation
            .convert(source, conversion, output)
            .map_err(|e| self.fail(e))?;
        log::info!("Added '{}' = {} of '{}'", output, conversion.label(), source);
        self.commit_derivation(derivation);
        Ok(())
    }

    pub fn add_formula(&mut self, expression: &str, output: &str) -> Result<(), Notice> {
        let mut derivation = self.begin_derivation()?;
        derivation
            .formula(expression, output)
            .map_err(|e| self.fail(e))?;
        log::info!("Added '{}' = {}", output, expression);
        self.commit_derivation(derivation);
        Ok(())
    }

    pub fn export_csv(&self, path: &Path) -> Result<(), Notice> {
        self.require_table()?
            .write_csv(path)
            .map_err(|e| self.fail(e))?;
        log::info!("Exported table to '{}'", path.display());
        Ok(())
    }

    // =========================================================================
    // Charts
    // =========================================================================

    /// Build the chart of `kind` into the output directory
    pub fn update_plot(&mut self, kind: ChartKind) -> Result<PathBuf, Notice> {
        let request = self.config.request(kind);
        if !resolve::is_complete(&request) {
            return Err(Notice::MissingVariables);
        }
        let table = self.require_table()?;

        match runtime::render_chart(&request, table, &self.settings.render, &self.settings.output_dir) {
            Ok(ChartOutcome::Written(path)) => {
                log::info!("Wrote {} chart to '{}'", kind, path.display());
                self.charts.insert(kind, path.clone());
                Ok(path)
            }
            Ok(ChartOutcome::MissingVariables) => Err(Notice::MissingVariables),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Copy the generated chart document of `kind` to `dest` (a file or a directory)
    pub fn export_chart(&self, kind: ChartKind, dest: &Path) -> Result<PathBuf, Notice> {
        let source = self
            .charts
            .get(&kind)
            .ok_or_else(|| self.fail(anyhow!("The {} chart has not been generated yet", kind)))?;

        let target = match source.file_name() {
            Some(name) if dest.is_dir() => dest.join(name),
            _ => dest.to_path_buf(),
        };
        fs::copy(source, &target)
            .with_context(|| format!("Failed to copy '{}' to '{}'", source.display(), target.display()))
            .map_err(|e| self.fail(e))?;
        log::info!("Exported {} chart to '{}'", kind, target.display());
        Ok(target)
    }

    /// Render the chart of `kind` as a standalone image
    pub fn export_image(&self, kind: ChartKind, path: &Path, format: OutputFormat) -> Result<(), Notice> {
        let request = self.config.request(kind);
        if !resolve::is_complete(&request) {
            return Err(Notice::MissingVariables);
        }
        let table = self.require_table()?;
        let options = RenderOptions { format, ..self.settings.render.clone() };

        compiler::compile(&request, table)
            .and_then(|figure| runtime::render_figure(&figure, &options))
            .and_then(|bytes| {
                fs::write(path, bytes).with_context(|| format!("Failed to write '{}'", path.display()))
            })
            .map_err(|e| self.fail(e))?;
        log::info!("Exported {} image to '{}'", kind, path.display());
        Ok(())
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    pub fn save_profile(&self, path: &Path) -> Result<(), Notice> {
        profile::save_profile(&self.config, path).map_err(|e| self.fail(e))?;
        log::info!("Saved profile '{}'", path.display());
        Ok(())
    }

    /// Replace the whole configuration; a profile that fails to decode changes nothing
    pub fn load_profile(&mut self, path: &Path) -> Result<(), Notice> {
        let config = profile::load_profile(path).map_err(|e| self.fail(e))?;
        self.config = config;
        log::info!("Loaded profile '{}'", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AxisChoice;
    use tempfile::TempDir;

    fn make_session(dir: &Path) -> Session {
        let settings = Settings {
            output_dir: dir.join("plots"),
            log_dir: dir.join("logs"),
            profile_dir: dir.join("profiles"),
            import_dir: dir.join("methods"),
            render: RenderOptions::default(),
        };
        Session::new(settings, dir.join("logs").join("run.log"))
    }

    fn write_csv(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_actions_without_table() {
        let dir = TempDir::new().unwrap();
        let mut session = make_session(dir.path());
        assert_eq!(session.add_formula("1", "one"), Err(Notice::NoData));
        assert_eq!(session.export_csv(&dir.path().join("x.csv")), Err(Notice::NoData));
        assert!(session.variables().is_empty());
    }

    #[test]
    fn test_open_files_reconciles_config() {
        let dir = TempDir::new().unwrap();
        let mut session = make_session(dir.path());
        session.config_mut().xy.x = AxisChoice::new("a");
        session.config_mut().xy.y = AxisChoice::new("gone");

        let file = write_csv(dir.path(), "one.csv", "a,b\n1,2\n3,4\n");
        let skipped = session.open_files(&[file], &ImportMethod::default()).unwrap();
        assert!(skipped.is_empty());
        assert_eq!(session.variables(), vec!["a", "b"]);
        assert_eq!(session.config().xy.x.variable, "a");
        assert_eq!(session.config().xy.y.variable, "");
    }

    #[test]
    fn test_open_files_without_data_keeps_table() {
        let dir = TempDir::new().unwrap();
        let mut session = make_session(dir.path());
        let good = write_csv(dir.path(), "one.csv", "a\n1\n");
        session.open_files(&[good], &ImportMethod::default()).unwrap();

        let header_only = write_csv(dir.path(), "empty.csv", "a,b\n");
        assert_eq!(session.open_files(&[header_only], &ImportMethod::default()), Err(Notice::NoData));
        assert_eq!(session.variables(), vec!["a"]);
    }

    #[test]
    fn test_open_files_all_failed_points_at_log() {
        let dir = TempDir::new().unwrap();
        let mut session = make_session(dir.path());
        let short = write_csv(dir.path(), "short.csv", "a,b\n1,2\n");
        let missing = dir.path().join("missing.csv");
        let method = ImportMethod {
            header_row: 9,
            data_row: 10,
            ..Default::default()
        };

        let result = session.open_files(&[short, missing], &method);
        let expected = Notice::Failed { log: session.log_path().to_path_buf() };
        assert_eq!(result, Err(expected.clone()));
        assert!(expected.to_string().contains("run.log"));
        assert!(session.table().is_none());
    }

    #[test]
    fn test_failed_formula_points_at_log() {
        let dir = TempDir::new().unwrap();
        let mut session = make_session(dir.path());
        let file = write_csv(dir.path(), "one.csv", "a\n1\n");
        session.open_files(&[file], &ImportMethod::default()).unwrap();

        let result = session.add_formula("@'nope' + 1", "c");
        assert_eq!(result, Err(Notice::Failed { log: session.log_path().to_path_buf() }));
        assert_eq!(session.variables(), vec!["a"]);
    }

    #[test]
    fn test_derivation_discarded_on_drop() {
        let dir = TempDir::new().unwrap();
        let mut session = make_session(dir.path());
        let file = write_csv(dir.path(), "one.csv", "a\n1\n");
        session.open_files(&[file], &ImportMethod::default()).unwrap();

        {
            let mut derivation = session.begin_derivation().unwrap();
            derivation.formula("@'a' * 2", "b").unwrap();
        }
        assert_eq!(session.variables(), vec!["a"]);

        let mut derivation = session.begin_derivation().unwrap();
        derivation.formula("@'a' * 2", "b").unwrap();
        session.commit_derivation(derivation);
        assert_eq!(session.variables(), vec!["a", "b"]);
    }

    #[test]
    fn test_update_plot_and_export_chart() {
        let dir = TempDir::new().unwrap();
        let mut session = make_session(dir.path());
        assert_eq!(session.update_plot(ChartKind::Xy), Err(Notice::MissingVariables));

        let file = write_csv(dir.path(), "one.csv", "a,b\n1,2\n2,5\n3,7\n");
        session.open_files(&[file], &ImportMethod::default()).unwrap();
        session.config_mut().xy.x = AxisChoice::new("a");
        session.config_mut().xy.y = AxisChoice::new("b");

        let path = session.update_plot(ChartKind::Xy).unwrap();
        assert_eq!(path, dir.path().join("plots").join("xy_temp.html"));
        assert_eq!(session.chart_path(ChartKind::Xy), Some(path.as_path()));

        let copied = session.export_chart(ChartKind::Xy, dir.path()).unwrap();
        assert_eq!(copied, dir.path().join("xy_temp.html"));
        assert!(copied.is_file());
        assert!(session.export_chart(ChartKind::Histogram, dir.path()).is_err());
    }

    #[test]
    fn test_export_image_svg() {
        let dir = TempDir::new().unwrap();
        let mut session = make_session(dir.path());
        let file = write_csv(dir.path(), "one.csv", "a\n1\n2\n2\n3\n");
        session.open_files(&[file], &ImportMethod::default()).unwrap();
        session.config_mut().histogram.x = AxisChoice::new("a");

        let out = dir.path().join("hist.svg");
        session.export_image(ChartKind::Histogram, &out, OutputFormat::Svg).unwrap();
        let text = fs::read_to_string(out).unwrap();
        assert!(text.contains("<svg"));
    }

    #[test]
    fn test_bad_profile_leaves_config() {
        let dir = TempDir::new().unwrap();
        let mut session = make_session(dir.path());
        session.config_mut().xy.title = "kept".to_string();

        let bad = write_csv(dir.path(), "bad.json", r#"{"X-Y": {}}"#);
        assert!(session.load_profile(&bad).is_err());
        assert_eq!(session.config().xy.title, "kept");

        let good = dir.path().join("profiles").join("p.json");
        session.save_profile(&good).unwrap();
        session.config_mut().xy.title = "changed".to_string();
        session.load_profile(&good).unwrap();
        assert_eq!(session.config().xy.title, "kept");
    }
}
