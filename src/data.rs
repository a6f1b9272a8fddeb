// In-memory tabular data: raw reader output and the typed session table

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::import::DatetimeFormat;

/// Format used when datetimes are written back out as text
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Untyped rows as produced by the file readers
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Append the rows of `other`, aligned by header name onto this table's columns.
    /// Columns missing from `other` become empty cells, extra columns are dropped.
    pub fn concat(&mut self, other: RawTable) {
        let positions: Vec<Option<usize>> = self
            .headers
            .iter()
            .map(|h| other.headers.iter().position(|o| o == h))
            .collect();

        for row in other.rows {
            let aligned = positions
                .iter()
                .map(|pos| pos.and_then(|i| row.get(i).cloned()).unwrap_or_default())
                .collect();
            self.rows.push(aligned);
        }
    }

    /// Infer column types and build a typed [`Table`]
    pub fn into_table(self, datetime_format: DatetimeFormat) -> Result<Table> {
        let names = unique_headers(&self.headers);
        let width = names.len();

        let mut cells: Vec<Vec<String>> = vec![Vec::with_capacity(self.rows.len()); width];
        for row in self.rows {
            let mut row = row.into_iter();
            for column in cells.iter_mut() {
                column.push(row.next().unwrap_or_default());
            }
        }

        let mut table = Table::default();
        for (idx, (name, values)) in names.into_iter().zip(cells).enumerate() {
            let mut data = infer_column(values, datetime_format);
            if idx == 0 && datetime_format == DatetimeFormat::UnixEpoch {
                if let ColumnData::Numeric(seconds) = &data {
                    data = ColumnData::DateTime(seconds.iter().map(|&s| from_epoch_seconds(s)).collect());
                }
            }
            table.push_column(Column::new(name, data))?;
        }
        Ok(table)
    }
}

/// Empty headers become `Unnamed: <idx>`, repeats get a `.1`, `.2`, ... suffix
fn unique_headers(headers: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(headers.len());

    for (idx, header) in headers.iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            header.clone()
        };

        let mut name = base.clone();
        while seen.contains(&name) {
            let n = counts.entry(base.clone()).or_insert(0);
            *n += 1;
            name = format!("{}.{}", base, n);
        }
        seen.insert(name.clone());
        names.push(name);
    }
    names
}

fn infer_column(values: Vec<String>, datetime_format: DatetimeFormat) -> ColumnData {
    let non_empty = || values.iter().filter(|v| !v.trim().is_empty());

    if non_empty().all(|v| v.trim().parse::<f64>().is_ok()) {
        return ColumnData::Numeric(
            values
                .iter()
                .map(|v| v.trim().parse::<f64>().unwrap_or(f64::NAN))
                .collect(),
        );
    }

    if datetime_format == DatetimeFormat::Iso && non_empty().all(|v| parse_iso_datetime(v).is_some()) {
        return ColumnData::DateTime(values.iter().map(|v| parse_iso_datetime(v)).collect());
    }

    ColumnData::Text(values)
}

/// Parse an ISO-8601 style date or datetime
pub fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Seconds since 1970-01-01 UTC to a naive datetime
pub fn from_epoch_seconds(seconds: f64) -> Option<NaiveDateTime> {
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64).map(|dt| dt.naive_utc())
}

/// Naive datetime to seconds since 1970-01-01 UTC
pub fn to_epoch_seconds(dt: &NaiveDateTime) -> f64 {
    dt.and_utc().timestamp_millis() as f64 / 1000.0
}

/// Values of a single column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Missing values are NaN
    Numeric(Vec<f64>),
    /// Missing values are empty strings
    Text(Vec<String>),
    DateTime(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::DateTime(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnData::Numeric(_) => "numeric",
            ColumnData::Text(_) => "text",
            ColumnData::DateTime(_) => "datetime",
        }
    }

    /// Cell rendered as text (empty for missing values)
    pub fn display(&self, row: usize) -> String {
        match self {
            ColumnData::Numeric(v) => match v.get(row) {
                Some(x) if !x.is_nan() => x.to_string(),
                _ => String::new(),
            },
            ColumnData::Text(v) => v.get(row).cloned().unwrap_or_default(),
            ColumnData::DateTime(v) => match v.get(row) {
                Some(Some(dt)) => dt.format(DATETIME_FORMAT).to_string(),
                _ => String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// The session dataset: named, equally long columns. Columns can be appended but
/// never modified or removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut table = Table::default();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| anyhow!("Column '{}' not found", name))
    }

    /// Append a column, keeping names unique and lengths equal
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if self.has_column(&column.name) {
            anyhow::bail!("Column '{}' already exists", column.name);
        }
        if !self.columns.is_empty() && column.data.len() != self.row_count() {
            anyhow::bail!(
                "Column '{}' has {} rows but the table has {}",
                column.name,
                column.data.len(),
                self.row_count()
            );
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn is_datetime(&self, name: &str) -> bool {
        matches!(
            self.column(name).map(|c| &c.data),
            Ok(ColumnData::DateTime(_))
        )
    }

    /// Numeric view of a column. Datetimes become epoch seconds.
    pub fn numeric(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.column(name)?;
        match &column.data {
            ColumnData::Numeric(v) => Ok(v.clone()),
            ColumnData::DateTime(v) => Ok(v
                .iter()
                .map(|dt| dt.as_ref().map(to_epoch_seconds).unwrap_or(f64::NAN))
                .collect()),
            ColumnData::Text(_) => Err(anyhow!("Column '{}' is not numeric", name)),
        }
    }

    /// Text view of a column, used for grouping
    pub fn labels(&self, name: &str) -> Result<Vec<String>> {
        let column = self.column(name)?;
        Ok((0..column.data.len()).map(|row| column.data.display(row)).collect())
    }

    /// Dump the whole table as CSV
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create '{}'", path.display()))?;

        writer
            .write_record(self.columns.iter().map(|c| c.name.as_str()))
            .context("Failed to write CSV header")?;

        for row in 0..self.row_count() {
            writer
                .write_record(self.columns.iter().map(|c| c.data.display(row)))
                .with_context(|| format!("Failed to write CSV row {}", row + 1))?;
        }

        writer.flush().context("Failed to flush CSV writer")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_infer_numeric_text_and_datetime() {
        let table = raw(
            &["t", "speed", "gear"],
            &[&["2024-01-01 00:00:00", "1.5", "N"], &["2024-01-01 00:00:01", "", "1"]],
        )
        .into_table(DatetimeFormat::Iso)
        .unwrap();

        assert!(table.is_datetime("t"));
        let speed = table.numeric("speed").unwrap();
        assert_eq!(speed[0], 1.5);
        assert!(speed[1].is_nan());
        assert_eq!(table.column("gear").unwrap().data.type_name(), "text");
        assert!(table.numeric("gear").is_err());
    }

    #[test]
    fn test_unix_epoch_converts_first_column() {
        let table = raw(&["time", "v"], &[&["0", "1"], &["86400", "2"]])
            .into_table(DatetimeFormat::UnixEpoch)
            .unwrap();
        assert!(table.is_datetime("time"));
        assert_eq!(table.numeric("time").unwrap(), vec![0.0, 86400.0]);
        assert!(!table.is_datetime("v"));
    }

    #[test]
    fn test_iso_strings_stay_text_in_epoch_mode() {
        let table = raw(&["v", "when"], &[&["1", "2024-01-01"]])
            .into_table(DatetimeFormat::UnixEpoch)
            .unwrap();
        assert!(!table.is_datetime("when"));
    }

    #[test]
    fn test_duplicate_and_empty_headers() {
        let table = raw(&["a", "a", ""], &[&["1", "2", "3"]])
            .into_table(DatetimeFormat::Iso)
            .unwrap();
        assert_eq!(table.column_names(), vec!["a", "a.1", "Unnamed: 2"]);
    }

    #[test]
    fn test_concat_aligns_by_name() {
        let mut first = raw(&["a", "b"], &[&["1", "2"]]);
        first.concat(raw(&["b", "c", "a"], &[&["20", "x", "10"]]));
        assert_eq!(first.rows, vec![vec!["1", "2"], vec!["10", "20"]]);
    }

    #[test]
    fn test_push_column_rejects_duplicates_and_length_mismatch() {
        let mut table = Table::new(vec![Column::new("a", ColumnData::Numeric(vec![1.0, 2.0]))]).unwrap();
        assert!(table
            .push_column(Column::new("a", ColumnData::Numeric(vec![1.0, 2.0])))
            .is_err());
        assert!(table
            .push_column(Column::new("b", ColumnData::Numeric(vec![1.0])))
            .is_err());
        assert_eq!(table.column_count(), 1);
    }

    #[test]
    fn test_labels_render_missing_as_empty() {
        let table = Table::new(vec![Column::new("a", ColumnData::Numeric(vec![1.0, f64::NAN]))]).unwrap();
        assert_eq!(table.labels("a").unwrap(), vec!["1", ""]);
    }

    #[test]
    fn test_parse_iso_variants() {
        assert!(parse_iso_datetime("2024-03-01").is_some());
        assert!(parse_iso_datetime("2024-03-01T12:30:00").is_some());
        assert!(parse_iso_datetime("2024-03-01T12:30:00Z").is_some());
        assert!(parse_iso_datetime("2024-03-01 12:30:00.250").is_some());
        assert!(parse_iso_datetime("March 1st").is_none());
    }
}
