// Data loader: reads delimited text and spreadsheet files into a table

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, DataType, Reader};
use std::path::{Path, PathBuf};

use crate::data::{RawTable, Table, DATETIME_FORMAT};
use crate::import::{FileType, ImportMethod};

/// Result of loading several files. Files that fail are recorded and skipped.
#[derive(Debug)]
pub struct LoadOutcome {
    pub table: Option<Table>,
    pub failures: Vec<(PathBuf, anyhow::Error)>,
}

/// Load and concatenate `paths` using one import method
pub fn load_files(paths: &[PathBuf], method: &ImportMethod) -> Result<LoadOutcome> {
    method.validate()?;

    let mut combined: Option<RawTable> = None;
    let mut failures = Vec::new();

    for path in paths {
        match read_file(path, method) {
            Ok(raw) => match combined.as_mut() {
                Some(table) => table.concat(raw),
                None => combined = Some(raw),
            },
            Err(e) => {
                log::warn!("Skipping '{}': {:#}", path.display(), e);
                failures.push((path.clone(), e));
            }
        }
    }

    let table = match combined {
        Some(raw) if !raw.rows.is_empty() => Some(raw.into_table(method.datetime_format)?),
        _ => None,
    };
    Ok(LoadOutcome { table, failures })
}

/// Read a single file with the layout described by `method`
pub fn read_file(path: &Path, method: &ImportMethod) -> Result<RawTable> {
    let rows = match method.file_type {
        FileType::Text => read_text_rows(path, method)?,
        FileType::Spreadsheet => read_sheet_rows(path, method)?,
    };
    select_rows(rows, method).with_context(|| format!("Failed to read '{}'", path.display()))
}

/// Numbered records (1-based row number, cells) from a delimited text file
fn read_text_rows(path: &Path, method: &ImportMethod) -> Result<Vec<(usize, Vec<String>)>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(method.delimiter.as_byte())
        .from_path(path)
        .with_context(|| format!("Failed to open '{}'", path.display()))?;

    // Blank lines are never returned as records, but they still count as rows
    let mut rows = Vec::new();
    let mut record = csv::StringRecord::new();
    loop {
        let line = reader.position().line() as usize;
        let more = reader
            .read_record(&mut record)
            .with_context(|| format!("Failed to parse '{}' near line {}", path.display(), line))?;
        if !more {
            break;
        }
        let number = record.position().map_or(line, |p| p.line() as usize);
        rows.push((number, record.iter().map(str::to_string).collect()));
    }
    Ok(rows)
}

/// Numbered rows of a worksheet. Row numbers are absolute sheet rows.
fn read_sheet_rows(path: &Path, method: &ImportMethod) -> Result<Vec<(usize, Vec<String>)>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| anyhow!("Failed to open workbook '{}': {}", path.display(), e))?;

    let range = if method.sheet.is_empty() {
        workbook
            .worksheet_range_at(0)
            .ok_or_else(|| anyhow!("Workbook '{}' has no sheets", path.display()))?
            .map_err(|e| anyhow!("Failed to read first sheet: {}", e))?
    } else {
        workbook
            .worksheet_range(&method.sheet)
            .map_err(|e| anyhow!("Failed to read sheet '{}': {}", method.sheet, e))?
    };

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    Ok(range
        .rows()
        .enumerate()
        .map(|(idx, cells)| (first_row + idx + 1, cells.iter().map(cell_text).collect()))
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| dt.format(DATETIME_FORMAT).to_string())
            .unwrap_or_default(),
    }
}

/// Apply the header, skip and data-start rules to numbered rows
fn select_rows(rows: Vec<(usize, Vec<String>)>, method: &ImportMethod) -> Result<RawTable> {
    let mut headers = None;
    let mut data = Vec::new();
    let skipped = method.skipped_rows();

    for (number, cells) in rows {
        if number == method.header_row {
            headers = Some(cells);
        } else if number > method.header_row && !skipped.contains(&number) {
            data.push(cells);
        }
    }

    let headers = headers.ok_or_else(|| anyhow!("Header row {} not found", method.header_row))?;
    Ok(RawTable::new(headers, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::Delimiter;
    use std::fs;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_read_simple_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.csv", "t,v\n1,2\n3,4\n");
        let raw = read_file(&path, &ImportMethod::default()).unwrap();
        assert_eq!(raw.headers, vec!["t", "v"]);
        assert_eq!(raw.rows.len(), 2);
    }

    #[test]
    fn test_skip_rows_between_header_and_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.csv", "t,v\ns,rpm\n-,-\n1,2\n3,4\n");
        let method = ImportMethod {
            header_row: 1,
            data_row: 4,
            ..Default::default()
        };
        let raw = read_file(&path, &method).unwrap();
        assert_eq!(raw.rows, vec![vec!["1", "2"], vec!["3", "4"]]);
    }

    #[test]
    fn test_rows_before_header_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.tsv", "logger v2\nt\tv\n1\t2\n");
        let method = ImportMethod {
            header_row: 2,
            data_row: 3,
            delimiter: Delimiter::Tab,
            ..Default::default()
        };
        let raw = read_file(&path, &method).unwrap();
        assert_eq!(raw.headers, vec!["t", "v"]);
        assert_eq!(raw.rows, vec![vec!["1", "2"]]);
    }

    #[test]
    fn test_blank_row_between_header_and_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.csv", "t,v\n\n1,2\n3,4\n");
        let method = ImportMethod {
            header_row: 1,
            data_row: 3,
            ..Default::default()
        };
        let raw = read_file(&path, &method).unwrap();
        assert_eq!(raw.headers, vec!["t", "v"]);
        assert_eq!(raw.rows, vec![vec!["1", "2"], vec!["3", "4"]]);
    }

    #[test]
    fn test_blank_line_above_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.csv", "Logger\n\nt,v\n1,2\n");
        let method = ImportMethod {
            header_row: 3,
            data_row: 4,
            ..Default::default()
        };
        let outcome = load_files(&[path], &method).unwrap();
        assert!(outcome.failures.is_empty());
        let table = outcome.table.unwrap();
        assert_eq!(table.column_names(), vec!["t", "v"]);
        assert_eq!(table.numeric("v").unwrap(), vec![2.0]);
    }

    #[test]
    fn test_crlf_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.csv", "units\r\nt,v\r\n\r\n5,6\r\n");
        let method = ImportMethod {
            header_row: 2,
            data_row: 4,
            ..Default::default()
        };
        let raw = read_file(&path, &method).unwrap();
        assert_eq!(raw.rows, vec![vec!["5", "6"]]);
    }

    #[test]
    fn test_missing_header_row_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.csv", "t,v\n");
        let method = ImportMethod {
            header_row: 5,
            data_row: 6,
            ..Default::default()
        };
        assert!(read_file(&path, &method).is_err());
    }

    #[test]
    fn test_load_files_concatenates() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", "t,v\n1,2\n2,3\n");
        let b = write(dir.path(), "b.csv", "t,v\n3,4\n");
        let outcome = load_files(&[a, b], &ImportMethod::default()).unwrap();
        let table = outcome.table.unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.numeric("v").unwrap(), vec![2.0, 3.0, 4.0]);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn test_load_files_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", "t,v\n1,2\n");
        let missing = dir.path().join("missing.csv");
        let outcome = load_files(&[missing.clone(), a], &ImportMethod::default()).unwrap();
        assert_eq!(outcome.table.unwrap().row_count(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, missing);
    }

    #[test]
    fn test_load_files_without_data_has_no_table() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.csv", "t,v\n");
        let outcome = load_files(&[a], &ImportMethod::default()).unwrap();
        assert!(outcome.table.is_none());
    }

    #[test]
    fn test_invalid_method_rejected() {
        let method = ImportMethod {
            header_row: 3,
            data_row: 3,
            ..Default::default()
        };
        assert!(load_files(&[], &method).is_err());
    }
}
