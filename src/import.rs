// Import methods: saved recipes describing how to parse a source file layout

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::parser::legacy::{parse_legacy_method, LegacyEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileType {
    #[default]
    Text,
    Spreadsheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Delimiter {
    #[default]
    Comma,
    Semicolon,
    Tab,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Semicolon => b';',
            Delimiter::Tab => b'\t',
        }
    }

    /// Map a delimiter as written in legacy method files
    pub fn from_legacy(value: &str) -> Result<Self> {
        match value {
            "," => Ok(Delimiter::Comma),
            ";" => Ok(Delimiter::Semicolon),
            "\t" | "\\t" => Ok(Delimiter::Tab),
            other => match other.trim().to_ascii_lowercase().as_str() {
                "," | "comma" => Ok(Delimiter::Comma),
                ";" | "semicolon" => Ok(Delimiter::Semicolon),
                "tab" => Ok(Delimiter::Tab),
                _ => Err(anyhow!("Unsupported delimiter '{}'", other)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DatetimeFormat {
    #[default]
    #[serde(rename = "ISO")]
    Iso,
    #[serde(rename = "Unix Epoch")]
    UnixEpoch,
}

/// How to parse a source file. Row numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMethod {
    #[serde(rename = "File_Type")]
    pub file_type: FileType,
    #[serde(rename = "Header_Row")]
    pub header_row: usize,
    #[serde(rename = "Data_Row")]
    pub data_row: usize,
    #[serde(rename = "Delimiter")]
    pub delimiter: Delimiter,
    #[serde(rename = "Sheet")]
    pub sheet: String,
    #[serde(rename = "Datetime_Format")]
    pub datetime_format: DatetimeFormat,
}

impl Default for ImportMethod {
    fn default() -> Self {
        Self {
            file_type: FileType::Text,
            header_row: 1,
            data_row: 2,
            delimiter: Delimiter::Comma,
            sheet: String::new(),
            datetime_format: DatetimeFormat::Iso,
        }
    }
}

impl ImportMethod {
    pub fn validate(&self) -> Result<()> {
        if self.header_row == 0 {
            anyhow::bail!("Header row must be 1 or greater");
        }
        if self.data_row <= self.header_row {
            anyhow::bail!(
                "Data row ({}) must come after the header row ({})",
                self.data_row,
                self.header_row
            );
        }
        Ok(())
    }

    /// Rows strictly between header and data start, skipped only when the gap exceeds one row
    pub fn skipped_rows(&self) -> Vec<usize> {
        if self.data_row.saturating_sub(self.header_row) <= 1 {
            Vec::new()
        } else {
            (self.header_row + 1..self.data_row).collect()
        }
    }

    /// Load a method file: JSON, or the legacy `.cm` line format
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read import method '{}'", path.display()))?;

        let is_legacy = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("cm"))
            .unwrap_or(false);

        let method = if is_legacy {
            Self::from_legacy(&text)?
        } else {
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid import method '{}'", path.display()))?
        };
        method.validate()?;
        Ok(method)
    }

    fn from_legacy(text: &str) -> Result<Self> {
        let (_, entries) = parse_legacy_method(text)
            .map_err(|e| anyhow!("Invalid legacy import method: {:?}", e))?;

        let mut method = ImportMethod::default();
        for entry in entries {
            match entry {
                LegacyEntry::Header(row) => method.header_row = row,
                LegacyEntry::DataStart(row) => method.data_row = row,
                LegacyEntry::Delimiter(d) => method.delimiter = Delimiter::from_legacy(&d)?,
            }
        }
        Ok(method)
    }

    /// Write the method as `<dir>/<name>.json`
    pub fn save(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        if name.trim().is_empty() {
            anyhow::bail!("Import method name cannot be empty");
        }
        self.validate()?;
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create '{}'", dir.display()))?;

        let path = dir.join(format!("{}.json", name));
        let json = serde_json::to_string_pretty(self).context("Failed to serialize import method")?;
        fs::write(&path, json).with_context(|| format!("Failed to write '{}'", path.display()))?;
        Ok(path)
    }

    /// Saved methods in a directory, sorted by file name
    pub fn list(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to read '{}'", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("json") | Some("cm")
                )
            })
            .collect();
        paths.sort();
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_rows_gap() {
        let method = ImportMethod {
            header_row: 2,
            data_row: 5,
            ..Default::default()
        };
        assert_eq!(method.skipped_rows(), vec![3, 4]);
    }

    #[test]
    fn test_skipped_rows_adjacent() {
        let method = ImportMethod::default();
        assert!(method.skipped_rows().is_empty());
    }

    #[test]
    fn test_validate_rejects_data_before_header() {
        let method = ImportMethod {
            header_row: 3,
            data_row: 3,
            ..Default::default()
        };
        assert!(method.validate().is_err());
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(ImportMethod {
            datetime_format: DatetimeFormat::UnixEpoch,
            delimiter: Delimiter::Tab,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json["File_Type"], "Text");
        assert_eq!(json["Delimiter"], "Tab");
        assert_eq!(json["Datetime_Format"], "Unix Epoch");
        assert_eq!(json["Header_Row"], 1);
    }

    #[test]
    fn test_missing_key_fails() {
        let json = r#"{"File_Type": "Text", "Header_Row": 1, "Data_Row": 2, "Delimiter": "Comma", "Sheet": ""}"#;
        assert!(serde_json::from_str::<ImportMethod>(json).is_err());
    }

    #[test]
    fn test_from_legacy() {
        let method = ImportMethod::from_legacy("header:1\ndata start:3\ndelimiter:;").unwrap();
        assert_eq!(method.header_row, 1);
        assert_eq!(method.data_row, 3);
        assert_eq!(method.delimiter, Delimiter::Semicolon);
        assert_eq!(method.file_type, FileType::Text);
    }

    #[test]
    fn test_legacy_delimiters() {
        assert_eq!(Delimiter::from_legacy("\t").unwrap(), Delimiter::Tab);
        assert_eq!(Delimiter::from_legacy("\\t").unwrap(), Delimiter::Tab);
        assert!(Delimiter::from_legacy("|").is_err());
    }
}
