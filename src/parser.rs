// 🏗️ CSV Parser - Decoded upload text → ordered import rows
// Each row keeps its provenance (source file + physical line)

use crate::error::{ImportError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// IMPORT KIND
// ============================================================================

/// Which call site started the import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportKind {
    /// New persons with account, profile and history
    Persons,
    /// Field adjustments on persons already in a center
    PersonFields,
    /// Seekers reached by public work
    PublicWork,
}

impl ImportKind {
    /// Banner title used in reports
    pub fn title(&self) -> &'static str {
        match self {
            ImportKind::Persons => "IMPORT PERSONS",
            ImportKind::PersonFields => "ADJUSTED FIELDS ON PERSON",
            ImportKind::PublicWork => "IMPORT SEEKERS",
        }
    }

    /// Directory name for this kind's artifacts
    pub fn code(&self) -> &'static str {
        match self {
            ImportKind::Persons => "persons",
            ImportKind::PersonFields => "fields",
            ImportKind::PublicWork => "publicwork",
        }
    }

    pub fn from_code(code: &str) -> Option<ImportKind> {
        match code {
            "persons" => Some(ImportKind::Persons),
            "fields" => Some(ImportKind::PersonFields),
            "publicwork" | "public-work" => Some(ImportKind::PublicWork),
            _ => None,
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// FIELD VALUE
// ============================================================================

/// One cell, with "absent" kept distinct from "empty text"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Text(String),
    Number(i64),
    Date(NaiveDate),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Null, or text that is only whitespace
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

// ============================================================================
// IMPORT ROW
// ============================================================================

/// One source record before coercion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
    pub source_file: String,
    /// Physical line in the file (header is line 1)
    pub line_number: usize,
    pub cells: Vec<(String, FieldValue)>,
}

impl ImportRow {
    pub fn new(source_file: impl Into<String>, line_number: usize) -> Self {
        ImportRow {
            source_file: source_file.into(),
            line_number,
            cells: Vec::new(),
        }
    }

    /// Builder: append a text cell (empty text becomes Null)
    pub fn with_cell(mut self, column: impl Into<String>, raw: &str) -> Self {
        let value = if raw.is_empty() {
            FieldValue::Null
        } else {
            FieldValue::Text(raw.to_string())
        };
        self.cells.push((column.into(), value));
        self
    }

    /// Builder: append an already typed cell
    pub fn with_value(mut self, column: impl Into<String>, value: FieldValue) -> Self {
        self.cells.push((column.into(), value));
        self
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.cells.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    /// Name used to identify the row in reports
    pub fn display_name(&self) -> String {
        match self.get("name").and_then(|v| v.as_text()) {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("line {}", self.line_number),
        }
    }
}

// ============================================================================
// PARSED FILE
// ============================================================================

#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub file_name: String,
    pub header: Vec<String>,
    pub rows: Vec<ImportRow>,
    /// Records the CSV reader could not decode: (line, reason)
    pub malformed: Vec<(usize, String)>,
}

impl ParsedFile {
    pub fn total_entries(&self) -> usize {
        self.rows.len() + self.malformed.len()
    }
}

/// Reads an uploaded CSV text buffer
pub struct CsvTextParser {
    delimiter: u8,
}

impl CsvTextParser {
    pub fn new() -> Self {
        CsvTextParser { delimiter: b',' }
    }

    /// Builder: spreadsheets exported with `;`
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read only the header line
    pub fn read_header(&self, text: &str) -> Result<Vec<String>> {
        let mut reader = self.reader(text);
        let header = reader.headers()?;
        Ok(header.iter().map(|h| h.trim().to_string()).collect())
    }

    /// Parse the whole buffer, keeping only `columns` on each row
    ///
    /// Cells missing at the end of a short record become Null.
    pub fn parse(&self, text: &str, file_name: &str, columns: &[String]) -> Result<ParsedFile> {
        let mut reader = self.reader(text);
        let header: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let positions: Vec<(String, Option<usize>)> = columns
            .iter()
            .map(|c| (c.clone(), header.iter().position(|h| h == c)))
            .collect();

        let mut rows = Vec::new();
        let mut malformed = Vec::new();

        for (index, result) in reader.records().enumerate() {
            let fallback_line = index + 2;
            match result {
                Ok(record) => {
                    let line = record
                        .position()
                        .map(|p| p.line() as usize)
                        .unwrap_or(fallback_line);

                    if record.iter().all(|cell| cell.trim().is_empty()) {
                        continue;
                    }

                    let mut row = ImportRow::new(file_name, line);
                    for (column, position) in &positions {
                        let raw = position.and_then(|p| record.get(p)).unwrap_or("");
                        row = row.with_cell(column.clone(), raw);
                    }
                    rows.push(row);
                }
                Err(e) => {
                    let line = e
                        .position()
                        .map(|p| p.line() as usize)
                        .unwrap_or(fallback_line);
                    malformed.push((line, e.to_string()));
                }
            }
        }

        Ok(ParsedFile {
            file_name: file_name.to_string(),
            header,
            rows,
            malformed,
        })
    }

    fn reader<'a>(&self, text: &'a str) -> csv::Reader<&'a [u8]> {
        csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(text.as_bytes())
    }
}

impl Default for CsvTextParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject anything that is not a `.csv` upload
pub fn ensure_csv_name(file_name: &str) -> Result<()> {
    let is_csv = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        Ok(())
    } else {
        Err(ImportError::InvalidInput(format!("{} is not a .csv file", file_name)))
    }
}

// ============================================================================
// TESTS
// ============================================================================
