// 🧹 Field Normalizer - Raw cells → typed record
// Steps run in a fixed order: fill nulls, split address, clear phones, parse dates

use crate::attributes::{ADDRESS_PARTS, FULL_ADDRESS};
use crate::error::ImportError;
use crate::parser::{FieldValue, ImportRow};
use crate::schema::ImportSchema;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// NORMALIZED RECORD
// ============================================================================

/// A row after coercion; every schema column is present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub source_file: String,
    pub line_number: usize,
    fields: Vec<(String, FieldValue)>,
}

impl NormalizedRecord {
    /// Build a record, refusing one that lacks a declared column
    pub fn new(
        columns: &[String],
        source_file: impl Into<String>,
        line_number: usize,
        fields: Vec<(String, FieldValue)>,
    ) -> Result<Self, ImportError> {
        if let Some(missing) = columns
            .iter()
            .find(|c| !fields.iter().any(|(name, _)| name == *c))
        {
            return Err(ImportError::RowParse {
                line: line_number,
                reason: format!("column {} absent from record", missing),
            });
        }

        Ok(NormalizedRecord {
            source_file: source_file.into(),
            line_number,
            fields,
        })
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn has(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Text of a column, trimmed; empty for absent or non-text values
    pub fn text(&self, column: &str) -> String {
        match self.get(column) {
            Some(FieldValue::Text(s)) => s.trim().to_string(),
            Some(FieldValue::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        self.get(column).and_then(FieldValue::as_date)
    }

    pub fn is_blank(&self, column: &str) -> bool {
        self.get(column).map(FieldValue::is_blank).unwrap_or(true)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(c, _)| c.as_str())
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn display_name(&self) -> String {
        let name = self.text("name");
        if name.is_empty() {
            format!("line {}", self.line_number)
        } else {
            name
        }
    }
}

// ============================================================================
// REJECTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Date cell did not match the stated format
    BadDate { column: String, value: String },
    /// CSV record could not be decoded
    Malformed(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::BadDate { column, value } => {
                write!(f, "bad date in {}: '{}'", column, value)
            }
            RejectReason::Malformed(msg) => write!(f, "malformed row: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub line_number: usize,
    pub name: String,
    pub reason: RejectReason,
}

impl RejectedRow {
    pub fn into_error(self) -> ImportError {
        ImportError::RowParse {
            line: self.line_number,
            reason: self.reason.to_string(),
        }
    }
}

// ============================================================================
// FIELD NORMALIZER
// ============================================================================

pub struct FieldNormalizer<'a> {
    schema: &'a ImportSchema,
    columns: Vec<String>,
}

impl<'a> FieldNormalizer<'a> {
    /// `columns` are the columns actually carried by this file
    pub fn new(schema: &'a ImportSchema, columns: Vec<String>) -> Self {
        FieldNormalizer { schema, columns }
    }

    /// Normalize one row; the input is left untouched
    pub fn normalize(&self, row: &ImportRow) -> Result<NormalizedRecord, RejectedRow> {
        let mut fields: Vec<(String, FieldValue)> = row.cells.clone();

        // 1. nulls → empty text, except dates and the unique key
        for (column, value) in fields.iter_mut() {
            if value.is_null() && !self.schema.is_date(column) && !self.schema.is_key(column) {
                *value = FieldValue::Text(String::new());
            }
        }

        // 2. composite address
        let full_address = fields
            .iter()
            .find(|(c, _)| c == FULL_ADDRESS)
            .map(|(_, v)| v.as_text().unwrap_or("").to_string());
        if let Some(full) = full_address {
            let (street, number, complement) = split_address(&full);
            for (name, part) in ADDRESS_PARTS.iter().zip([street, number, complement]) {
                set_field(&mut fields, name, FieldValue::Text(part));
            }
        }

        // 3. phones
        for (column, value) in fields.iter_mut() {
            if column.contains("phone") {
                *value = clear_phone(value);
            }
        }

        // 4. dates
        for (column, value) in fields.iter_mut() {
            if !self.schema.is_date(column) {
                continue;
            }
            match parse_date_cell(value, &self.schema.date_format) {
                Ok(parsed) => *value = parsed,
                Err(raw) => {
                    return Err(RejectedRow {
                        line_number: row.line_number,
                        name: row.display_name(),
                        reason: RejectReason::BadDate {
                            column: column.clone(),
                            value: raw,
                        },
                    })
                }
            }
        }

        NormalizedRecord::new(&self.columns, row.source_file.clone(), row.line_number, fields).map_err(
            |e| RejectedRow {
                line_number: row.line_number,
                name: row.display_name(),
                reason: RejectReason::Malformed(e.to_string()),
            },
        )
    }
}

fn set_field(fields: &mut Vec<(String, FieldValue)>, name: &str, value: FieldValue) {
    match fields.iter_mut().find(|(c, _)| c == name) {
        Some((_, slot)) => *slot = value,
        None => fields.push((name.to_string(), value)),
    }
}

/// Split "street, number, complement"; anything past the second comma is complement
///
/// Parts are trimmed and missing parts are empty.
pub fn split_address(full: &str) -> (String, String, String) {
    let mut parts = full.splitn(3, ',').map(|p| p.trim().to_string());
    let street = parts.next().unwrap_or_default();
    let number = parts.next().unwrap_or_default();
    let complement = parts.next().unwrap_or_default();
    (street, number, complement)
}

/// Keep only digits of a text phone; other values pass through unchanged
pub fn clear_phone(value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::Text(s) => FieldValue::Text(s.chars().filter(|c| c.is_ascii_digit()).collect()),
        other => other.clone(),
    }
}

/// Parse a date cell; Err carries the offending raw text
fn parse_date_cell(value: &FieldValue, format: &str) -> Result<FieldValue, String> {
    match value {
        FieldValue::Null | FieldValue::Date(_) => Ok(value.clone()),
        FieldValue::Text(s) if s.trim().is_empty() => Ok(FieldValue::Null),
        FieldValue::Text(s) => NaiveDate::parse_from_str(s.trim(), format)
            .map(FieldValue::Date)
            .map_err(|_| s.clone()),
        FieldValue::Number(n) => Err(n.to_string()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
