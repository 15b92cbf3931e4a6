// 📐 Schema Validator - Header gate before any row is touched
// A file missing one required column is rejected whole

use crate::attributes::ColumnRegistry;
use crate::error::SchemaError;
use crate::parser::ImportKind;
use serde::{Deserialize, Serialize};

/// Date format of the spreadsheet exports
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// IMPORT SCHEMA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSchema {
    pub kind: ImportKind,
    /// Required columns, in output order
    pub columns: Vec<String>,
    /// Columns carried only when the header has them
    pub optional: Vec<String>,
    /// Columns parsed as dates
    pub dates: Vec<String>,
    /// Unique key used to split rows (None: every row is primary)
    pub key_column: Option<String>,
    pub date_format: String,
}

impl ImportSchema {
    fn from_registry(kind: ImportKind, registry: &ColumnRegistry, key: Option<&str>) -> Self {
        ImportSchema {
            kind,
            columns: registry.required(),
            optional: registry.optional(),
            dates: registry.dates(),
            key_column: key.map(str::to_string),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    /// Person bulk import, keyed by email
    pub fn persons() -> Self {
        Self::from_registry(ImportKind::Persons, &ColumnRegistry::persons(), Some("email"))
    }

    /// Seeker import, keyed by email
    pub fn public_work() -> Self {
        Self::from_registry(ImportKind::PublicWork, &ColumnRegistry::public_work(), Some("email"))
    }

    /// Field-update import: the file's own header is the schema
    ///
    /// Rows are matched by `name`, so that column is mandatory.
    pub fn person_fields(header: &[String]) -> Result<Self, SchemaError> {
        let columns: Vec<String> = header
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        if !columns.iter().any(|c| c == "name") {
            return Err(SchemaError {
                file_name: String::new(),
                missing: vec!["name".to_string()],
            });
        }

        // Occurrence stages and *_date columns parse as dates like birth
        let dates = columns
            .iter()
            .filter(|c| ColumnRegistry::infer_type(c).is_date())
            .cloned()
            .collect();

        Ok(ImportSchema {
            kind: ImportKind::PersonFields,
            columns,
            optional: Vec::new(),
            dates,
            key_column: None,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        })
    }

    /// Builder: caller supplied column list
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    /// Builder: caller supplied date columns
    pub fn with_dates(mut self, dates: Vec<String>) -> Self {
        self.dates = dates;
        self
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    pub fn is_date(&self, column: &str) -> bool {
        self.dates.iter().any(|d| d == column)
    }

    pub fn is_key(&self, column: &str) -> bool {
        self.key_column.as_deref() == Some(column)
    }

    /// Fail closed on any missing required column
    pub fn validate_header(&self, file_name: &str, header: &[String]) -> Result<(), SchemaError> {
        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !header.iter().any(|h| h.trim() == c.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError {
                file_name: file_name.to_string(),
                missing,
            })
        }
    }

    /// Required columns plus the optional ones this header carries
    pub fn carried_columns(&self, header: &[String]) -> Vec<String> {
        let mut carried = self.columns.clone();
        for column in &self.optional {
            if header.iter().any(|h| h == column) && !carried.contains(column) {
                carried.push(column.clone());
            }
        }
        carried
    }
}

// ============================================================================
// TESTS
// ============================================================================
