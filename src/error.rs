// 🚨 Error Types - Import pipeline failures
// Only schema errors abort a run; row-level errors are recovered and reported

use thiserror::Error;

/// Result type for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

/// A required column is absent from the uploaded file header
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("file is inconsistent: {file_name} is missing column(s) {}", missing.join(", "))]
pub struct SchemaError {
    pub file_name: String,
    pub missing: Vec<String>,
}

#[derive(Error, Debug)]
pub enum ImportError {
    /// Header check failed, nothing was processed
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A single row failed type coercion
    #[error("Row {line}: {reason}")]
    RowParse { line: usize, reason: String },

    /// Unique key already known before materialization
    #[error("Key already used: {key}")]
    DuplicateKey { key: String },

    /// Unique key collided in the store despite passing classification
    #[error("Persistence conflict on key: {key}")]
    PersistenceConflict { key: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ImportError {
    /// True for errors that are recovered at row granularity
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            ImportError::RowParse { .. }
                | ImportError::DuplicateKey { .. }
                | ImportError::PersistenceConflict { .. }
        )
    }
}
