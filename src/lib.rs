// Member Import - Core Library
// CSV uploads → sanitized records → persons, seekers and reports

pub mod error;
pub mod attributes;   // column registry and default columns
pub mod parser;       // CSV text → ImportRow
pub mod schema;       // header gate
pub mod normalizer;   // nulls, address, phones, dates
pub mod classifier;   // primary / missing key / duplicate / rejected
pub mod rules;        // id card, checksum id, names
pub mod temporal;     // stages, statuses, latest-date rule
pub mod entities;
pub mod db;
pub mod materializer;
pub mod report;
pub mod pipeline;
pub mod config;

// Re-export commonly used types
pub use error::{ImportError, Result, SchemaError};
pub use attributes::{
    ColumnDefinition, ColumnRegistry, ColumnType, DEFAULT_COLUMNS, DEFAULT_DATES,
};
pub use parser::{CsvTextParser, FieldValue, ImportKind, ImportRow, ParsedFile};
pub use schema::ImportSchema;
pub use normalizer::{FieldNormalizer, NormalizedRecord, RejectReason, RejectedRow};
pub use classifier::{Bucket, Classification, DuplicateReason, IdentitySnapshot, RowClassifier};
pub use rules::{checksum_id_format, checksum_id_is_valid, short_name, IdCardRule, IdCardRules};
pub use temporal::{latest_occurrence, DatedValue, Occurrence, OccurrenceCode, Stage, Status};
pub use entities::{Account, Center, HistoryEntry, Member, Person, Profile, Seeker};
pub use db::{get_events_for_entity, setup_database, Event, MemberStore, SqliteStore};
pub use materializer::{Materialized, RecordMaterializer};
pub use report::{read_report, ArtifactLayout, ImportReport, ImportSummary, ReportSection, SideFileKind};
pub use pipeline::{ImportOutcome, ImportPipeline, ImportRequest};
pub use config::ImportConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
