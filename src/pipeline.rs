// 🚰 Import Pipeline - text buffer → entities + report
//
// schema gate → parse → normalize → classify → materialize → report
//
// The schema gate runs before anything touches the store or the disk: a file
// missing one required column leaves no trace.

use crate::classifier::{IdentitySnapshot, RowClassifier};
use crate::db::MemberStore;
use crate::entities::Center;
use crate::error::{ImportError, Result};
use crate::materializer::{Materialized, RecordMaterializer};
use crate::normalizer::{FieldNormalizer, NormalizedRecord, RejectReason, RejectedRow};
use crate::parser::{ensure_csv_name, CsvTextParser, ImportKind};
use crate::report::{read_report, ArtifactLayout, ImportReport, ImportSummary, ReportSection, SideFileKind};
use crate::schema::ImportSchema;
use chrono::Local;
use std::path::PathBuf;
use tracing::{debug, info, warn};

// ============================================================================
// REQUEST / OUTCOME
// ============================================================================

pub struct ImportRequest<'a> {
    pub kind: ImportKind,
    /// Decoded file contents
    pub text: &'a str,
    /// Name the file is stored and reported under
    pub file_name: &'a str,
    pub center: &'a Center,
    pub actor: &'a str,
    /// Overrides the kind's default schema
    pub schema: Option<ImportSchema>,
    /// Overrides the schema's date format
    pub date_format: Option<String>,
}

impl<'a> ImportRequest<'a> {
    pub fn new(
        kind: ImportKind,
        text: &'a str,
        file_name: &'a str,
        center: &'a Center,
        actor: &'a str,
    ) -> Self {
        ImportRequest {
            kind,
            text,
            file_name,
            center,
            actor,
            schema: None,
            date_format: None,
        }
    }

    pub fn with_schema(mut self, schema: ImportSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub summary: ImportSummary,
    pub report_path: PathBuf,
    pub side_files: Vec<(SideFileKind, PathBuf)>,
    pub report_lines: Vec<String>,
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct ImportPipeline<S: MemberStore> {
    store: S,
    layout: ArtifactLayout,
    parser: CsvTextParser,
}

impl<S: MemberStore> ImportPipeline<S> {
    pub fn new(store: S, layout: ArtifactLayout) -> Self {
        ImportPipeline {
            store,
            layout,
            parser: CsvTextParser::new(),
        }
    }

    pub fn with_parser(mut self, parser: CsvTextParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Resolve the schema for a request and check the header against it
    fn schema_for(&self, request: &ImportRequest<'_>, header: &[String]) -> Result<ImportSchema> {
        let schema = match (&request.schema, request.kind) {
            (Some(schema), _) => schema.clone(),
            (None, ImportKind::Persons) => ImportSchema::persons(),
            (None, ImportKind::PublicWork) => ImportSchema::public_work(),
            (None, ImportKind::PersonFields) => ImportSchema::person_fields(header).map_err(|mut e| {
                e.file_name = request.file_name.to_string();
                e
            })?,
        };
        let schema = match &request.date_format {
            Some(format) => schema.with_date_format(format.clone()),
            None => schema,
        };

        schema.validate_header(request.file_name, header)?;
        Ok(schema)
    }

    pub fn run(&mut self, request: ImportRequest<'_>) -> Result<ImportOutcome> {
        let started = Local::now();
        info!(
            kind = %request.kind,
            file = request.file_name,
            center = %request.center,
            actor = request.actor,
            "import started"
        );

        // 1. schema gate
        ensure_csv_name(request.file_name)?;
        let header = self.parser.read_header(request.text)?;
        let schema = self.schema_for(&request, &header).map_err(|e| {
            warn!(file = request.file_name, error = %e, "file rejected by schema");
            e
        })?;
        let columns = schema.carried_columns(&header);

        // 2. parse
        let parsed = self.parser.parse(request.text, request.file_name, &columns)?;
        let entries = parsed.total_entries();
        debug!(rows = parsed.rows.len(), malformed = parsed.malformed.len(), "file parsed");

        // 3. normalize
        let normalizer = FieldNormalizer::new(&schema, columns.clone());
        let mut records = Vec::new();
        let mut rejected: Vec<RejectedRow> = parsed
            .malformed
            .into_iter()
            .map(|(line, reason)| RejectedRow {
                line_number: line,
                name: format!("line {}", line),
                reason: RejectReason::Malformed(reason),
            })
            .collect();
        for row in &parsed.rows {
            match normalizer.normalize(row) {
                Ok(record) => records.push(record),
                Err(row_error) => rejected.push(row_error),
            }
        }
        for row in &rejected {
            warn!(error = %row.clone().into_error(), "row rejected");
        }

        // 4. classify
        let snapshot = match request.kind {
            ImportKind::Persons => self.store.existing_emails()?,
            ImportKind::PublicWork => self.store.existing_seeker_emails(&request.center.id)?,
            ImportKind::PersonFields => IdentitySnapshot::default(),
        };
        let classification =
            RowClassifier::new(schema.key_column.clone()).split(records, rejected, &snapshot);
        debug!(
            primary = classification.primary.len(),
            missing_key = classification.missing_key.len(),
            used_key = classification.used_key.len(),
            repeated = classification.repeated.len(),
            rejected = classification.rejected.len(),
            "rows classified"
        );
        if let Some(key_column) = &schema.key_column {
            for record in &classification.repeated {
                let error = ImportError::DuplicateKey {
                    key: record.text(key_column),
                };
                debug!(line = record.line_number, error = %error, "repeated in file");
            }
        }

        // 5. materialize
        let imported_on = started.naive_local();
        let mut materializer =
            RecordMaterializer::new(&mut self.store, request.center, request.actor, imported_on);
        let primary = classification.primary;
        let materialized = match request.kind {
            ImportKind::Persons => materializer.create_persons(primary)?,
            ImportKind::PublicWork => materializer.create_seekers(primary)?,
            ImportKind::PersonFields => materializer.update_fields(primary)?,
        };

        let mut used_key = classification.used_key;
        used_key.extend(materialized.conflicts.iter().cloned());
        used_key.sort_by_key(|r| r.line_number);

        // 6. report + side files
        let key_label = schema
            .key_column
            .as_deref()
            .unwrap_or("key")
            .to_uppercase();
        let key_column = schema.key_column.clone().unwrap_or_default();
        let with_key = |r: &NormalizedRecord| format!("{} ({})", r.display_name(), r.text(&key_column));

        let mut report = ImportReport::new(
            request.kind,
            request.center.name.clone(),
            request.file_name,
            request.actor,
            imported_on,
        )
        .with_entries(entries);

        report = match request.kind {
            ImportKind::PersonFields => fields_sections(report, &columns, &materialized),
            ImportKind::Persons | ImportKind::PublicWork => report
                .with_section(ReportSection::new("IMPORTED", materialized.created.clone()))
                .with_section(ReportSection::new(
                    format!("WITHOUT_{}", key_label),
                    classification.missing_key.iter().map(NormalizedRecord::display_name).collect(),
                ))
                .with_section(ReportSection::new(
                    format!("USED_{}", key_label),
                    used_key.iter().map(with_key).collect(),
                ))
                .with_section(ReportSection::new(
                    "DUPLICATED",
                    classification.repeated.iter().map(with_key).collect(),
                )),
        };
        report = report.with_section(ReportSection::new(
            "REJECTED",
            classification
                .rejected
                .iter()
                .map(|r| format!("{} ({})", r.name, r.reason))
                .collect(),
        ));

        let mut side_files = Vec::new();
        if request.kind != ImportKind::PersonFields {
            let buckets: [(SideFileKind, &[NormalizedRecord]); 4] = [
                (SideFileKind::ToSend, &materialized.created_records),
                (SideFileKind::WithoutKey, &classification.missing_key),
                (SideFileKind::UsedKey, &used_key),
                (SideFileKind::Duplicated, &classification.repeated),
            ];
            for (side, records) in buckets {
                if let Some(path) =
                    self.layout
                        .write_side_file(request.kind, side, request.file_name, &columns, records)?
                {
                    side_files.push((side, path));
                }
            }
        }

        let report = report.with_elapsed(Local::now() - started);
        let report_path = self.layout.write_report(&report)?;
        let report_lines = read_report(&report_path)?;
        let summary = report.summary();

        info!(
            file = request.file_name,
            entries = summary.entries,
            report = %report_path.display(),
            "import finished"
        );

        Ok(ImportOutcome {
            summary,
            report_path,
            side_files,
            report_lines,
        })
    }
}

fn fields_sections(report: ImportReport, columns: &[String], materialized: &Materialized) -> ImportReport {
    let fields: Vec<&str> = columns
        .iter()
        .map(String::as_str)
        .filter(|c| *c != "name")
        .collect();

    report
        .with_note("FIELDS", fields.join(","))
        .with_section(ReportSection::new("ADJUSTED", materialized.adjusted.clone()))
        .with_section(ReportSection::new("UNCHANGED", materialized.unchanged.clone()))
        .with_section(ReportSection::new(
            "NOT_FOUND",
            materialized.not_found.iter().map(NormalizedRecord::display_name).collect(),
        ))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::entities::{Account, Member, Person, Profile};

    fn pipeline(dir: &std::path::Path) -> ImportPipeline<SqliteStore> {
        ImportPipeline::new(SqliteStore::open_in_memory().unwrap(), ArtifactLayout::new(dir))
    }

    fn seed(store: &mut SqliteStore, center: &Center, email: &str) {
        let account = Account::new(email);
        let mut person = Person::new(&center.id, "Seeded", "admin");
        person.account_id = Some(account.id.clone());
        store
            .insert_member(
                &Member {
                    account,
                    profile: Profile::default(),
                    person,
                    history: vec![],
                },
                "admin",
            )
            .unwrap();
    }

    const SEEKERS: &str = "name,birth,gender,city,state_prov,country,phone,email\n\
        Ana Souza,1990-01-02,F,Lisboa,LX,,+351 912 345 678,ana@a.com\n\
        Bia Lima,,F,Porto,PO,PT,,\n\
        Cid Alves,1985-07-08,M,Faro,FA,PT,,ana@a.com\n";

    #[test]
    fn test_public_work_run() {
        let dir = tempfile::tempdir().unwrap();
        let center = Center::new("North Branch", "PT");
        let mut p = pipeline(dir.path());

        let outcome = p
            .run(ImportRequest::new(
                ImportKind::PublicWork,
                SEEKERS,
                "north_branch.csv",
                &center,
                "admin",
            ))
            .unwrap();

        assert_eq!(outcome.summary.entries, 3);
        assert_eq!(outcome.summary.get("IMPORTED"), Some(1));
        assert_eq!(outcome.summary.get("WITHOUT_EMAIL"), Some(1));
        assert_eq!(outcome.summary.get("DUPLICATED"), Some(1));
        assert_eq!(p.store().count_seekers().unwrap(), 1);
        assert!(outcome
            .side_files
            .iter()
            .any(|(side, path)| *side == SideFileKind::Duplicated && path.ends_with("de__north_branch.csv")));
    }

    #[test]
    fn test_schema_gate_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let center = Center::new("North", "PT");
        let mut p = pipeline(dir.path());

        let err = p
            .run(ImportRequest::new(
                ImportKind::PublicWork,
                "name,email\nAna,a@a.com\n",
                "north.csv",
                &center,
                "admin",
            ))
            .unwrap_err();

        assert!(matches!(err, ImportError::Schema(_)));
        assert_eq!(p.store().count_seekers().unwrap(), 0);
        assert!(!p.layout().already_imported(ImportKind::PublicWork, "north.csv"));
    }

    #[test]
    fn test_non_csv_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let center = Center::new("North", "PT");
        let mut p = pipeline(dir.path());

        let err = p
            .run(ImportRequest::new(ImportKind::PublicWork, SEEKERS, "north.xlsx", &center, "admin"))
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidInput(_)));
    }

    #[test]
    fn test_bad_date_counted_as_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let center = Center::new("North", "PT");
        let mut p = pipeline(dir.path());
        let text = "name,birth,gender,city,state_prov,country,phone,email\n\
            Ana,02/01/1990,F,,,,,a@a.com\n";

        let outcome = p
            .run(ImportRequest::new(ImportKind::PublicWork, text, "n.csv", &center, "admin"))
            .unwrap();

        assert_eq!(outcome.summary.get("REJECTED"), Some(1));
        assert_eq!(outcome.summary.get("IMPORTED"), Some(0));

        let with_format = p
            .run(
                ImportRequest::new(ImportKind::PublicWork, text, "n2.csv", &center, "admin")
                    .with_date_format("%d/%m/%Y"),
            )
            .unwrap();
        assert_eq!(with_format.summary.get("IMPORTED"), Some(1));
    }

    #[test]
    fn test_person_fields_run() {
        let dir = tempfile::tempdir().unwrap();
        let center = Center::new("North", "BR");
        let mut p = pipeline(dir.path());
        seed(p.store_mut(), &center, "s@s.com");

        let outcome = p
            .run(ImportRequest::new(
                ImportKind::PersonFields,
                "name,reg,rg,exp\nseeded,R-9,12.345,SSP\nGhost,R-1,,\n",
                "fields.csv",
                &center,
                "admin",
            ))
            .unwrap();

        assert_eq!(outcome.summary.get("ADJUSTED"), Some(1));
        assert_eq!(outcome.summary.get("NOT_FOUND"), Some(1));
        assert!(outcome.report_lines.iter().any(|l| l == "- FIELDS:          reg,rg,exp"));
        assert!(outcome.side_files.is_empty());

        let person = p.store().find_person_by_name(&center.id, "Seeded").unwrap().unwrap();
        assert_eq!(person.id_card, "12.345 / SSP");
        assert_eq!(person.reg, "R-9");
    }

    #[test]
    fn test_person_fields_without_name_column() {
        let dir = tempfile::tempdir().unwrap();
        let center = Center::new("North", "BR");
        let mut p = pipeline(dir.path());

        let err = p
            .run(ImportRequest::new(ImportKind::PersonFields, "reg\nR-1\n", "f.csv", &center, "admin"))
            .unwrap_err();

        match err {
            ImportError::Schema(e) => {
                assert_eq!(e.file_name, "f.csv");
                assert_eq!(e.missing, vec!["name".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
