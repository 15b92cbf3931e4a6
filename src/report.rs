// 📋 Import Report - Fixed-format text report + side files per bucket
//
// Layout on disk (root = imports dir):
//   reports/<kind>/<basename>__report.txt
//   <kind>/<bucket dir>/<prefix>__<file>.csv

use crate::error::{ImportError, Result};
use crate::normalizer::NormalizedRecord;
use crate::parser::ImportKind;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Report line width; banners are centred in it
pub const REPORT_WIDTH: usize = 80;

/// Width of the "- LABEL:" column in the summary block
const LABEL_WIDTH: usize = 19;

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub kind: ImportKind,
    pub file_name: String,
    pub entries: usize,
    /// (label, count) in report order
    pub counters: Vec<(String, usize)>,
}

impl ImportSummary {
    pub fn get(&self, label: &str) -> Option<usize> {
        self.counters
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, n)| *n)
    }
}

// ============================================================================
// REPORT
// ============================================================================

/// One counted bucket; listed in DETAIL when not empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSection {
    pub label: String,
    pub items: Vec<String>,
}

impl ReportSection {
    pub fn new(label: impl Into<String>, items: Vec<String>) -> Self {
        ReportSection {
            label: label.into(),
            items,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub kind: ImportKind,
    pub center: String,
    pub file_name: String,
    pub imported_by: String,
    pub imported_on: NaiveDateTime,
    /// Microseconds from start to report
    pub elapsed_micros: i64,
    pub entries: usize,
    /// Extra summary lines without a count (e.g. the adjusted field list)
    pub notes: Vec<(String, String)>,
    pub sections: Vec<ReportSection>,
}

impl ImportReport {
    pub fn new(
        kind: ImportKind,
        center: impl Into<String>,
        file_name: impl Into<String>,
        imported_by: impl Into<String>,
        imported_on: NaiveDateTime,
    ) -> Self {
        ImportReport {
            kind,
            center: center.into(),
            file_name: file_name.into(),
            imported_by: imported_by.into(),
            imported_on,
            elapsed_micros: 0,
            entries: 0,
            notes: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn with_entries(mut self, entries: usize) -> Self {
        self.entries = entries;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_micros = elapsed.num_microseconds().unwrap_or(i64::MAX);
        self
    }

    pub fn with_note(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.notes.push((label.into(), value.into()));
        self
    }

    pub fn with_section(mut self, section: ReportSection) -> Self {
        self.sections.push(section);
        self
    }

    pub fn summary(&self) -> ImportSummary {
        ImportSummary {
            kind: self.kind,
            file_name: self.file_name.clone(),
            entries: self.entries,
            counters: self
                .sections
                .iter()
                .map(|s| (s.label.clone(), s.items.len()))
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str(&banner(self.kind.title()));
        out.push_str(&format!("\n\ncenter:      {}", self.center));
        out.push_str(&format!("\nfile:        {}", self.file_name));
        out.push_str(&format!("\nimported_by: {}", self.imported_by));
        out.push_str(&format!(
            "\nimported_on: {}",
            self.imported_on.format("%Y-%m-%d %H:%M:%S%.6f")
        ));
        out.push_str(&format!("\ntime:        {}", format_elapsed(self.elapsed_micros)));

        out.push_str("\n\n");
        out.push_str(&banner("SUMMARY"));
        out.push('\n');
        out.push_str(&summary_line("ENTRIES", &self.entries.to_string()));
        for (label, value) in &self.notes {
            out.push_str(&summary_line(label, value));
        }
        for section in &self.sections {
            out.push_str(&summary_line(&section.label, &section.items.len().to_string()));
        }

        out.push_str("\n\n");
        out.push_str(&banner("DETAIL"));
        for section in self.sections.iter().filter(|s| !s.items.is_empty()) {
            out.push_str(&format!("\n\n{}:", section.label));
            for (n, item) in section.items.iter().enumerate() {
                out.push_str(&format!("\n  {} - {}", n + 1, item));
            }
        }
        out.push('\n');

        out
    }
}

fn summary_line(label: &str, value: &str) -> String {
    let label = format!("- {}:", label);
    format!("\n{:<width$}{}", label, value, width = LABEL_WIDTH)
}

/// "  TITLE  " centred in a line of `*`
///
/// An odd margin puts the extra `*` on the left when the width is odd,
/// on the right otherwise.
pub fn banner(title: &str) -> String {
    let text = format!("  {}  ", title);
    let len = text.chars().count();
    if len >= REPORT_WIDTH {
        return text;
    }
    let margin = REPORT_WIDTH - len;
    let left = margin / 2 + (margin & REPORT_WIDTH & 1);
    let right = margin - left;
    format!("{}{}{}", "*".repeat(left), text, "*".repeat(right))
}

/// `H:MM:SS` plus `.ffffff` when there are microseconds
pub fn format_elapsed(micros: i64) -> String {
    let micros = micros.max(0);
    let total_secs = micros / 1_000_000;
    let frac = micros % 1_000_000;
    let (h, m, s) = (total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60);
    if frac == 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}:{:02}.{:06}", h, m, s, frac)
    }
}

// ============================================================================
// SIDE FILES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SideFileKind {
    /// Primary rows that produced an entity
    ToSend,
    WithoutKey,
    UsedKey,
    /// Key repeated inside the same file
    Duplicated,
}

impl SideFileKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            SideFileKind::ToSend => "se",
            SideFileKind::WithoutKey => "we",
            SideFileKind::UsedKey => "ue",
            SideFileKind::Duplicated => "de",
        }
    }

    pub fn dir(&self) -> &'static str {
        match self {
            SideFileKind::ToSend => "to_send",
            SideFileKind::WithoutKey => "without_email",
            SideFileKind::UsedKey => "used_email",
            SideFileKind::Duplicated => "duplicated",
        }
    }

    /// Map the download `type` parameter
    pub fn from_type_param(param: &str) -> Option<SideFileKind> {
        match param.trim() {
            "se" => Some(SideFileKind::ToSend),
            "we" => Some(SideFileKind::WithoutKey),
            "ue" => Some(SideFileKind::UsedKey),
            "de" => Some(SideFileKind::Duplicated),
            _ => None,
        }
    }
}

// ============================================================================
// ARTIFACT LAYOUT
// ============================================================================

#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArtifactLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name with its last `.csv` removed, in any case
    pub fn basename(file_name: &str) -> &str {
        // ASCII lowercasing keeps byte offsets
        match file_name.to_ascii_lowercase().rfind(".csv") {
            Some(pos) => &file_name[..pos],
            None => file_name,
        }
    }

    pub fn report_path(&self, kind: ImportKind, file_name: &str) -> PathBuf {
        self.root
            .join("reports")
            .join(kind.code())
            .join(format!("{}__report.txt", Self::basename(file_name)))
    }

    pub fn side_file_path(&self, kind: ImportKind, side: SideFileKind, file_name: &str) -> PathBuf {
        self.root
            .join(kind.code())
            .join(side.dir())
            .join(format!("{}__{}", side.prefix(), file_name))
    }

    /// A report for this file already exists
    pub fn already_imported(&self, kind: ImportKind, file_name: &str) -> bool {
        self.report_path(kind, file_name).is_file()
    }

    /// Resolve a side file by its download `type` parameter
    pub fn download_path(&self, kind: ImportKind, type_param: &str, file_name: &str) -> Result<PathBuf> {
        let side = SideFileKind::from_type_param(type_param).ok_or_else(|| {
            ImportError::InvalidInput(format!("unknown download type '{}'", type_param))
        })?;

        let path = self.side_file_path(kind, side, file_name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ImportError::NotFound(path.display().to_string()))
        }
    }

    pub fn write_report(&self, report: &ImportReport) -> Result<PathBuf> {
        let path = self.report_path(report.kind, &report.file_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, report.render())?;
        Ok(path)
    }

    /// Write records to a side CSV; nothing is written for an empty bucket
    pub fn write_side_file(
        &self,
        kind: ImportKind,
        side: SideFileKind,
        file_name: &str,
        columns: &[String],
        records: &[NormalizedRecord],
    ) -> Result<Option<PathBuf>> {
        if records.is_empty() {
            return Ok(None);
        }

        let path = self.side_file_path(kind, side, file_name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(columns)?;
        for record in records {
            writer.write_record(
                columns
                    .iter()
                    .map(|c| record.get(c).map(|v| v.to_string()).unwrap_or_default()),
            )?;
        }
        writer.flush()?;

        Ok(Some(path))
    }
}

/// Report text as lines, for display by the caller
pub fn read_report(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    Ok(text.lines().map(str::to_string).collect())
}

// ============================================================================
// TESTS
// ============================================================================
