// 👤 Person Entity - Member of a center plus its occurrence history
//
// Identity: UUID. Current aspect and status are dated values that only move
// forward in time; every occurrence is also kept as an append-only entry.

use crate::temporal::{DatedValue, Occurrence, OccurrenceCode, Stage, Status};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// PERSON
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub account_id: Option<String>,
    pub center_id: String,
    pub reg: String,
    pub name: String,
    pub short_name: String,
    pub id_card: String,
    pub birth: Option<NaiveDate>,
    pub aspect: DatedValue<Option<Stage>>,
    pub status: DatedValue<Status>,
    pub observations: String,
    pub is_active: bool,
    pub made_by: String,
}

impl Person {
    pub fn new(center_id: impl Into<String>, name: impl Into<String>, made_by: impl Into<String>) -> Self {
        let name = name.into();
        Person {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: None,
            center_id: center_id.into(),
            reg: String::new(),
            short_name: crate::rules::short_name(&name),
            name,
            id_card: String::new(),
            birth: None,
            aspect: DatedValue::new(None, None),
            status: DatedValue::new(Status::Active, None),
            observations: String::new(),
            is_active: true,
            made_by: made_by.into(),
        }
    }

    /// Move the current aspect/status if the occurrence is not older
    ///
    /// Returns true when the current value changed.
    pub fn record_occurrence(&mut self, occurrence: &Occurrence) -> bool {
        let changed = match occurrence.code {
            OccurrenceCode::Stage(stage) => self.aspect.apply(Some(stage), occurrence.date),
            OccurrenceCode::Status(status) => self.status.apply(status, occurrence.date),
        };
        self.refresh_active();
        changed
    }

    /// Final restriction from the import: overrides whatever was computed
    pub fn apply_restriction(&mut self, status: Status, date: Option<NaiveDate>) {
        self.status.force(status, date);
        self.refresh_active();
    }

    pub fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        self.short_name = crate::rules::short_name(name);
    }

    fn refresh_active(&mut self) {
        self.is_active = self.status.value.keeps_active();
    }
}

// ============================================================================
// HISTORY
// ============================================================================

/// Append-only occurrence record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub person_id: String,
    pub occurrence: OccurrenceCode,
    pub date: Option<NaiveDate>,
    pub description: String,
    pub made_by: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(person_id: &str, occurrence: &Occurrence, description: impl Into<String>, made_by: &str) -> Self {
        HistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            person_id: person_id.to_string(),
            occurrence: occurrence.code,
            date: occurrence.date,
            description: description.into(),
            made_by: made_by.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_new_person_defaults() {
        let person = Person::new("center-1", "Ana Maria da Silva", "admin");
        assert_eq!(person.short_name, "Ana M. da Silva");
        assert_eq!(person.status.value, Status::Active);
        assert!(person.aspect.value.is_none());
        assert!(person.is_active);
    }

    #[test]
    fn test_occurrences_keep_latest_aspect() {
        let mut person = Person::new("c", "Ana", "admin");

        assert!(person.record_occurrence(&Occurrence::stage(Stage::A3, d(2021, 6, 15))));
        assert!(!person.record_occurrence(&Occurrence::stage(Stage::A1, d(2020, 1, 1))));

        assert_eq!(person.aspect.value, Some(Stage::A3));
        assert_eq!(person.aspect.date, Some(d(2021, 6, 15)));
    }

    #[test]
    fn test_restriction_overrides_and_deactivates() {
        let mut person = Person::new("c", "Ana", "admin");
        person.record_occurrence(&Occurrence {
            code: OccurrenceCode::Status(Status::Active),
            date: Some(d(2022, 1, 1)),
        });

        person.apply_restriction(Status::Removed, Some(d(2010, 1, 1)));

        assert_eq!(person.status.value, Status::Removed);
        assert!(!person.is_active);
    }

    #[test]
    fn test_history_entry_copies_occurrence() {
        let occurrence = Occurrence::stage(Stage::Grail, d(2019, 3, 1));
        let entry = HistoryEntry::new("p-1", &occurrence, "on import", "admin");

        assert_eq!(entry.occurrence.code(), "GR");
        assert_eq!(entry.date, Some(d(2019, 3, 1)));
        assert_eq!(entry.person_id, "p-1");
    }
}
