// 🏭 Record Materializer - Primary records → persisted entities
//
// Persons: account + profile + person + one history entry per occurrence.
// Field updates: adjust persons already in the center, matched by name.
// Seekers: one NEW seeker per record.
//
// A unique-key collision at write time does not abort the batch: the record
// is handed back as a conflict and reported with the used keys.

use crate::attributes::{ADDRESS_PARTS, OCCURRENCE_COLUMNS};
use crate::db::MemberStore;
use crate::entities::{Account, Center, HistoryEntry, Member, Person, Profile, Seeker};
use crate::error::{ImportError, Result};
use crate::normalizer::NormalizedRecord;
use crate::rules::{short_name, IdCardRules};
use crate::temporal::{latest_occurrence, Occurrence, OccurrenceCode, Stage, Status};
use chrono::NaiveDateTime;
use tracing::{debug, warn};

/// Columns that feed the id card instead of a field of their own
const ID_CARD_COLUMNS: [&str; 4] = ["id_card", "cpf", "rg", "exp"];

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Default)]
pub struct Materialized {
    /// Names of entities created
    pub created: Vec<String>,
    /// Records of the entities created, in file order
    pub created_records: Vec<NormalizedRecord>,
    /// Records whose key collided on write
    pub conflicts: Vec<NormalizedRecord>,
    /// Short names of persons with at least one field changed
    pub adjusted: Vec<String>,
    /// Field-update rows that matched a person but changed nothing
    pub unchanged: Vec<String>,
    /// Field-update rows with no person of that name in the center
    pub not_found: Vec<NormalizedRecord>,
}

// ============================================================================
// MATERIALIZER
// ============================================================================

pub struct RecordMaterializer<'a, S: MemberStore> {
    store: &'a mut S,
    center: &'a Center,
    actor: &'a str,
    started_at: NaiveDateTime,
    id_cards: IdCardRules,
}

impl<'a, S: MemberStore> RecordMaterializer<'a, S> {
    pub fn new(store: &'a mut S, center: &'a Center, actor: &'a str, started_at: NaiveDateTime) -> Self {
        RecordMaterializer {
            store,
            center,
            actor,
            started_at,
            id_cards: IdCardRules::new(),
        }
    }

    fn stamp(&self, prefix: &str) -> String {
        format!("{}: {}", prefix, self.started_at.format("%Y-%m-%d %H:%M:%S%.6f"))
    }

    /// Country of the row, or the center's when blank
    fn country(&self, record: &NormalizedRecord) -> String {
        let country = record.text("country");
        if country.is_empty() {
            self.center.country.clone()
        } else {
            country
        }
    }

    // ------------------------------------------------------------------------
    // persons
    // ------------------------------------------------------------------------

    /// Build every entity one person row creates (no store access)
    pub fn build_member(&self, record: &NormalizedRecord) -> Member {
        let name = record.text("name");
        let account = Account::new(&record.text("email"));

        let [address, number, complement] = ADDRESS_PARTS.map(|part| record.text(part));
        let profile = Profile {
            social_name: short_name(&name),
            gender: record.text("gender"),
            profession: record.text("profession"),
            address,
            number,
            complement,
            district: record.text("district"),
            city: record.text("city"),
            state: record.text("state_prov"),
            country: self.country(record),
            zip_code: record.text("zip"),
            phone_1: record.text("cell_phone"),
            phone_2: record.text("phone"),
            sos_contact: record.text("sos_contact"),
            sos_phone: record.text("sos_phone"),
        };

        let mut person = Person::new(&self.center.id, &name, self.actor);
        person.account_id = Some(account.id.clone());
        person.reg = record.text("reg");
        person.id_card = self.id_cards.id_card(record);
        person.birth = record.date("birth");
        person.observations = record.text("ps");

        let occurrences = occurrences_of(record);
        let description = self.stamp("on import");
        let mut history: Vec<HistoryEntry> = occurrences
            .iter()
            .map(|o| HistoryEntry::new(&person.id, o, description.clone(), self.actor))
            .collect();

        if let Some(latest) = latest_occurrence(&occurrences) {
            person.record_occurrence(&latest);
        }

        if let Some(status) = Status::restriction(&record.text("restriction")) {
            let occurrence = Occurrence {
                code: OccurrenceCode::Status(status),
                date: record.date("restriction_date"),
            };
            history.push(HistoryEntry::new(
                &person.id,
                &occurrence,
                self.stamp("on import in"),
                self.actor,
            ));
            person.apply_restriction(status, occurrence.date);
        }

        Member {
            account,
            profile,
            person,
            history,
        }
    }

    pub fn create_persons(&mut self, records: Vec<NormalizedRecord>) -> Result<Materialized> {
        let mut result = Materialized::default();

        for record in records {
            let member = self.build_member(&record);
            match self.store.insert_member(&member, self.actor) {
                Ok(()) => {
                    debug!(line = record.line_number, person = %member.person.id, "person created");
                    result.created.push(member.person.name.clone());
                    result.created_records.push(record);
                }
                Err(ImportError::PersistenceConflict { key }) => {
                    warn!(line = record.line_number, %key, "email taken at write time");
                    result.conflicts.push(record);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(result)
    }

    // ------------------------------------------------------------------------
    // field updates
    // ------------------------------------------------------------------------

    pub fn update_fields(&mut self, records: Vec<NormalizedRecord>) -> Result<Materialized> {
        let mut result = Materialized::default();

        for record in records {
            let name = record.text("name");
            let found = if name.is_empty() {
                None
            } else {
                self.store.find_person_by_name(&self.center.id, &name)?
            };

            let Some(mut person) = found else {
                debug!(line = record.line_number, %name, "no person with this name");
                result.not_found.push(record);
                continue;
            };

            let before = person.clone();
            let history = self.store.person_history(&person.id)?;
            let new_history = self.adjust_person(&mut person, &record, &history);
            let label = person.short_name.clone();

            if !new_history.is_empty() || person != before {
                self.store.update_person(&person, &new_history, self.actor)?;
                result.adjusted.push(label);
            } else {
                result.unchanged.push(label);
            }
        }

        Ok(result)
    }

    /// Apply a field-update row to `person`; returns history entries to append
    ///
    /// Blank cells never clear a stored value.
    pub fn adjust_person(
        &self,
        person: &mut Person,
        record: &NormalizedRecord,
        history: &[HistoryEntry],
    ) -> Vec<HistoryEntry> {
        let mut new_history = Vec::new();

        if ID_CARD_COLUMNS.iter().any(|c| record.has(c)) {
            if let Some((_, id_card)) = self.id_cards.derive(record) {
                person.id_card = id_card;
            }
        }

        for column in record.columns() {
            match column {
                "name" | "restriction" | "restriction_date" => {}
                c if ID_CARD_COLUMNS.contains(&c) => {}
                "reg" | "ps" | "observations" => {
                    let value = record.text(column);
                    if value.is_empty() {
                        continue;
                    }
                    if column == "reg" {
                        person.reg = value;
                    } else {
                        person.observations = value;
                    }
                }
                "birth" => {
                    if let Some(birth) = record.date("birth") {
                        person.birth = Some(birth);
                    }
                }
                c if OCCURRENCE_COLUMNS.contains(&c) => {
                    let (Some(stage), Some(date)) = (Stage::from_code(c), record.date(c)) else {
                        continue;
                    };
                    let occurrence = Occurrence::stage(stage, date);
                    let known = history
                        .iter()
                        .any(|h| h.occurrence == occurrence.code && h.date == occurrence.date);
                    if !known {
                        new_history.push(HistoryEntry::new(
                            &person.id,
                            &occurrence,
                            self.stamp("on import"),
                            self.actor,
                        ));
                        person.record_occurrence(&occurrence);
                    }
                }
                other => debug!(column = other, "column has no person field"),
            }
        }

        // An older restriction lands in the history but leaves the status alone
        if let Some(status) = Status::restriction(&record.text("restriction")) {
            let occurrence = Occurrence {
                code: OccurrenceCode::Status(status),
                date: record.date("restriction_date"),
            };
            let known = history
                .iter()
                .chain(new_history.iter())
                .any(|h| h.occurrence == occurrence.code && h.date == occurrence.date);
            if !known {
                new_history.push(HistoryEntry::new(
                    &person.id,
                    &occurrence,
                    self.stamp("on import in"),
                    self.actor,
                ));
                person.record_occurrence(&occurrence);
            }
        }

        new_history
    }

    // ------------------------------------------------------------------------
    // seekers
    // ------------------------------------------------------------------------

    pub fn build_seeker(&self, record: &NormalizedRecord) -> Seeker {
        let mut seeker = Seeker::new(&self.center.id, &record.text("name"), &record.text("email"), self.actor);
        seeker.birth = record.date("birth");
        seeker.gender = record.text("gender");
        seeker.phone = record.text("phone");
        seeker.city = record.text("city");
        seeker.state = record.text("state_prov");
        seeker.country = self.country(record);
        seeker.observations = record.text("ps");
        seeker
    }

    pub fn create_seekers(&mut self, records: Vec<NormalizedRecord>) -> Result<Materialized> {
        let mut result = Materialized::default();

        for record in records {
            let seeker = self.build_seeker(&record);
            match self.store.insert_seeker(&seeker, self.actor) {
                Ok(()) => {
                    result.created.push(seeker.name.clone());
                    result.created_records.push(record);
                }
                Err(ImportError::PersistenceConflict { key }) => {
                    warn!(line = record.line_number, %key, "seeker email taken at write time");
                    result.conflicts.push(record);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(result)
    }
}

/// Dated occurrence columns of a record, in column order
pub fn occurrences_of(record: &NormalizedRecord) -> Vec<Occurrence> {
    OCCURRENCE_COLUMNS
        .iter()
        .filter_map(|column| {
            let stage = Stage::from_code(column)?;
            let date = record.date(column)?;
            Some(Occurrence::stage(stage, date))
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::parser::FieldValue;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn started() -> NaiveDateTime {
        d(2024, 3, 1).and_hms_opt(10, 0, 0).unwrap()
    }

    fn record(line: usize, cells: Vec<(&str, FieldValue)>) -> NormalizedRecord {
        let fields = cells.into_iter().map(|(c, v)| (c.to_string(), v)).collect();
        NormalizedRecord::new(&[], "north.csv", line, fields).unwrap()
    }

    fn text(v: &str) -> FieldValue {
        FieldValue::Text(v.to_string())
    }

    fn person_row(name: &str, email: &str) -> NormalizedRecord {
        record(
            2,
            vec![
                ("name", text(name)),
                ("email", text(email)),
                ("cpf", text("529.982.247-25")),
                ("rg", text("12.345")),
                ("exp", text("SSP")),
                ("country", text("")),
                ("cell_phone", text("11999998888")),
                ("address", text("Rua A")),
                ("number", text("123")),
                ("complement", text("Apto 4")),
                ("A1", FieldValue::Date(d(2020, 1, 1))),
                ("A3", FieldValue::Date(d(2021, 6, 15))),
                ("GR", FieldValue::Date(d(2019, 3, 1))),
                ("A2", FieldValue::Null),
            ],
        )
    }

    #[test]
    fn test_build_member() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let center = Center::new("North", "BR");
        let m = RecordMaterializer::new(&mut store, &center, "admin", started());

        let member = m.build_member(&person_row("Ana Maria da Silva", "Ana@A.com"));

        assert_eq!(member.account.email, "ana@a.com");
        assert_eq!(member.profile.social_name, "Ana M. da Silva");
        assert_eq!(member.profile.country, "BR");
        assert_eq!(member.profile.phone_1, "11999998888");
        assert_eq!(member.profile.complement, "Apto 4");
        assert_eq!(member.person.id_card, "529.982.247-25");
        assert_eq!(member.person.aspect.value, Some(Stage::A3));
        assert_eq!(member.person.aspect.date, Some(d(2021, 6, 15)));
        assert_eq!(member.history.len(), 3);
        assert!(member.history[0].description.starts_with("on import: 2024-03-01 10:00:00"));
    }

    #[test]
    fn test_restriction_overrides_status() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let center = Center::new("North", "BR");
        let m = RecordMaterializer::new(&mut store, &center, "admin", started());

        let r = record(
            2,
            vec![
                ("name", text("Bia")),
                ("email", text("b@b.com")),
                ("restriction", text("DEA")),
                ("restriction_date", FieldValue::Date(d(2022, 2, 2))),
            ],
        );
        let member = m.build_member(&r);

        assert_eq!(member.person.status.value, Status::Dead);
        assert!(!member.person.is_active);
        assert_eq!(member.history.len(), 1);
        assert_eq!(member.history[0].occurrence.code(), "DEA");
    }

    #[test]
    fn test_unknown_restriction_ignored() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let center = Center::new("North", "BR");
        let m = RecordMaterializer::new(&mut store, &center, "admin", started());

        let r = record(2, vec![("name", text("Bia")), ("restriction", text("XYZ"))]);
        let member = m.build_member(&r);

        assert_eq!(member.person.status.value, Status::Active);
        assert!(member.history.is_empty());
    }

    #[test]
    fn test_conflict_is_rebucketed_and_batch_continues() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let center = Center::new("North", "BR");
        let mut m = RecordMaterializer::new(&mut store, &center, "admin", started());

        let result = m
            .create_persons(vec![
                person_row("Ana", "a@a.com"),
                person_row("Ana Again", "A@a.com"),
                person_row("Cid", "c@c.com"),
            ])
            .unwrap();

        assert_eq!(result.created, vec!["Ana".to_string(), "Cid".to_string()]);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].display_name(), "Ana Again");
        assert_eq!(store.count_persons().unwrap(), 2);
    }

    #[test]
    fn test_update_fields() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let center = Center::new("North", "BR");
        {
            let mut m = RecordMaterializer::new(&mut store, &center, "admin", started());
            m.create_persons(vec![person_row("Ana Maria da Silva", "a@a.com")]).unwrap();
        }

        let mut m = RecordMaterializer::new(&mut store, &center, "admin", started());
        let result = m
            .update_fields(vec![
                record(
                    2,
                    vec![
                        ("name", text("ana maria")),
                        ("reg", text("R-77")),
                        ("A3", FieldValue::Date(d(2021, 6, 15))),
                        ("A4", FieldValue::Date(d(2023, 1, 10))),
                    ],
                ),
                record(3, vec![("name", text("Nobody Here")), ("reg", text("R-1"))]),
                record(4, vec![("name", text("Ana Maria")), ("A3", FieldValue::Null)]),
            ])
            .unwrap();

        assert_eq!(result.adjusted, vec!["Ana M. da Silva".to_string()]);
        assert_eq!(result.not_found.len(), 1);
        assert_eq!(result.not_found[0].display_name(), "Nobody Here");
        assert_eq!(result.unchanged.len(), 1);

        let person = store.find_person_by_name(&center.id, "Ana Maria").unwrap().unwrap();
        assert_eq!(person.reg, "R-77");
        assert_eq!(person.aspect.value, Some(Stage::A4));
        // A1, A3, GR from creation plus the new A4
        assert_eq!(store.person_history(&person.id).unwrap().len(), 4);
    }

    #[test]
    fn test_older_occurrence_does_not_move_aspect() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let center = Center::new("North", "BR");
        let m = RecordMaterializer::new(&mut store, &center, "admin", started());

        let mut person = Person::new(&center.id, "Ana", "admin");
        person.record_occurrence(&Occurrence::stage(Stage::A3, d(2021, 6, 15)));

        let r = record(2, vec![("name", text("Ana")), ("A2", FieldValue::Date(d(2020, 5, 5)))]);
        let added = m.adjust_person(&mut person, &r, &[]);

        assert_eq!(added.len(), 1);
        assert_eq!(person.aspect.value, Some(Stage::A3));
    }

    #[test]
    fn test_older_restriction_is_logged_but_keeps_status() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let center = Center::new("North", "BR");
        let m = RecordMaterializer::new(&mut store, &center, "admin", started());

        let mut person = Person::new(&center.id, "Ana", "admin");
        person.apply_restriction(Status::Dead, Some(d(2023, 1, 1)));

        let r = record(
            2,
            vec![
                ("name", text("Ana")),
                ("restriction", text("ACT")),
                ("restriction_date", FieldValue::Date(d(2010, 1, 1))),
            ],
        );
        let added = m.adjust_person(&mut person, &r, &[]);

        assert_eq!(added.len(), 1);
        assert_eq!(added[0].occurrence.code(), "ACT");
        assert_eq!(person.status.value, Status::Dead);
        assert_eq!(person.status.date, Some(d(2023, 1, 1)));
        assert!(!person.is_active);

        // a newer one moves it
        let r = record(
            3,
            vec![
                ("name", text("Ana")),
                ("restriction", text("LIC")),
                ("restriction_date", FieldValue::Date(d(2024, 1, 1))),
            ],
        );
        m.adjust_person(&mut person, &r, &added);
        assert_eq!(person.status.value, Status::Licensed);
    }

    #[test]
    fn test_create_seekers() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let center = Center::new("North", "PT");
        let mut m = RecordMaterializer::new(&mut store, &center, "admin", started());

        let r = record(
            2,
            vec![
                ("name", text("Bia Souza Lima")),
                ("email", text("b@b.com")),
                ("birth", FieldValue::Date(d(1990, 1, 2))),
                ("country", text("")),
            ],
        );
        let result = m.create_seekers(vec![r.clone(), r]).unwrap();

        assert_eq!(result.created.len(), 1);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(store.count_seekers().unwrap(), 1);
    }

    #[test]
    fn test_occurrences_of_skips_blank_dates() {
        let r = record(
            2,
            vec![("A1", FieldValue::Date(d(2020, 1, 1))), ("A2", FieldValue::Null)],
        );
        let found = occurrences_of(&r);
        assert_eq!(found, vec![Occurrence::stage(Stage::A1, d(2020, 1, 1))]);
    }
}
