// 🗄️ Store - SQLite persistence for imported entities + audit events
//
// Unique keys live in the schema (account email, seeker email per center),
// so a collision the classifier missed surfaces here as a constraint
// violation and is reported as a persistence conflict.

use crate::classifier::IdentitySnapshot;
use crate::entities::{Center, HistoryEntry, Member, Person, Seeker};
use crate::error::{ImportError, Result};
use crate::temporal::{DatedValue, OccurrenceCode, Stage, Status};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// EVENTS (audit trail)
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// STORE SEAM
// ============================================================================

/// What the materializer needs from persistence
pub trait MemberStore {
    /// Every account email already registered
    fn existing_emails(&self) -> Result<IdentitySnapshot>;

    /// Seeker emails already registered for a center
    fn existing_seeker_emails(&self, center_id: &str) -> Result<IdentitySnapshot>;

    /// Create account, profile, person and history atomically
    ///
    /// Fails with `PersistenceConflict` when the email is taken.
    fn insert_member(&mut self, member: &Member, actor: &str) -> Result<()>;

    /// First person of the center whose name contains `name` (case-insensitive)
    fn find_person_by_name(&self, center_id: &str, name: &str) -> Result<Option<Person>>;

    fn person_history(&self, person_id: &str) -> Result<Vec<HistoryEntry>>;

    /// Save adjusted person fields plus new history entries atomically
    fn update_person(&mut self, person: &Person, new_history: &[HistoryEntry], actor: &str) -> Result<()>;

    /// Fails with `PersistenceConflict` when the email is taken in the center
    fn insert_seeker(&mut self, seeker: &Seeker, actor: &str) -> Result<()>;
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn insert_center(&self, center: &Center) -> Result<()> {
        self.conn.execute(
            "INSERT INTO centers (center_id, name, country) VALUES (?1, ?2, ?3)",
            params![center.id, center.name, center.country],
        )?;
        Ok(())
    }

    /// First center whose name contains `name` (case-insensitive)
    pub fn find_center(&self, name: &str) -> Result<Option<Center>> {
        let center = self
            .conn
            .query_row(
                "SELECT center_id, name, country FROM centers
                 WHERE instr(lower(name), lower(?1)) > 0
                 ORDER BY name LIMIT 1",
                params![name.trim()],
                |row| {
                    Ok(Center {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        country: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(center)
    }

    pub fn count_persons(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM persons")
    }

    pub fn count_accounts(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM accounts")
    }

    pub fn count_history(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM historic")
    }

    pub fn count_seekers(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM seekers")
    }

    fn count(&self, sql: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count)
    }

    fn snapshot(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<IdentitySnapshot> {
        let mut stmt = self.conn.prepare(sql)?;
        let keys = stmt
            .query_map(args, |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(IdentitySnapshot::new(keys))
    }
}

impl MemberStore for SqliteStore {
    fn existing_emails(&self) -> Result<IdentitySnapshot> {
        self.snapshot("SELECT email FROM accounts", &[])
    }

    fn existing_seeker_emails(&self, center_id: &str) -> Result<IdentitySnapshot> {
        self.snapshot(
            "SELECT email FROM seekers WHERE center_id = ?1 AND email <> ''",
            &[&center_id],
        )
    }

    fn insert_member(&mut self, member: &Member, actor: &str) -> Result<()> {
        let tx = self.conn.transaction()?;

        let account = &member.account;
        conflict_on_unique(
            tx.execute(
                "INSERT INTO accounts (account_id, email, password_hash, user_group)
                 VALUES (?1, ?2, ?3, ?4)",
                params![account.id, account.email, account.password_hash, account.group],
            ),
            &account.email,
        )?;

        let p = &member.profile;
        tx.execute(
            "INSERT INTO profiles (
                account_id, social_name, gender, profession, address, number, complement,
                district, city, state, country, zip_code, phone_1, phone_2, sos_contact, sos_phone
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                account.id,
                p.social_name,
                p.gender,
                p.profession,
                p.address,
                p.number,
                p.complement,
                p.district,
                p.city,
                p.state,
                p.country,
                p.zip_code,
                p.phone_1,
                p.phone_2,
                p.sos_contact,
                p.sos_phone,
            ],
        )?;

        write_person(&tx, &member.person, true)?;
        for entry in &member.history {
            write_history(&tx, entry)?;
        }

        let event = Event::new(
            "person_imported",
            "person",
            &member.person.id,
            serde_json::json!({
                "email": account.email,
                "center_id": member.person.center_id,
                "history_entries": member.history.len(),
            }),
            actor,
        );
        write_event(&tx, &event)?;

        tx.commit()?;
        Ok(())
    }

    fn find_person_by_name(&self, center_id: &str, name: &str) -> Result<Option<Person>> {
        let person = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM persons
                     WHERE center_id = ?1 AND instr(lower(name), lower(?2)) > 0
                     ORDER BY name LIMIT 1",
                    PERSON_COLUMNS
                ),
                params![center_id, name.trim()],
                read_person,
            )
            .optional()?;
        Ok(person)
    }

    fn person_history(&self, person_id: &str) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT history_id, person_id, occurrence, date, description, made_by, created_at
             FROM historic WHERE person_id = ?1 ORDER BY date, id",
        )?;

        let entries = stmt
            .query_map(params![person_id], |row| {
                let code: String = row.get(2)?;
                let created_at: String = row.get(6)?;
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    person_id: row.get(1)?,
                    occurrence: OccurrenceCode::from_code(&code)
                        .ok_or(rusqlite::Error::InvalidQuery)?,
                    date: parse_date(row.get(3)?),
                    description: row.get(4)?,
                    made_by: row.get(5)?,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map_err(|_| rusqlite::Error::InvalidQuery)?
                        .with_timezone(&Utc),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn update_person(&mut self, person: &Person, new_history: &[HistoryEntry], actor: &str) -> Result<()> {
        let tx = self.conn.transaction()?;

        write_person(&tx, person, false)?;
        for entry in new_history {
            write_history(&tx, entry)?;
        }

        let event = Event::new(
            "person_adjusted",
            "person",
            &person.id,
            serde_json::json!({ "history_entries": new_history.len() }),
            actor,
        );
        write_event(&tx, &event)?;

        tx.commit()?;
        Ok(())
    }

    fn insert_seeker(&mut self, seeker: &Seeker, actor: &str) -> Result<()> {
        let tx = self.conn.transaction()?;

        conflict_on_unique(
            tx.execute(
                "INSERT INTO seekers (
                    seeker_id, center_id, name, short_name, birth, gender, email, phone,
                    city, state, country, status, observations, made_by
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    seeker.id,
                    seeker.center_id,
                    seeker.name,
                    seeker.short_name,
                    format_date(seeker.birth),
                    seeker.gender,
                    seeker.email,
                    seeker.phone,
                    seeker.city,
                    seeker.state,
                    seeker.country,
                    seeker.status,
                    seeker.observations,
                    seeker.made_by,
                ],
            ),
            &seeker.email,
        )?;

        let event = Event::new(
            "seeker_imported",
            "seeker",
            &seeker.id,
            serde_json::json!({ "email": seeker.email, "center_id": seeker.center_id }),
            actor,
        );
        write_event(&tx, &event)?;

        tx.commit()?;
        Ok(())
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS centers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            center_id TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            country TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            user_group TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id TEXT UNIQUE NOT NULL REFERENCES accounts(account_id),
            social_name TEXT NOT NULL,
            gender TEXT NOT NULL,
            profession TEXT NOT NULL,
            address TEXT NOT NULL,
            number TEXT NOT NULL,
            complement TEXT NOT NULL,
            district TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            country TEXT NOT NULL,
            zip_code TEXT NOT NULL,
            phone_1 TEXT NOT NULL,
            phone_2 TEXT NOT NULL,
            sos_contact TEXT NOT NULL,
            sos_phone TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS persons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id TEXT UNIQUE NOT NULL,
            account_id TEXT REFERENCES accounts(account_id),
            center_id TEXT NOT NULL,
            reg TEXT NOT NULL,
            name TEXT NOT NULL,
            short_name TEXT NOT NULL,
            id_card TEXT NOT NULL,
            birth TEXT,
            aspect TEXT,
            aspect_date TEXT,
            status TEXT NOT NULL,
            status_date TEXT,
            observations TEXT NOT NULL,
            is_active INTEGER NOT NULL,
            made_by TEXT NOT NULL,
            modified_on DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS historic (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            history_id TEXT UNIQUE NOT NULL,
            person_id TEXT NOT NULL REFERENCES persons(person_id),
            occurrence TEXT NOT NULL,
            date TEXT,
            description TEXT NOT NULL,
            made_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS seekers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            seeker_id TEXT UNIQUE NOT NULL,
            center_id TEXT NOT NULL,
            name TEXT NOT NULL,
            short_name TEXT NOT NULL,
            birth TEXT,
            gender TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            country TEXT NOT NULL,
            status TEXT NOT NULL,
            observations TEXT NOT NULL,
            made_by TEXT NOT NULL,
            UNIQUE (center_id, email)
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_persons_center ON persons(center_id);
        CREATE INDEX IF NOT EXISTS idx_historic_person ON historic(person_id);
        CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
        CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);",
    )?;

    Ok(())
}

// ============================================================================
// ROW HELPERS
// ============================================================================

const PERSON_COLUMNS: &str = "person_id, account_id, center_id, reg, name, short_name, id_card, \
     birth, aspect, aspect_date, status, status_date, observations, is_active, made_by";

fn read_person(row: &rusqlite::Row<'_>) -> rusqlite::Result<Person> {
    let aspect: Option<String> = row.get(8)?;
    let status: String = row.get(10)?;

    Ok(Person {
        id: row.get(0)?,
        account_id: row.get(1)?,
        center_id: row.get(2)?,
        reg: row.get(3)?,
        name: row.get(4)?,
        short_name: row.get(5)?,
        id_card: row.get(6)?,
        birth: parse_date(row.get(7)?),
        aspect: DatedValue::new(aspect.as_deref().and_then(Stage::from_code), parse_date(row.get(9)?)),
        status: DatedValue::new(
            Status::from_code(&status).unwrap_or(Status::NoStatus),
            parse_date(row.get(11)?),
        ),
        observations: row.get(12)?,
        is_active: row.get(13)?,
        made_by: row.get(14)?,
    })
}

fn write_person(conn: &Connection, person: &Person, insert: bool) -> Result<()> {
    let aspect = person.aspect.value.map(|s| s.code());
    let status = person.status.value.code();
    let birth = format_date(person.birth);
    let aspect_date = format_date(person.aspect.date);
    let status_date = format_date(person.status.date);
    let values = params![
        person.id,
        person.account_id,
        person.center_id,
        person.reg,
        person.name,
        person.short_name,
        person.id_card,
        birth,
        aspect,
        aspect_date,
        status,
        status_date,
        person.observations,
        person.is_active,
        person.made_by,
    ];

    if insert {
        conn.execute(
            &format!(
                "INSERT INTO persons ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                PERSON_COLUMNS
            ),
            values,
        )?;
    } else {
        let changed = conn.execute(
            "UPDATE persons SET
                account_id = ?2, center_id = ?3, reg = ?4, name = ?5, short_name = ?6,
                id_card = ?7, birth = ?8, aspect = ?9, aspect_date = ?10, status = ?11,
                status_date = ?12, observations = ?13, is_active = ?14, made_by = ?15,
                modified_on = CURRENT_TIMESTAMP
             WHERE person_id = ?1",
            values,
        )?;
        if changed == 0 {
            return Err(ImportError::NotFound(format!("person {}", person.id)));
        }
    }

    Ok(())
}

fn write_history(conn: &Connection, entry: &HistoryEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO historic (history_id, person_id, occurrence, date, description, made_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.id,
            entry.person_id,
            entry.occurrence.code(),
            format_date(entry.date),
            entry.description,
            entry.made_by,
            entry.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Map a unique-constraint failure to a persistence conflict on `key`
fn conflict_on_unique(result: rusqlite::Result<usize>, key: &str) -> Result<usize> {
    match result {
        Ok(n) => Ok(n),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(ImportError::PersistenceConflict { key: key.to_string() })
        }
        Err(e) => Err(e.into()),
    }
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn parse_date(text: Option<String>) -> Option<NaiveDate> {
    text.and_then(|t| NaiveDate::parse_from_str(&t, DATE_FORMAT).ok())
}

// ============================================================================
// EVENT LOG
// ============================================================================

fn write_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    store: &SqliteStore,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = store.conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}
