// ⏰ Temporal Model - Stages, statuses and the latest-date rule
//
// History is append-only. The "current" value of an entity only moves
// forward in time: an occurrence dated before the current one is recorded
// but never overwrites it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    NoStatus,
    Active,
    Licensed,
    Dead,
    Disconnected,
    Removed,
}

/// Values accepted in the `restriction` column
pub const RESTRICTION_WHITELIST: [Status; 5] = [
    Status::Active,
    Status::Licensed,
    Status::Dead,
    Status::Disconnected,
    Status::Removed,
];

impl Status {
    pub fn code(&self) -> &'static str {
        match self {
            Status::NoStatus => "---",
            Status::Active => "ACT",
            Status::Licensed => "LIC",
            Status::Dead => "DEA",
            Status::Disconnected => "DIS",
            Status::Removed => "REM",
        }
    }

    pub fn from_code(code: &str) -> Option<Status> {
        match code.trim().to_uppercase().as_str() {
            "---" => Some(Status::NoStatus),
            "ACT" => Some(Status::Active),
            "LIC" => Some(Status::Licensed),
            "DEA" => Some(Status::Dead),
            "DIS" => Some(Status::Disconnected),
            "REM" => Some(Status::Removed),
            _ => None,
        }
    }

    /// Restriction value from the whitelist, if it is one
    pub fn restriction(code: &str) -> Option<Status> {
        Status::from_code(code).filter(|s| RESTRICTION_WHITELIST.contains(s))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Licensed | Status::Dead | Status::Disconnected | Status::Removed
        )
    }

    /// Persons in these states still count as active members
    pub fn keeps_active(&self) -> bool {
        matches!(self, Status::NoStatus | Status::Active | Status::Licensed)
    }
}

// ============================================================================
// STAGE (aspects and probation stages)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Preparatory,
    Probationary,
    Professed,
    A1,
    A2,
    A3,
    A4,
    Grail,
    A5,
    A6,
}

impl Stage {
    pub fn code(&self) -> &'static str {
        match self {
            Stage::Preparatory => "PRP",
            Stage::Probationary => "PRB",
            Stage::Professed => "PRF",
            Stage::A1 => "A1",
            Stage::A2 => "A2",
            Stage::A3 => "A3",
            Stage::A4 => "A4",
            Stage::Grail => "GR",
            Stage::A5 => "A5",
            Stage::A6 => "A6",
        }
    }

    pub fn from_code(code: &str) -> Option<Stage> {
        match code.trim() {
            "PRP" => Some(Stage::Preparatory),
            "PRB" => Some(Stage::Probationary),
            "PRF" => Some(Stage::Professed),
            "A1" => Some(Stage::A1),
            "A2" => Some(Stage::A2),
            "A3" => Some(Stage::A3),
            "A4" => Some(Stage::A4),
            "GR" => Some(Stage::Grail),
            "A5" => Some(Stage::A5),
            "A6" => Some(Stage::A6),
            _ => None,
        }
    }
}

// ============================================================================
// OCCURRENCE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OccurrenceCode {
    Stage(Stage),
    Status(Status),
}

impl OccurrenceCode {
    pub fn code(&self) -> &'static str {
        match self {
            OccurrenceCode::Stage(s) => s.code(),
            OccurrenceCode::Status(s) => s.code(),
        }
    }

    pub fn from_code(code: &str) -> Option<OccurrenceCode> {
        Stage::from_code(code)
            .map(OccurrenceCode::Stage)
            .or_else(|| Status::from_code(code).map(OccurrenceCode::Status))
    }
}

impl fmt::Display for OccurrenceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A dated stage or status event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub code: OccurrenceCode,
    pub date: Option<NaiveDate>,
}

impl Occurrence {
    pub fn stage(stage: Stage, date: NaiveDate) -> Self {
        Occurrence {
            code: OccurrenceCode::Stage(stage),
            date: Some(date),
        }
    }
}

/// Occurrence with the latest date; on a tie the later one in input order wins
pub fn latest_occurrence(occurrences: &[Occurrence]) -> Option<Occurrence> {
    occurrences
        .iter()
        .filter(|o| o.date.is_some())
        .max_by_key(|o| o.date)
        .copied()
}

// ============================================================================
// DATED VALUE
// ============================================================================

/// Current value of a field plus the date it became true
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedValue<T> {
    pub value: T,
    pub date: Option<NaiveDate>,
}

impl<T> DatedValue<T> {
    pub fn new(value: T, date: Option<NaiveDate>) -> Self {
        DatedValue { value, date }
    }

    /// Whether an incoming date may replace the current value
    pub fn accepts(&self, incoming: Option<NaiveDate>) -> bool {
        match (self.date, incoming) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(current), Some(new)) => new >= current,
        }
    }

    /// Replace the value unless the incoming date is older; true if replaced
    pub fn apply(&mut self, value: T, date: Option<NaiveDate>) -> bool {
        if self.accepts(date) {
            self.value = value;
            self.date = date;
            true
        } else {
            false
        }
    }

    /// Overwrite regardless of dates
    pub fn force(&mut self, value: T, date: Option<NaiveDate>) {
        self.value = value;
        self.date = date;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_latest_date_wins_regardless_of_order() {
        let occurrences = vec![
            Occurrence::stage(Stage::A1, d(2020, 1, 1)),
            Occurrence::stage(Stage::A3, d(2021, 6, 15)),
            Occurrence::stage(Stage::Grail, d(2019, 3, 1)),
        ];

        let latest = latest_occurrence(&occurrences).unwrap();
        assert_eq!(latest.code, OccurrenceCode::Stage(Stage::A3));
        assert_eq!(latest.date, Some(d(2021, 6, 15)));
    }

    #[test]
    fn test_latest_ignores_undated() {
        let occurrences = vec![
            Occurrence { code: OccurrenceCode::Stage(Stage::A2), date: None },
            Occurrence::stage(Stage::A1, d(2020, 1, 1)),
        ];
        assert_eq!(latest_occurrence(&occurrences).unwrap().code.code(), "A1");
        assert!(latest_occurrence(&[]).is_none());
    }

    #[test]
    fn test_older_date_does_not_overwrite() {
        let mut current = DatedValue::new(Some(Stage::A3), Some(d(2021, 6, 15)));

        assert!(!current.apply(Some(Stage::A1), Some(d(2020, 1, 1))));
        assert_eq!(current.value, Some(Stage::A3));

        assert!(current.apply(Some(Stage::A4), Some(d(2021, 6, 15))));
        assert_eq!(current.value, Some(Stage::A4));
    }

    #[test]
    fn test_undated_current_accepts_anything() {
        let mut current: DatedValue<Option<Stage>> = DatedValue::new(None, None);
        assert!(current.apply(Some(Stage::A1), None));
        assert!(current.apply(Some(Stage::A2), Some(d(2000, 1, 1))));
        assert!(!current.accepts(None));
    }

    #[test]
    fn test_restriction_whitelist() {
        assert_eq!(Status::restriction("lic"), Some(Status::Licensed));
        assert_eq!(Status::restriction("REM"), Some(Status::Removed));
        assert_eq!(Status::restriction("---"), None);
        assert_eq!(Status::restriction("XYZ"), None);
    }

    #[test]
    fn test_status_flags() {
        assert!(Status::Dead.is_terminal());
        assert!(!Status::Active.is_terminal());
        assert!(Status::Licensed.keeps_active());
        assert!(!Status::Removed.keeps_active());
    }

    #[test]
    fn test_occurrence_codes() {
        assert_eq!(OccurrenceCode::from_code("GR"), Some(OccurrenceCode::Stage(Stage::Grail)));
        assert_eq!(OccurrenceCode::from_code("DEA"), Some(OccurrenceCode::Status(Status::Dead)));
        assert_eq!(OccurrenceCode::from_code("ZZ"), None);
    }
}
