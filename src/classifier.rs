// 🔍 Row Classifier - Route each record to exactly one bucket
// Missing key, key already used, key repeated in the batch, or primary

use crate::normalizer::{NormalizedRecord, RejectReason, RejectedRow};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// BUCKETS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DuplicateReason {
    /// Key existed in the store before the run (or collided on insert)
    UsedKey,
    /// Key already taken by an earlier row of the same file
    RepeatedInBatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucket {
    Primary,
    MissingKey,
    Duplicate(DuplicateReason),
    Rejected(RejectReason),
}

// ============================================================================
// IDENTITY SNAPSHOT
// ============================================================================

/// Keys already present in the store, taken once before classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySnapshot {
    keys: HashSet<String>,
}

impl IdentitySnapshot {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        IdentitySnapshot {
            keys: keys.into_iter().map(|k| normalize_key(k.as_ref())).collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(&normalize_key(key))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Keys compare trimmed and case-insensitive
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

// ============================================================================
// CLASSIFICATION RESULT
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub primary: Vec<NormalizedRecord>,
    pub missing_key: Vec<NormalizedRecord>,
    pub used_key: Vec<NormalizedRecord>,
    pub repeated: Vec<NormalizedRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl Classification {
    pub fn total(&self) -> usize {
        self.primary.len()
            + self.missing_key.len()
            + self.used_key.len()
            + self.repeated.len()
            + self.rejected.len()
    }
}

// ============================================================================
// ROW CLASSIFIER
// ============================================================================

pub struct RowClassifier {
    key_column: Option<String>,
}

impl RowClassifier {
    pub fn new(key_column: Option<String>) -> Self {
        RowClassifier { key_column }
    }

    /// Classify one record against the snapshot only (pure, repeatable)
    pub fn classify(&self, record: &NormalizedRecord, snapshot: &IdentitySnapshot) -> Bucket {
        let Some(key_column) = &self.key_column else {
            return Bucket::Primary;
        };

        let key = record.text(key_column);
        if key.is_empty() {
            Bucket::MissingKey
        } else if snapshot.contains(&key) {
            Bucket::Duplicate(DuplicateReason::UsedKey)
        } else {
            Bucket::Primary
        }
    }

    /// Split records in file order; the first row holding a key wins
    pub fn split(
        &self,
        records: Vec<NormalizedRecord>,
        rejected: Vec<RejectedRow>,
        snapshot: &IdentitySnapshot,
    ) -> Classification {
        let mut result = Classification {
            rejected,
            ..Default::default()
        };
        let mut seen: HashSet<String> = HashSet::new();

        for record in records {
            match self.classify(&record, snapshot) {
                Bucket::Primary => {
                    let first = match &self.key_column {
                        Some(column) => seen.insert(normalize_key(&record.text(column))),
                        None => true,
                    };
                    if first {
                        result.primary.push(record);
                    } else {
                        result.repeated.push(record);
                    }
                }
                Bucket::MissingKey => result.missing_key.push(record),
                Bucket::Duplicate(DuplicateReason::UsedKey) => result.used_key.push(record),
                Bucket::Duplicate(DuplicateReason::RepeatedInBatch) => result.repeated.push(record),
                Bucket::Rejected(_) => {}
            }
        }

        result
    }
}

// ============================================================================
// TESTS
// ============================================================================
