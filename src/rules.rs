// 🏷️ Derivation Rules - id card, checksum ids and names
// First matching id-card rule wins; order is data, not code

use crate::normalizer::NormalizedRecord;
use serde::{Deserialize, Serialize};

// ============================================================================
// CHECKSUM ID
// ============================================================================

const BLACKLISTED_IDS: [&str; 10] = [
    "00000000000",
    "11111111111",
    "22222222222",
    "33333333333",
    "44444444444",
    "55555555555",
    "66666666666",
    "77777777777",
    "88888888888",
    "99999999999",
];

fn only_digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn check_digit(digits: &[u32], first_weight: u32) -> u32 {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(n, d)| d * (first_weight - n as u32))
        .sum();
    let digit = 11 - (sum % 11);
    if digit > 9 {
        0
    } else {
        digit
    }
}

/// Validate an 11-digit national id (two mod-11 check digits)
pub fn checksum_id_is_valid(raw: &str) -> bool {
    let id = only_digits(raw);
    if id.len() != 11 || BLACKLISTED_IDS.contains(&id.as_str()) {
        return false;
    }

    let digits: Vec<u32> = id.chars().filter_map(|c| c.to_digit(10)).collect();

    let first = check_digit(&digits[..9], 10);
    if digits[9] != first {
        return false;
    }

    let second = check_digit(&digits[..10], 11);
    digits[10] == second
}

/// Canonical `000.000.000-00` form
pub fn checksum_id_format(raw: &str) -> String {
    let id = only_digits(raw);
    if id.len() != 11 {
        return id;
    }
    format!("{}.{}.{}-{}", &id[..3], &id[3..6], &id[6..9], &id[9..])
}

// ============================================================================
// ID CARD RULES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdCardRule {
    /// `id_card` column used verbatim
    Explicit,
    /// Valid `cpf` column, formatted
    ChecksumId,
    /// `rg` plus optional `exp` as "RG / EXP"
    GenericWithExpiry,
}

impl IdCardRule {
    pub fn apply(&self, record: &NormalizedRecord) -> Option<String> {
        match self {
            IdCardRule::Explicit => Some(record.text("id_card")).filter(|v| !v.is_empty()),
            IdCardRule::ChecksumId => {
                let cpf = record.text("cpf");
                if only_digits(&cpf).len() >= 11 && checksum_id_is_valid(&cpf) {
                    Some(checksum_id_format(&cpf))
                } else {
                    None
                }
            }
            IdCardRule::GenericWithExpiry => {
                let rg = record.text("rg");
                if rg.is_empty() {
                    return None;
                }
                let exp = record.text("exp");
                if exp.is_empty() {
                    Some(rg)
                } else {
                    Some(format!("{} / {}", rg, exp))
                }
            }
        }
    }
}

pub struct IdCardRules {
    rules: Vec<IdCardRule>,
}

impl IdCardRules {
    pub fn new() -> Self {
        IdCardRules {
            rules: vec![
                IdCardRule::Explicit,
                IdCardRule::ChecksumId,
                IdCardRule::GenericWithExpiry,
            ],
        }
    }

    /// First rule producing a value, with the rule that produced it
    pub fn derive(&self, record: &NormalizedRecord) -> Option<(IdCardRule, String)> {
        self.rules
            .iter()
            .find_map(|rule| rule.apply(record).map(|value| (*rule, value)))
    }

    /// Derived id card, blank when no rule matches
    pub fn id_card(&self, record: &NormalizedRecord) -> String {
        self.derive(record).map(|(_, v)| v).unwrap_or_default()
    }
}

impl Default for IdCardRules {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// NAMES
// ============================================================================

/// "ana MARIA silva" → "Ana Maria Silva"
pub fn sanitize_name(name: &str) -> String {
    name.split_whitespace()
        .map(|w| {
            let lower = w.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// "Ana Maria da Silva Souza" → "Ana M. da S. Souza"
///
/// Middle words of up to 3 chars stay (lowercased), longer ones become initials.
pub fn short_name(name: &str) -> String {
    let words: Vec<&str> = name.split(' ').collect();
    if words.len() <= 2 {
        return name.to_string();
    }

    let mut to_join = vec![words[0].to_string()];
    for word in &words[1..words.len() - 1] {
        if word.chars().count() <= 3 {
            to_join.push(word.to_lowercase());
        } else if let Some(first) = word.chars().next() {
            to_join.push(format!("{}.", first));
        }
    }
    to_join.push(words[words.len() - 1].to_string());
    to_join.join(" ")
}

// ============================================================================
// TESTS
// ============================================================================
