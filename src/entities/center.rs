// 🏢 Center Entity - Organizational unit an import is attributed to

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Center {
    /// Stable identity (UUID)
    pub id: String,
    pub name: String,
    /// ISO country code used when a row leaves `country` empty
    pub country: String,
}

impl Center {
    pub fn new(name: impl Into<String>, country: impl Into<String>) -> Self {
        Center {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            country: country.into(),
        }
    }

    /// "North Branch" → "north_branch", used to name uploads
    pub fn file_stem(&self) -> String {
        self.name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase()
    }
}

impl std::fmt::Display for Center {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
