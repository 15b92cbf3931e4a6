// 🏛️ Column Registry - What each spreadsheet column means
// Schemas reference columns from here instead of owning their own lists

use serde::{Deserialize, Serialize};

// ============================================================================
// DEFAULT COLUMN LISTS
// ============================================================================

/// Columns a person export must carry, in file order
pub const DEFAULT_COLUMNS: [&str; 27] = [
    "reg",
    "name",
    "gender",
    "birth",
    "__full_address",
    "district",
    "city",
    "state_prov",
    "zip",
    "country",
    "rg",
    "exp",
    "cpf",
    "phone",
    "cell_phone",
    "email",
    "profession",
    "sos_contact",
    "sos_phone",
    "ps",
    "A1",
    "A2",
    "A3",
    "A4",
    "GR",
    "A5",
    "A6",
];

/// Columns parsed as dates in a person export
pub const DEFAULT_DATES: [&str; 8] = ["birth", "A1", "A2", "A3", "A4", "GR", "A5", "A6"];

/// Occurrence columns, oldest stage first
pub const OCCURRENCE_COLUMNS: [&str; 10] =
    ["PRP", "PRB", "PRF", "A1", "A2", "A3", "A4", "GR", "A5", "A6"];

/// Composite address column split by the normalizer
pub const FULL_ADDRESS: &str = "__full_address";

/// Columns produced from the composite address
pub const ADDRESS_PARTS: [&str; 3] = ["address", "number", "complement"];

// ============================================================================
// COLUMN TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Date,
    Phone,
    Email,
    /// Comma separated street, number, complement
    Address,
    /// Date of an aspect/stage occurrence
    Occurrence,
    /// Status code (ACT, LIC, ...)
    Status,
}

impl ColumnType {
    pub fn is_date(&self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::Occurrence)
    }
}

// ============================================================================
// COLUMN DEFINITION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    /// Required columns fail the schema gate when absent
    pub required: bool,
    pub description: String,
    pub examples: Vec<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnDefinition {
            name: name.into(),
            column_type,
            required: true,
            description: String::new(),
            examples: Vec::new(),
        }
    }

    /// Builder: column is carried when present, never required
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }
}

// ============================================================================
// COLUMN REGISTRY
// ============================================================================

/// Ordered catalog of the columns one import kind understands
#[derive(Debug, Clone)]
pub struct ColumnRegistry {
    columns: Vec<ColumnDefinition>,
}

impl ColumnRegistry {
    pub fn empty() -> Self {
        ColumnRegistry { columns: Vec::new() }
    }

    /// Columns of the person bulk export
    pub fn persons() -> Self {
        let mut registry = ColumnRegistry::empty();

        for name in DEFAULT_COLUMNS {
            registry.register(ColumnDefinition::new(name, Self::infer_type(name)));
        }

        // Optional extras some centers export
        registry.register(
            ColumnDefinition::new("id_card", ColumnType::Text)
                .optional()
                .with_description("Id card already formatted by the center")
                .with_example("12.345.678-9 / SSP-SP"),
        );
        for name in ["PRP", "PRB", "PRF"] {
            registry.register(ColumnDefinition::new(name, ColumnType::Occurrence).optional());
        }
        registry.register(
            ColumnDefinition::new("restriction", ColumnType::Status)
                .optional()
                .with_description("Final status that overrides the computed one")
                .with_example("LIC"),
        );
        registry.register(ColumnDefinition::new("restriction_date", ColumnType::Date).optional());

        registry
    }

    /// Columns of the public-work seeker export
    pub fn public_work() -> Self {
        let mut registry = ColumnRegistry::empty();
        for name in ["name", "birth", "gender", "city", "state_prov", "country", "phone", "email"] {
            registry.register(ColumnDefinition::new(name, Self::infer_type(name)));
        }
        registry.register(ColumnDefinition::new("ps", ColumnType::Text).optional());
        registry
    }

    /// Column type from its conventional name
    pub fn infer_type(name: &str) -> ColumnType {
        if name == FULL_ADDRESS {
            ColumnType::Address
        } else if name == "email" {
            ColumnType::Email
        } else if name.contains("phone") {
            ColumnType::Phone
        } else if OCCURRENCE_COLUMNS.contains(&name) {
            ColumnType::Occurrence
        } else if name == "restriction" {
            ColumnType::Status
        } else if DEFAULT_DATES.contains(&name) || name.ends_with("_date") {
            ColumnType::Date
        } else {
            ColumnType::Text
        }
    }

    pub fn register(&mut self, column: ColumnDefinition) {
        self.columns.retain(|c| c.name != column.name);
        self.columns.push(column);
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn required(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.required)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn optional(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !c.required)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn dates(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.column_type.is_date())
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.columns.len()
    }
}

impl Default for ColumnRegistry {
    fn default() -> Self {
        Self::persons()
    }
}
