// 🌱 Seeker Entity - Person reached by public work, not yet a member

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Status given to every imported seeker
pub const SEEKER_NEW: &str = "NEW";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seeker {
    pub id: String,
    pub center_id: String,
    pub name: String,
    pub short_name: String,
    pub birth: Option<NaiveDate>,
    pub gender: String,
    /// Unique within a center, stored lowercase
    pub email: String,
    pub phone: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub status: String,
    pub observations: String,
    pub made_by: String,
}

impl Seeker {
    pub fn new(center_id: &str, name: &str, email: &str, made_by: &str) -> Self {
        Seeker {
            id: uuid::Uuid::new_v4().to_string(),
            center_id: center_id.to_string(),
            name: name.to_string(),
            short_name: crate::rules::short_name(name),
            birth: None,
            gender: String::new(),
            email: email.trim().to_lowercase(),
            phone: String::new(),
            city: String::new(),
            state: String::new(),
            country: String::new(),
            status: SEEKER_NEW.to_string(),
            observations: String::new(),
            made_by: made_by.to_string(),
        }
    }
}
