// Entity Models
// Each entity has a stable UUID identity; values change, identity does not.

pub mod account;
pub mod center;
pub mod person;
pub mod seeker;

pub use account::{Account, Profile};
pub use center::Center;
pub use person::{HistoryEntry, Person};
pub use seeker::{Seeker, SEEKER_NEW};

/// Everything one imported person row creates, written as a unit
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub account: Account,
    pub profile: Profile,
    pub person: Person,
    pub history: Vec<HistoryEntry>,
}
