// 💳 Account & Profile - Login identity and contact data of a person
//
// The account is keyed by email (unique across the store). Imported accounts
// receive a random initial password; only its SHA-256 hash is kept.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// ACCOUNT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identity (UUID)
    pub id: String,
    /// Unique key, stored lowercase
    pub email: String,
    pub password_hash: String,
    pub group: String,
}

impl Account {
    /// New account in the default `user` group with a random password
    pub fn new(email: &str) -> Self {
        let password = uuid::Uuid::new_v4().simple().to_string();
        Account {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.trim().to_lowercase(),
            password_hash: Self::hash_password(&password),
            group: "user".to_string(),
        }
    }

    pub fn hash_password(password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// PROFILE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub social_name: String,
    pub gender: String,
    pub profession: String,
    pub address: String,
    pub number: String,
    pub complement: String,
    pub district: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
    /// Mobile phone
    pub phone_1: String,
    pub phone_2: String,
    pub sos_contact: String,
    pub sos_phone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_email_normalized() {
        let account = Account::new("  Ana@Example.COM ");
        assert_eq!(account.email, "ana@example.com");
        assert_eq!(account.group, "user");
    }

    #[test]
    fn test_password_hash_is_sha256_hex() {
        let hash = Account::hash_password("secret");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, Account::hash_password("secret"));
    }

    #[test]
    fn test_random_passwords_differ() {
        let a = Account::new("a@a.com");
        let b = Account::new("a@a.com");
        assert_ne!(a.password_hash, b.password_hash);
        assert_ne!(a.id, b.id);
    }
}
