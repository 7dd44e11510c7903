//! User domain types.
//!
//! A user is a login identity. Organization-specific data lives on the
//! employee records linked to the user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    /// Unique identifier.
    pub id: Uuid,
    /// User's email address (lowercased).
    pub email: String,
    /// User's display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Argon2id PHC hash.
    #[serde(skip)]
    pub password_hash: String,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with an already-hashed password.
    pub fn new(email: &str, name: Option<String>, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            name,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_is_never_serialized() {
        let user = User::new("Admin@Clinic.org", None, "$argon2id$v=19$fake".to_string());
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["email"], "admin@clinic.org");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("name").is_none());
    }
}
