//! One-time invitation tokens for new employees.
//!
//! Only the SHA-256 hash of a token is stored; the plaintext is returned to
//! the admin once, when the employee is created or re-invited.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Prefix that makes invitation tokens recognizable.
pub const INVITE_TOKEN_PREFIX: &str = "inv_";

/// Generate a new invitation token (prefix + 64 hex chars).
pub fn generate_invite_token() -> String {
    // Two v4 UUIDs supply 244 random bits from the OS generator.
    format!(
        "{}{}{}",
        INVITE_TOKEN_PREFIX,
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Hash an invitation token for storage and lookup.
pub fn hash_invite_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.trim().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let token = generate_invite_token();
        assert!(token.starts_with(INVITE_TOKEN_PREFIX));
        assert_eq!(token.len(), INVITE_TOKEN_PREFIX.len() + 64);
        assert_ne!(token, generate_invite_token());
    }

    #[test]
    fn test_hash_is_stable_and_hex() {
        let token = "inv_abc";
        let hash = hash_invite_token(token);
        assert_eq!(hash, hash_invite_token(" inv_abc "));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
