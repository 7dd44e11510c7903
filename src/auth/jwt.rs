//! JWT authentication for console users.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ComplianceError, ComplianceResult};

/// JWT claims for authenticated users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// User email.
    pub email: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at time (Unix timestamp).
    pub iat: i64,
    /// Issuer.
    pub iss: String,
}

impl Claims {
    /// The user ID carried in `sub`.
    pub fn user_id(&self) -> ComplianceResult<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| ComplianceError::Unauthorized("Malformed token subject".to_string()))
    }
}

/// JWT token manager.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    /// Token validity duration in hours.
    token_duration_hours: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret.
    pub fn new(secret: &str, issuer: String, token_duration_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            token_duration_hours,
        }
    }

    /// Get token duration in hours.
    pub fn token_duration_hours(&self) -> i64 {
        self.token_duration_hours
    }

    /// Generate a JWT token for a user.
    pub fn generate_token(&self, user_id: Uuid, email: &str) -> ComplianceResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.token_duration_hours);

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ComplianceError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode a JWT token.
    pub fn validate_token(&self, token: &str) -> ComplianceResult<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let token_data: TokenData<Claims> =
            decode(token, &self.decoding_key, &validation).map_err(|e| {
                tracing::debug!(error = %e, "JWT validation failed");
                ComplianceError::Unauthorized(format!("Invalid token: {}", e))
            })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret-key-12345", "compliance-core".to_string(), 12);
        let user_id = Uuid::new_v4();

        let token = manager
            .generate_token(user_id, "privacy.officer@clinic.org")
            .unwrap();

        let claims = manager.validate_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.email, "privacy.officer@clinic.org");
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let issuer_a = JwtManager::new("shared-secret", "issuer-a".to_string(), 1);
        let issuer_b = JwtManager::new("shared-secret", "issuer-b".to_string(), 1);

        let token = issuer_a.generate_token(Uuid::new_v4(), "a@b.c").unwrap();
        assert!(matches!(
            issuer_b.validate_token(&token),
            Err(ComplianceError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let signer = JwtManager::new("secret-one", "compliance-core".to_string(), 1);
        let verifier = JwtManager::new("secret-two", "compliance-core".to_string(), 1);

        let token = signer.generate_token(Uuid::new_v4(), "a@b.c").unwrap();
        assert!(verifier.validate_token(&token).is_err());
    }
}
