//! Session tokens
//!
//! HS256 JWTs carrying the user id and role.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::UserRole;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, hyphenated UUID.
    pub sub: String,
    pub role: String,
    /// Issued at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
#[error("token error: {0}")]
pub struct TokenError(#[from] jsonwebtoken::errors::Error);

#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_seconds: u64,
}

impl JwtManager {
    pub fn new(secret: &str, expiry_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        }
    }

    /// Sign a token for the user, valid for the configured window.
    pub fn generate_token(&self, user_id: Uuid, role: UserRole) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.to_string(),
            iat: now,
            exp: now + self.expiry_seconds as i64,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Check signature and expiry, returning the embedded claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let manager = JwtManager::new("test-secret", 3600);
        let user_id = Uuid::new_v4();

        let token = manager.generate_token(user_id, UserRole::User).unwrap();
        let claims = manager.verify_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "user");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn rejects_wrong_secret() {
        let manager = JwtManager::new("test-secret", 3600);
        let other = JwtManager::new("other-secret", 3600);

        let token = manager
            .generate_token(Uuid::new_v4(), UserRole::User)
            .unwrap();
        assert!(other.verify_token(&token).is_err());
    }

    #[test]
    fn rejects_tampered_token() {
        let manager = JwtManager::new("test-secret", 3600);
        let token = manager
            .generate_token(Uuid::new_v4(), UserRole::User)
            .unwrap();

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(manager.verify_token(&tampered).is_err());
        assert!(manager.verify_token("not-a-token").is_err());
    }
}
