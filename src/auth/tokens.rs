//! HS256 access and refresh tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{AppConfig, ConfigError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims carried by both token types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    /// Token id, used to revoke refresh tokens
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub token_type: TokenType,
    pub email: String,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired.")]
    Expired,
    #[error("Token is invalid.")]
    Invalid,
    #[error("Token has wrong type.")]
    WrongType,
    #[error("Failed to sign token.")]
    Signing,
}

/// Access/refresh pair returned by login and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub access_expires_in: i64,
}

/// Signs and verifies tokens with the configured secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let secret = config
            .jwt_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::MissingJwtSecret)?;

        Ok(Self::new(
            secret.as_bytes(),
            Duration::minutes(config.access_token_ttl_minutes),
            Duration::minutes(config.refresh_token_ttl_minutes),
        ))
    }

    pub fn issue_pair(&self, user_id: Uuid, email: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(user_id, email, TokenType::Access)?,
            refresh: self.issue(user_id, email, TokenType::Refresh)?,
            access_expires_in: self.access_ttl.num_seconds(),
        })
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        token_type: TokenType,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type,
            email: email.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!("Failed to sign token: {}", e);
            TokenError::Signing
        })
    }

    /// Decodes `token` and checks that it is of the `expected` type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!("JWT validation failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        if data.claims.token_type != expected {
            return Err(TokenError::WrongType);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            b"0123456789abcdef0123456789abcdef",
            Duration::minutes(5),
            Duration::minutes(60),
        )
    }

    #[test]
    fn test_issue_and_verify_pair() {
        let issuer = issuer();
        let user_id = Uuid::new_v4();
        let pair = issuer.issue_pair(user_id, "hr@example.com").unwrap();

        let access = issuer.verify(&pair.access, TokenType::Access).unwrap();
        assert_eq!(access.sub, user_id);
        assert_eq!(access.email, "hr@example.com");

        let refresh = issuer.verify(&pair.refresh, TokenType::Refresh).unwrap();
        assert_ne!(access.jti, refresh.jti);
        assert!(refresh.exp > access.exp);
        assert_eq!(pair.access_expires_in, 300);
    }

    #[test]
    fn test_token_type_is_enforced() {
        let issuer = issuer();
        let pair = issuer.issue_pair(Uuid::new_v4(), "hr@example.com").unwrap();
        assert_eq!(
            issuer.verify(&pair.refresh, TokenType::Access),
            Err(TokenError::WrongType)
        );
    }

    #[test]
    fn test_expired_and_foreign_tokens_rejected() {
        let expired = TokenIssuer::new(
            b"0123456789abcdef0123456789abcdef",
            Duration::minutes(-5),
            Duration::minutes(-5),
        );
        let token = expired
            .issue(Uuid::new_v4(), "hr@example.com", TokenType::Access)
            .unwrap();
        assert_eq!(
            issuer().verify(&token, TokenType::Access),
            Err(TokenError::Expired)
        );

        let foreign = TokenIssuer::new(
            b"another-secret-another-secret-xx",
            Duration::minutes(5),
            Duration::minutes(5),
        );
        let token = foreign
            .issue(Uuid::new_v4(), "hr@example.com", TokenType::Access)
            .unwrap();
        assert_eq!(
            issuer().verify(&token, TokenType::Access),
            Err(TokenError::Invalid)
        );
        assert_eq!(issuer().verify("not-a-jwt", TokenType::Access), Err(TokenError::Invalid));
    }
}
