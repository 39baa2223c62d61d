//! Access/refresh token issuance and validation.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub token_type: TokenKind,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

/// Signs and checks tokens. Implementations decide algorithm and expiry.
pub trait TokenCodec: Send + Sync {
    fn issue(&self, user_id: i64, email: &str, kind: TokenKind) -> AppResult<String>;

    /// Fails with `InvalidToken` when the token is malformed, expired, signed
    /// with another key, or of the wrong kind.
    fn verify(&self, token: &str, kind: TokenKind) -> AppResult<Claims>;
}

/// HS256 JWT codec.
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtCodec {
    pub fn new(config: &AuthConfig) -> Self {
        Self::with_lifetimes(
            &config.jwt_secret,
            Duration::minutes(config.access_token_minutes),
            Duration::days(config.refresh_token_days),
        )
    }

    pub fn with_lifetimes(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }
}

impl TokenCodec for JwtCodec {
    fn issue(&self, user_id: i64, email: &str, kind: TokenKind) -> AppResult<String> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            user_id,
            email: email.to_string(),
            token_type: kind,
            jti: Uuid::new_v4().simple().to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn verify(&self, token: &str, kind: TokenKind) -> AppResult<Claims> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| {
                tracing::debug!("Token verification failed: {}", e);
                AppError::InvalidToken("Token is invalid or expired".to_string())
            })?
            .claims;

        if claims.token_type != kind {
            return Err(AppError::InvalidToken("Token has wrong type".to_string()));
        }
        Ok(claims)
    }
}
