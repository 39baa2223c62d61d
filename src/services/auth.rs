use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::password::verify_password;
use crate::auth::{TokenCodec, TokenKind};
use crate::db::Store;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access: String,
}

/// Credential checks and token minting.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    tokens: Arc<dyn TokenCodec>,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, tokens: Arc<dyn TokenCodec>) -> Self {
        Self { store, tokens }
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<TokenPair> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let user = match self.store.find_user_by_email(email).await? {
            Some(user) => user,
            None => {
                tracing::warn!("Login attempt for unknown user: {}", email);
                return Err(AppError::InvalidCredentials);
            }
        };

        if !verify_password(password, &user.password_hash).await {
            tracing::warn!("Failed login attempt for: {}", user.email);
            return Err(AppError::InvalidCredentials);
        }

        let access = self.tokens.issue(user.id, &user.email, TokenKind::Access)?;
        let refresh = self.tokens.issue(user.id, &user.email, TokenKind::Refresh)?;

        tracing::info!("Successful login for user: {}", user.email);
        Ok(TokenPair { access, refresh })
    }

    /// Mint a new access token from a refresh token. The refresh token itself
    /// stays valid until it expires.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<AccessToken> {
        if refresh_token.trim().is_empty() {
            return Err(AppError::Validation("Refresh token is required".to_string()));
        }

        let claims = self.tokens.verify(refresh_token.trim(), TokenKind::Refresh)?;

        let user = self
            .store
            .find_user(claims.user_id)
            .await?
            .ok_or_else(|| AppError::InvalidToken("Token owner no longer exists".to_string()))?;

        let access = self.tokens.issue(user.id, &user.email, TokenKind::Access)?;
        Ok(AccessToken { access })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestEnv;

    #[tokio::test]
    async fn test_login_issues_both_tokens() {
        let env = TestEnv::new().await;
        env.create_user("article@test.com", "테스트", "1234").await;

        let pair = env.services.auth.login("article@test.com", "1234").await.unwrap();
        let access = env.tokens.verify(&pair.access, TokenKind::Access).unwrap();
        let refresh = env.tokens.verify(&pair.refresh, TokenKind::Refresh).unwrap();
        assert_eq!(access.user_id, refresh.user_id);
    }

    #[tokio::test]
    async fn test_login_is_case_insensitive_on_email() {
        let env = TestEnv::new().await;
        env.create_user("article@test.com", "테스트", "1234").await;
        assert!(env.services.auth.login("Article@Test.com", "1234").await.is_ok());
    }

    #[tokio::test]
    async fn test_login_wrong_password_is_invalid_credentials() {
        let env = TestEnv::new().await;
        env.create_user("article@test.com", "테스트", "1234").await;
        let err = env
            .services
            .auth
            .login("article@test.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_unknown_email_is_invalid_credentials() {
        let env = TestEnv::new().await;
        let err = env
            .services
            .auth
            .login("nobody@test.com", "1234")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_refresh_returns_usable_access_token() {
        let env = TestEnv::new().await;
        let user = env.create_user("article@test.com", "테스트", "1234").await;
        let pair = env.services.auth.login("article@test.com", "1234").await.unwrap();

        let fresh = env.services.auth.refresh(&pair.refresh).await.unwrap();
        let claims = env.tokens.verify(&fresh.access, TokenKind::Access).unwrap();
        assert_eq!(claims.user_id, user.id);
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token_and_garbage() {
        let env = TestEnv::new().await;
        env.create_user("article@test.com", "테스트", "1234").await;
        let pair = env.services.auth.login("article@test.com", "1234").await.unwrap();

        assert!(matches!(
            env.services.auth.refresh(&pair.access).await,
            Err(AppError::InvalidToken(_))
        ));
        assert!(matches!(
            env.services.auth.refresh("garbage").await,
            Err(AppError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_fields_are_validation_errors() {
        let env = TestEnv::new().await;
        env.create_user("article@test.com", "테스트", "1234").await;

        for (email, password) in [("", "1234"), ("  ", "1234"), ("article@test.com", "")] {
            assert!(matches!(
                env.services.auth.login(email, password).await,
                Err(AppError::Validation(_))
            ));
        }
        assert!(matches!(
            env.services.auth.refresh(" ").await,
            Err(AppError::Validation(_))
        ));
    }
}
