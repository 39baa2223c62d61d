use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::articles::ArticleSummary;
use super::toggle::{toggle, Relation, ToggleOutcome};
use crate::auth::password::hash_password;
use crate::auth::AuthUser;
use crate::db::models::{EmailCode, NewUser, UserResponse};
use crate::db::Store;
use crate::error::{AppError, AppResult};

pub const CODE_SENT: &str = "인증 코드를 발송했습니다.";
pub const FOLLOWED: &str = "팔로우했습니다.";
pub const UNFOLLOWED: &str = "팔로우를 취소했습니다.";

const CODE_TTL_MINUTES: i64 = 5;

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap();
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    if !EMAIL_REGEX.is_match(&email) {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }
    Ok(email)
}

/// Delivers email authentication codes.
#[async_trait]
pub trait CodeSender: Send + Sync {
    async fn send(&self, email: &str, code: &str) -> AppResult<()>;
}

/// Writes codes to the log instead of mailing them.
pub struct LogCodeSender;

#[async_trait]
impl CodeSender for LogCodeSender {
    async fn send(&self, email: &str, code: &str) -> AppResult<()> {
        tracing::info!(email = %email, code = %code, "email authentication code issued");
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupInput {
    pub email: String,
    pub name: String,
    pub password: String,
    pub athnt_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowStatus {
    pub message: String,
    pub status: ToggleOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileView {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub follower_count: i64,
    pub following_count: i64,
    pub articles: Vec<ArticleSummary>,
    pub like_articles: Vec<ArticleSummary>,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    codes: Arc<dyn CodeSender>,
    bcrypt_cost: u32,
    require_email_code: bool,
}

impl UserService {
    pub fn new(
        store: Arc<dyn Store>,
        codes: Arc<dyn CodeSender>,
        bcrypt_cost: u32,
        require_email_code: bool,
    ) -> Self {
        Self {
            store,
            codes,
            bcrypt_cost,
            require_email_code,
        }
    }

    /// Issue a fresh code for an unregistered email, replacing any earlier one.
    pub async fn send_code(&self, email: &str) -> AppResult<MessageResponse> {
        let email = normalize_email(email)?;
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Validation("Email already registered".to_string()));
        }

        let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));
        self.store
            .save_email_code(EmailCode {
                email: email.clone(),
                code: code.clone(),
                expires_at: Utc::now() + Duration::minutes(CODE_TTL_MINUTES),
            })
            .await?;
        self.codes.send(&email, &code).await?;

        Ok(MessageResponse {
            message: CODE_SENT.to_string(),
        })
    }

    pub async fn signup(&self, input: SignupInput) -> AppResult<UserResponse> {
        let email = normalize_email(&input.email)?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        if input.password.is_empty() {
            return Err(AppError::Validation("Password is required".to_string()));
        }
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AppError::Validation("Email already registered".to_string()));
        }
        if self.require_email_code {
            self.check_code(&email, input.athnt_code.as_deref()).await?;
        }

        let password_hash = hash_password(&input.password, self.bcrypt_cost).await?;
        let user = self
            .store
            .create_user(NewUser {
                email: email.clone(),
                name: name.to_string(),
                password_hash,
            })
            .await?;

        if self.require_email_code {
            self.store.delete_email_code(&email).await?;
        }

        tracing::info!(user_id = user.id, "user signed up: {}", user.email);
        Ok(user.into())
    }

    async fn check_code(&self, email: &str, submitted: Option<&str>) -> AppResult<()> {
        let submitted = submitted
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::Validation("Authentication code is required".to_string()))?;

        match self.store.find_email_code(email).await? {
            Some(stored) if stored.expires_at <= Utc::now() => Err(AppError::Validation(
                "Authentication code has expired".to_string(),
            )),
            Some(stored) if stored.code == submitted => Ok(()),
            _ => Err(AppError::Validation(
                "Authentication code does not match".to_string(),
            )),
        }
    }

    pub async fn toggle_follow(&self, actor: &AuthUser, target_id: i64) -> AppResult<FollowStatus> {
        if self.store.find_user(target_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", target_id)));
        }
        if actor.id == target_id {
            return Err(AppError::Validation("You cannot follow yourself".to_string()));
        }

        let existing = Relation::from(self.store.is_following(actor.id, target_id).await?);
        let (_, outcome) = toggle(existing);
        let message = match outcome {
            ToggleOutcome::Created => {
                self.store.add_follow(actor.id, target_id).await?;
                FOLLOWED
            }
            ToggleOutcome::Removed => {
                self.store.remove_follow(actor.id, target_id).await?;
                UNFOLLOWED
            }
        };

        tracing::debug!(follower = actor.id, following = target_id, ?outcome, "follow toggled");
        Ok(FollowStatus {
            message: message.to_string(),
            status: outcome,
        })
    }

    pub async fn my_page(&self, user_id: i64) -> AppResult<ProfileView> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let (follower_count, following_count) = self.store.follow_counts(user_id).await?;
        let articles = self.store.articles_by_user(user_id).await?;
        let like_articles = self.store.articles_liked_by(user_id).await?;

        Ok(ProfileView {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: user.created_at,
            follower_count,
            following_count,
            articles: articles.into_iter().map(ArticleSummary::from).collect(),
            like_articles: like_articles.into_iter().map(ArticleSummary::from).collect(),
        })
    }
}
