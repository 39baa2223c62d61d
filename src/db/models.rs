//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User model
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// New user for insertion
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

/// Public projection of a user; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: user.created_at,
        }
    }
}

/// Article model
#[derive(Debug, Clone, FromRow)]
pub struct Article {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// Canonical path used for routing.
    pub fn path(&self) -> String {
        format!("/articles/{}/", self.id)
    }
}

/// New article for insertion
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
}

/// Comment model
#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub id: i64,
    pub user_id: i64,
    pub article_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New comment for insertion
#[derive(Debug, Clone)]
pub struct NewComment {
    pub user_id: i64,
    pub article_id: i64,
    pub content: String,
}

/// Pending email authentication code
#[derive(Debug, Clone, FromRow)]
pub struct EmailCode {
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}
