//! Persistence layer. Services talk to a [`Store`]; the server picks the
//! PostgreSQL implementation when `DATABASE_URL` is set and the in-memory one
//! otherwise.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::AppResult;
use models::{Article, Comment, EmailCode, NewArticle, NewComment, NewUser, User};

pub use memory::MemoryStore;
pub use postgres::{DbConfig, PgStore};

/// Relational store behind every service.
///
/// Relation inserts (`add_follow`, `add_like`) and removals are idempotent:
/// inserting an existing pair or removing a missing one is not an error.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short name used in health output.
    fn backend(&self) -> &'static str;

    /// Round-trip latency to the backing store.
    async fn ping(&self) -> AppResult<Duration>;

    // Users

    /// Fails with `Validation` when the email is already registered.
    async fn create_user(&self, new_user: NewUser) -> AppResult<User>;
    async fn find_user(&self, id: i64) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    // Email authentication codes, one live code per email

    async fn save_email_code(&self, code: EmailCode) -> AppResult<()>;
    async fn find_email_code(&self, email: &str) -> AppResult<Option<EmailCode>>;
    async fn delete_email_code(&self, email: &str) -> AppResult<()>;

    // Follows

    async fn is_following(&self, follower_id: i64, following_id: i64) -> AppResult<bool>;
    async fn add_follow(&self, follower_id: i64, following_id: i64) -> AppResult<()>;
    async fn remove_follow(&self, follower_id: i64, following_id: i64) -> AppResult<()>;
    /// Returns `(followers, followings)` for the user.
    async fn follow_counts(&self, user_id: i64) -> AppResult<(i64, i64)>;

    // Articles

    async fn create_article(&self, new_article: NewArticle) -> AppResult<Article>;
    async fn find_article(&self, id: i64) -> AppResult<Option<Article>>;
    /// Newest first. Returns the page and the total row count.
    async fn list_articles(&self, limit: i64, offset: i64) -> AppResult<(Vec<Article>, i64)>;
    async fn articles_by_user(&self, user_id: i64) -> AppResult<Vec<Article>>;
    async fn articles_liked_by(&self, user_id: i64) -> AppResult<Vec<Article>>;

    // Likes

    async fn has_like(&self, user_id: i64, article_id: i64) -> AppResult<bool>;
    async fn add_like(&self, user_id: i64, article_id: i64) -> AppResult<()>;
    async fn remove_like(&self, user_id: i64, article_id: i64) -> AppResult<()>;
    async fn like_count(&self, article_id: i64) -> AppResult<i64>;

    // Comments

    async fn create_comment(&self, new_comment: NewComment) -> AppResult<Comment>;
    async fn find_comment(&self, id: i64) -> AppResult<Option<Comment>>;
    /// Fails with `NotFound` when the comment does not exist.
    async fn update_comment(&self, id: i64, content: &str) -> AppResult<Comment>;
    /// Returns whether a row was removed.
    async fn delete_comment(&self, id: i64) -> AppResult<bool>;
    /// Oldest first.
    async fn comments_for_article(&self, article_id: i64) -> AppResult<Vec<Comment>>;
}
