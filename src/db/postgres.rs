//! PostgreSQL store backed by a `sqlx` connection pool.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::{Duration, Instant};

use super::models::{Article, Comment, EmailCode, NewArticle, NewComment, NewUser, User};
use super::Store;
use crate::error::{AppError, AppResult};

const UNIQUE_VIOLATION: &str = "23505";

const ARTICLE_COLUMNS: &str = "id, user_id, title, content, image, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, user_id, article_id, content, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/blog".to_string()),
            max_connections: std::env::var("DB_POOL_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_POOL_MIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        }
    }
}

impl DbConfig {
    /// URL with the credentials masked, for logs.
    pub fn redacted_url(&self) -> String {
        match (self.url.find("://"), self.url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://***@{}", &self.url[..scheme_end], &self.url[at + 1..])
            }
            _ => self.url.clone(),
        }
    }
}

pub async fn init_pool(config: &DbConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!("Initializing database connection pool...");
    tracing::debug!("Database URL: {}", config.redacted_url());

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            email TEXT NOT NULL,
            name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_lower ON users (LOWER(email))")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS email_codes (
            email TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS follows (
            follower_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            following_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (follower_id, following_id)
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users(id),
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            image TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles(created_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_user_id ON articles(user_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS article_likes (
            user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            article_id BIGINT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (user_id, article_id)
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users(id),
            article_id BIGINT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_article_id ON comments(article_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == UNIQUE_VIOLATION)
        .unwrap_or(false)
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, migrate and wrap the pool.
    pub async fn connect(config: &DbConfig) -> Result<Self, sqlx::Error> {
        let pool = init_pool(config).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> AppResult<Duration> {
        let start = Instant::now();
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(start.elapsed())
    }

    async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, password_hash, created_at)
            VALUES ($1, $2, $3, now())
            RETURNING id, email, name, password_hash, created_at
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Validation("Email already registered".to_string())
            } else {
                AppError::Database(e)
            }
        })
    }

    async fn find_user(&self, id: i64) -> AppResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            r#"SELECT id, email, name, password_hash, created_at
               FROM users
               WHERE LOWER(email) = LOWER($1)"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn save_email_code(&self, code: EmailCode) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO email_codes (email, code, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET code = EXCLUDED.code, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&code.email)
        .bind(&code.code)
        .bind(code.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_email_code(&self, email: &str) -> AppResult<Option<EmailCode>> {
        Ok(sqlx::query_as::<_, EmailCode>(
            "SELECT email, code, expires_at FROM email_codes WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_email_code(&self, email: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM email_codes WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_following(&self, follower_id: i64, following_id: i64) -> AppResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2)",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn add_follow(&self, follower_id: i64, following_id: i64) -> AppResult<()> {
        sqlx::query(
            r#"INSERT INTO follows (follower_id, following_id)
               VALUES ($1, $2)
               ON CONFLICT DO NOTHING"#,
        )
        .bind(follower_id)
        .bind(following_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_follow(&self, follower_id: i64, following_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
            .bind(follower_id)
            .bind(following_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn follow_counts(&self, user_id: i64) -> AppResult<(i64, i64)> {
        let counts: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM follows WHERE following_id = $1),
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn create_article(&self, new_article: NewArticle) -> AppResult<Article> {
        Ok(sqlx::query_as::<_, Article>(&format!(
            r#"
            INSERT INTO articles (user_id, title, content, image, created_at, updated_at)
            VALUES ($1, $2, $3, $4, now(), now())
            RETURNING {}
            "#,
            ARTICLE_COLUMNS
        ))
        .bind(new_article.user_id)
        .bind(&new_article.title)
        .bind(&new_article.content)
        .bind(&new_article.image)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_article(&self, id: i64) -> AppResult<Option<Article>> {
        Ok(sqlx::query_as::<_, Article>(&format!(
            "SELECT {} FROM articles WHERE id = $1",
            ARTICLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_articles(&self, limit: i64, offset: i64) -> AppResult<(Vec<Article>, i64)> {
        let articles = sqlx::query_as::<_, Article>(&format!(
            r#"
            SELECT {}
            FROM articles
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
            ARTICLE_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;

        Ok((articles, total))
    }

    async fn articles_by_user(&self, user_id: i64) -> AppResult<Vec<Article>> {
        Ok(sqlx::query_as::<_, Article>(&format!(
            "SELECT {} FROM articles WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            ARTICLE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn articles_liked_by(&self, user_id: i64) -> AppResult<Vec<Article>> {
        Ok(sqlx::query_as::<_, Article>(
            r#"
            SELECT a.id, a.user_id, a.title, a.content, a.image, a.created_at, a.updated_at
            FROM articles a
            JOIN article_likes l ON l.article_id = a.id
            WHERE l.user_id = $1
            ORDER BY a.created_at DESC, a.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn has_like(&self, user_id: i64, article_id: i64) -> AppResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM article_likes WHERE user_id = $1 AND article_id = $2)",
        )
        .bind(user_id)
        .bind(article_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn add_like(&self, user_id: i64, article_id: i64) -> AppResult<()> {
        sqlx::query(
            r#"INSERT INTO article_likes (user_id, article_id)
               VALUES ($1, $2)
               ON CONFLICT DO NOTHING"#,
        )
        .bind(user_id)
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_like(&self, user_id: i64, article_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM article_likes WHERE user_id = $1 AND article_id = $2")
            .bind(user_id)
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn like_count(&self, article_id: i64) -> AppResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM article_likes WHERE article_id = $1")
                .bind(article_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn create_comment(&self, new_comment: NewComment) -> AppResult<Comment> {
        Ok(sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO comments (user_id, article_id, content, created_at, updated_at)
            VALUES ($1, $2, $3, now(), now())
            RETURNING {}
            "#,
            COMMENT_COLUMNS
        ))
        .bind(new_comment.user_id)
        .bind(new_comment.article_id)
        .bind(&new_comment.content)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_comment(&self, id: i64) -> AppResult<Option<Comment>> {
        Ok(sqlx::query_as::<_, Comment>(&format!(
            "SELECT {} FROM comments WHERE id = $1",
            COMMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_comment(&self, id: i64, content: &str) -> AppResult<Comment> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"
            UPDATE comments
            SET content = $1, updated_at = now()
            WHERE id = $2
            RETURNING {}
            "#,
            COMMENT_COLUMNS
        ))
        .bind(content)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))
    }

    async fn delete_comment(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn comments_for_article(&self, article_id: i64) -> AppResult<Vec<Comment>> {
        Ok(sqlx::query_as::<_, Comment>(&format!(
            "SELECT {} FROM comments WHERE article_id = $1 ORDER BY created_at ASC, id ASC",
            COMMENT_COLUMNS
        ))
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
