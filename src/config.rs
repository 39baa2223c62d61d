//! Application configuration, read from the environment once at startup.

use std::path::PathBuf;

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub bcrypt_cost: u32,
    pub require_email_code: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
            access_token_minutes: env_or("ACCESS_TOKEN_MINUTES", 60),
            refresh_token_days: env_or("REFRESH_TOKEN_DAYS", 7),
            bcrypt_cost: env_or("BCRYPT_COST", bcrypt::DEFAULT_COST),
            require_email_code: env_or("REQUIRE_EMAIL_CODE", false),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Directory uploaded files are written to.
    pub root: PathBuf,
    /// Public URL prefix the root is served under.
    pub url: String,
    pub max_upload_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string())),
            url: std::env::var("MEDIA_URL").unwrap_or_else(|_| "/media".to_string()),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub auth: AuthConfig,
    pub media: MediaConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_or("PORT", 8000),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            auth: AuthConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Startup sanity checks. Production must not run on the default secret.
    pub fn validate(&self) -> Result<(), String> {
        if self.is_production()
            && (self.auth.jwt_secret.is_empty() || self.auth.jwt_secret == DEFAULT_JWT_SECRET)
        {
            return Err(
                "JWT_SECRET must be set to a secure, unique value in production".to_string(),
            );
        }
        if self.auth.access_token_minutes <= 0 || self.auth.refresh_token_days <= 0 {
            return Err("token lifetimes must be positive".to_string());
        }
        let media_url = self.media.url.trim_end_matches('/');
        if !media_url.starts_with('/') || media_url.is_empty() {
            return Err(format!(
                "MEDIA_URL must be an absolute path below the root, got {:?}",
                self.media.url
            ));
        }
        Ok(())
    }
}
