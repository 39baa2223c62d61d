//! Test environment on the in-memory store and a temporary media directory.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::auth::password::hash_password;
use crate::auth::{AuthUser, JwtCodec, TokenCodec, TokenKind};
use crate::config::AppConfig;
use crate::db::models::{Article, NewArticle, NewUser, User};
use crate::db::{MemoryStore, Store};
use crate::error::AppResult;
use crate::services::{CodeSender, ServiceContainer};
use crate::state::AppState;
use crate::storage::LocalFileStorage;

pub const TEST_PASSWORD: &str = "1234";

/// Keeps the last code sent to each address.
#[derive(Default)]
pub struct RecordingCodeSender {
    sent: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl CodeSender for RecordingCodeSender {
    async fn send(&self, email: &str, code: &str) -> AppResult<()> {
        self.sent
            .lock()
            .unwrap()
            .insert(email.to_string(), code.to_string());
        Ok(())
    }
}

pub struct TestEnv {
    pub config: AppConfig,
    pub store: Arc<MemoryStore>,
    pub tokens: Arc<dyn TokenCodec>,
    pub services: ServiceContainer,
    pub state: AppState,
    codes: Arc<RecordingCodeSender>,
    media: TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::build(false)
    }

    pub async fn with_email_codes() -> Self {
        Self::build(true)
    }

    fn build(require_email_code: bool) -> Self {
        let media = TempDir::new().unwrap();

        let mut config = AppConfig::default();
        config.environment = "test".to_string();
        config.auth.jwt_secret = "test-secret".to_string();
        config.auth.access_token_minutes = 5;
        config.auth.refresh_token_days = 1;
        config.auth.bcrypt_cost = 4;
        config.auth.require_email_code = require_email_code;
        config.media.root = media.path().to_path_buf();
        config.media.url = "/media".to_string();
        config.media.max_upload_bytes = 1024 * 1024;

        let store = Arc::new(MemoryStore::new());
        let tokens: Arc<dyn TokenCodec> = Arc::new(JwtCodec::new(&config.auth));
        let codes = Arc::new(RecordingCodeSender::default());
        let files = Arc::new(LocalFileStorage::from_config(&config.media));

        let state = AppState::with_parts(
            config.clone(),
            store.clone(),
            tokens.clone(),
            files,
            codes.clone(),
        );

        Self {
            config,
            store,
            tokens,
            services: state.services.clone(),
            state,
            codes,
            media,
        }
    }

    pub fn app(&self) -> Router {
        crate::create_app(self.state.clone())
    }

    pub async fn create_user(&self, email: &str, name: &str, password: &str) -> User {
        let password_hash = hash_password(password, self.config.auth.bcrypt_cost)
            .await
            .unwrap();
        self.store
            .create_user(NewUser {
                email: email.to_string(),
                name: name.to_string(),
                password_hash,
            })
            .await
            .unwrap()
    }

    /// A registered user with [`TEST_PASSWORD`].
    pub async fn auth_user(&self, email: &str) -> AuthUser {
        let user = self.create_user(email, "테스트", TEST_PASSWORD).await;
        AuthUser {
            id: user.id,
            email: user.email,
        }
    }

    pub fn access_token(&self, user: &AuthUser) -> String {
        self.tokens
            .issue(user.id, &user.email, TokenKind::Access)
            .unwrap()
    }

    pub async fn create_article(&self, owner: &AuthUser, title: &str) -> Article {
        self.store
            .create_article(NewArticle {
                user_id: owner.id,
                title: title.to_string(),
                content: format!("{} 내용", title),
                image: None,
            })
            .await
            .unwrap()
    }

    /// Whether a `/media/...` reference points at a file on disk.
    pub fn media_file_exists(&self, url: &str) -> bool {
        url.strip_prefix("/media/")
            .map(|rel| self.media.path().join(rel).is_file())
            .unwrap_or(false)
    }

    /// Number of files stored under a media category.
    pub fn media_file_count(&self, category: &str) -> usize {
        std::fs::read_dir(self.media.path().join(category))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.codes.sent.lock().unwrap().get(email).cloned()
    }
}

pub const MULTIPART_BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

/// Send one request through the router and decode the JSON reply
/// (`Value::Null` for an empty body).
pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    dispatch(app, req.body(body).unwrap()).await
}

pub async fn send_form(
    app: Router,
    uri: &str,
    token: Option<&str>,
    form: &str,
) -> (StatusCode, Value) {
    let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    dispatch(app, req.body(Body::from(form.to_string())).unwrap()).await
}

/// POST a multipart form made of text fields and at most one file part.
pub async fn send_multipart(
    app: Router,
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> (StatusCode, Value) {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                MULTIPART_BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((name, file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                MULTIPART_BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());

    let mut req = Request::post(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
    );
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    dispatch(app, req.body(Body::from(body)).unwrap()).await
}

/// Raw GET returning status and body bytes.
pub async fn get_bytes(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let res = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn dispatch(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
