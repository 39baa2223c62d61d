//! Blog Backend - library for app logic and testing

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;

#[cfg(test)]
mod test_support;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::db::{DbConfig, MemoryStore, PgStore, Store};
use crate::state::AppState;

/// Room for multipart framing and text fields on top of the largest upload.
const BODY_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local frontend dev server.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();
    let body_limit = state.config.media.max_upload_bytes + BODY_OVERHEAD_BYTES;
    let media_url = state.config.media.url.trim_end_matches('/').to_string();
    let media = ServeDir::new(&state.config.media.root);

    Router::new()
        .route("/users/athnt/", post(routes::users::send_code))
        .route("/users/signup/", post(routes::users::signup))
        .route("/users/login/", post(routes::users::login))
        .route("/users/api/token/refresh/", post(routes::users::refresh_token))
        .route("/users/mypage/{user_id}/", get(routes::users::my_page))
        .route("/users/{user_id}/", post(routes::users::follow))
        .route(
            "/articles/",
            get(routes::articles::list_articles).post(routes::articles::create_article),
        )
        .route("/articles/{id}/", get(routes::articles::get_article))
        .route("/articles/{id}/like/", post(routes::articles::toggle_like))
        .route("/articles/{id}/comments/", post(routes::articles::create_comment))
        .route(
            "/comments/{id}/",
            put(routes::comments::update_comment).delete(routes::comments::delete_comment),
        )
        .route("/health", get(routes::health::health_ping))
        .route("/health/ready", get(routes::health::health_ready))
        .nest_service(&media_url, media)
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        // Extractors default to 2 MB; uploads need the configured ceiling
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
}

/// Pick the store: PostgreSQL when DATABASE_URL is set, memory otherwise.
async fn init_store() -> Arc<dyn Store> {
    if std::env::var("DATABASE_URL").is_err() {
        tracing::info!("DATABASE_URL not set. Using the in-memory store; data is lost on restart.");
        return Arc::new(MemoryStore::new());
    }

    let db_config = DbConfig::default();
    match PgStore::connect(&db_config).await {
        Ok(store) => Arc::new(store),
        Err(e) => panic!(
            "FATAL: could not connect to {}: {}",
            db_config.redacted_url(),
            e
        ),
    }
}

/// Run the server (used by main).
pub async fn run() {
    dotenvy::dotenv().ok();

    // Dropping the guards stops the background log writers.
    let _log_guards = logging::init();

    routes::health::init_start_time();

    let config = AppConfig::from_env();
    if let Err(e) = config.validate() {
        panic!("FATAL: {}. Refusing to start.", e);
    }

    let store = init_store().await;
    tracing::info!(backend = store.backend(), "store ready");

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid HOST/PORT configuration");

    let app = create_app(AppState::new(config, store));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
