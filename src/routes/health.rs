/**
 * Health Routes
 * Liveness and readiness endpoints
 */
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::state::AppState;

// Track server start time for uptime calculation
lazy_static::lazy_static! {
    static ref SERVER_START: Instant = Instant::now();
}

/// Initialize the server start time
pub fn init_start_time() {
    lazy_static::initialize(&SERVER_START);
}

const STORE_UNREACHABLE: &str = "store unreachable";

/// Result of probing the store
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreCheck {
    pub backend: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ready check response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime: u64,
    pub store: StoreCheck,
}

/// Simple health response
#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

/// GET /health - Simple health ping
pub async fn health_ping() -> impl IntoResponse {
    Json(SimpleHealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /health/ready - 200 when the store answers, 503 otherwise
pub async fn health_ready(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.store.backend().to_string();

    let (ready, store) = match state.store.ping().await {
        Ok(duration) => (
            true,
            StoreCheck {
                backend,
                status: "healthy".to_string(),
                response_time_ms: Some(duration.as_millis() as u64),
                error: None,
            },
        ),
        Err(e) => {
            tracing::warn!(backend = %backend, "readiness check failed: {}", e);
            (
                false,
                StoreCheck {
                    backend,
                    status: "unhealthy".to_string(),
                    response_time_ms: None,
                    error: Some(STORE_UNREACHABLE.to_string()),
                },
            )
        }
    };

    let response = ReadyResponse {
        status: if ready { "ready" } else { "not ready" }.to_string(),
        timestamp: Utc::now(),
        uptime: SERVER_START.elapsed().as_secs(),
        store,
    };
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(response))
}
