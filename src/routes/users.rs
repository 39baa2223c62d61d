/**
 * User Routes
 * Signup, email codes, tokens, follows and the profile page
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::Payload;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::services::users::SignupInput;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CodeRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub athnt_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// POST /users/athnt/ - Email a signup code
pub async fn send_code(
    State(state): State<AppState>,
    Payload(req): Payload<CodeRequest>,
) -> AppResult<impl IntoResponse> {
    let sent = state.services.users.send_code(&req.email).await?;
    Ok(Json(sent))
}

/// POST /users/signup/ - Register an account
pub async fn signup(
    State(state): State<AppState>,
    Payload(req): Payload<SignupRequest>,
) -> AppResult<impl IntoResponse> {
    let user = state
        .services
        .users
        .signup(SignupInput {
            email: req.email,
            name: req.name,
            password: req.password,
            athnt_code: req.athnt_code,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /users/login/ - Exchange credentials for an access/refresh pair
pub async fn login(
    State(state): State<AppState>,
    Payload(req): Payload<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let pair = state.services.auth.login(&req.email, &req.password).await?;
    Ok(Json(pair))
}

/// POST /users/api/token/refresh/ - Mint a new access token
pub async fn refresh_token(
    State(state): State<AppState>,
    Payload(req): Payload<RefreshRequest>,
) -> AppResult<impl IntoResponse> {
    let access = state.services.auth.refresh(&req.refresh).await?;
    Ok(Json(access))
}

/// POST /users/{user_id}/ - Follow or unfollow
pub async fn follow(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let status = state.services.users.toggle_follow(&user, user_id).await?;
    Ok(Json(status))
}

/// GET /users/mypage/{user_id}/
pub async fn my_page(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let profile = state.services.users.my_page(user_id).await?;
    Ok(Json(profile))
}
