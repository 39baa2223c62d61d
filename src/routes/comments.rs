/**
 * Comment Routes
 * Owner-only edit and delete
 */
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use super::articles::CommentRequest;
use super::Payload;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::state::AppState;

/// PUT /comments/{id}/
pub async fn update_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Payload(req): Payload<CommentRequest>,
) -> AppResult<impl IntoResponse> {
    let comment = state
        .services
        .comments
        .update(&user, id, &req.content)
        .await?;
    Ok(Json(comment))
}

/// DELETE /comments/{id}/
pub async fn delete_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let deleted = state.services.comments.delete(&user, id).await?;
    Ok(Json(deleted))
}
