use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::permissions::ensure_owner;
use super::user_names;
use crate::auth::AuthUser;
use crate::db::models::{Comment, NewComment};
use crate::db::Store;
use crate::error::{AppError, AppResult};

pub const COMMENT_DELETED: &str = "댓글 삭제";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: i64,
    pub user: i64,
    pub user_name: String,
    pub article: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentResponse {
    pub fn with_names(comment: Comment, names: &HashMap<i64, String>) -> Self {
        Self {
            user_name: names.get(&comment.user_id).cloned().unwrap_or_default(),
            id: comment.id,
            user: comment.user_id,
            article: comment.article_id,
            content: comment.content,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentDeleted {
    pub message: String,
}

fn validate_content(content: &str) -> AppResult<&str> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Content is required".to_string()));
    }
    Ok(content)
}

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn Store>,
}

impl CommentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        actor: &AuthUser,
        article_id: i64,
        content: &str,
    ) -> AppResult<CommentResponse> {
        if self.store.find_article(article_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Article {} not found", article_id)));
        }
        let content = validate_content(content)?;

        let comment = self
            .store
            .create_comment(NewComment {
                user_id: actor.id,
                article_id,
                content: content.to_string(),
            })
            .await?;

        tracing::info!(comment_id = comment.id, article_id, user_id = actor.id, "comment created");
        self.respond(comment).await
    }

    pub async fn update(
        &self,
        actor: &AuthUser,
        comment_id: i64,
        content: &str,
    ) -> AppResult<CommentResponse> {
        let comment = self.find(comment_id).await?;
        ensure_owner(actor, &comment)?;
        let content = validate_content(content)?;

        let comment = self.store.update_comment(comment_id, content).await?;
        tracing::info!(comment_id, user_id = actor.id, "comment updated");
        self.respond(comment).await
    }

    pub async fn delete(&self, actor: &AuthUser, comment_id: i64) -> AppResult<CommentDeleted> {
        let comment = self.find(comment_id).await?;
        ensure_owner(actor, &comment)?;

        if !self.store.delete_comment(comment_id).await? {
            return Err(AppError::NotFound(format!("Comment {} not found", comment_id)));
        }
        tracing::info!(comment_id, user_id = actor.id, "comment deleted");
        Ok(CommentDeleted {
            message: COMMENT_DELETED.to_string(),
        })
    }

    async fn find(&self, id: i64) -> AppResult<Comment> {
        self.store
            .find_comment(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))
    }

    async fn respond(&self, comment: Comment) -> AppResult<CommentResponse> {
        let names = user_names(self.store.as_ref(), &[comment.user_id]).await?;
        Ok(CommentResponse::with_names(comment, &names))
    }
}
