use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::comments::CommentResponse;
use super::toggle::{toggle, Relation, ToggleOutcome};
use super::user_names;
use crate::auth::AuthUser;
use crate::db::models::{Article, NewArticle};
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::storage::{validate_image, FileStorage, Upload};

pub const ARTICLE_CREATED: &str = "게시글을 등록했습니다.";
pub const LIKED: &str = "좋아요";
pub const UNLIKED: &str = "좋아요 취소";

const IMAGE_CATEGORY: &str = "article";
const MAX_PAGE_SIZE: i64 = 100;

/// Fields submitted when creating an article.
#[derive(Debug, Clone, Default)]
pub struct ArticleInput {
    pub title: String,
    pub content: String,
    pub image: Option<Upload>,
}

/// Full article view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDetail {
    pub id: i64,
    pub user: i64,
    pub user_name: String,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub like_count: i64,
    pub comments: Vec<CommentResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Article as shown in lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: i64,
    pub user: i64,
    pub title: String,
    pub image: Option<String>,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

impl From<Article> for ArticleSummary {
    fn from(article: Article) -> Self {
        Self {
            path: article.path(),
            id: article.id,
            user: article.user_id,
            title: article.title,
            image: article.image,
            created_at: article.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleCreated {
    pub message: String,
    pub article: ArticleDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleListResponse {
    pub items: Vec<ArticleSummary>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeStatus {
    pub message: String,
    pub status: ToggleOutcome,
    pub like_count: i64,
}

#[derive(Clone)]
pub struct ArticleService {
    store: Arc<dyn Store>,
    files: Arc<dyn FileStorage>,
    max_upload_bytes: usize,
}

impl ArticleService {
    pub fn new(store: Arc<dyn Store>, files: Arc<dyn FileStorage>, max_upload_bytes: usize) -> Self {
        Self {
            store,
            files,
            max_upload_bytes,
        }
    }

    pub async fn create(&self, actor: &AuthUser, input: ArticleInput) -> AppResult<ArticleCreated> {
        let title = input.title.trim();
        let content = input.content.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if content.is_empty() {
            return Err(AppError::Validation("Content is required".to_string()));
        }

        // Validate before touching storage so a bad upload leaves nothing behind.
        let image = match input.image {
            Some(upload) => {
                let extension = validate_image(&upload, self.max_upload_bytes)?;
                Some(self.files.save(IMAGE_CATEGORY, extension, upload.bytes).await?)
            }
            None => None,
        };

        let inserted = self
            .store
            .create_article(NewArticle {
                user_id: actor.id,
                title: title.to_string(),
                content: content.to_string(),
                image: image.clone(),
            })
            .await;
        let article = match inserted {
            Ok(article) => article,
            Err(e) => {
                if let Some(reference) = image {
                    if let Err(cleanup) = self.files.remove(&reference).await {
                        tracing::warn!("Failed to remove orphaned upload {}: {}", reference, cleanup);
                    }
                }
                return Err(e);
            }
        };

        tracing::info!(article_id = article.id, user_id = actor.id, "article created");

        Ok(ArticleCreated {
            message: ARTICLE_CREATED.to_string(),
            article: self.project(article).await?,
        })
    }

    pub async fn detail(&self, id: i64) -> AppResult<ArticleDetail> {
        let article = self.find(id).await?;
        self.project(article).await
    }

    pub async fn list(&self, page: i64, page_size: i64) -> AppResult<ArticleListResponse> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let page = page.max(1);
        // Pages past i64 range are simply empty
        let offset = (page - 1).saturating_mul(page_size);

        let (articles, total) = self.store.list_articles(page_size, offset).await?;
        Ok(ArticleListResponse {
            items: articles.into_iter().map(ArticleSummary::from).collect(),
            page,
            page_size,
            total,
        })
    }

    pub async fn toggle_like(&self, actor: &AuthUser, article_id: i64) -> AppResult<LikeStatus> {
        self.find(article_id).await?;

        let existing = Relation::from(self.store.has_like(actor.id, article_id).await?);
        let (_, outcome) = toggle(existing);
        let message = match outcome {
            ToggleOutcome::Created => {
                self.store.add_like(actor.id, article_id).await?;
                LIKED
            }
            ToggleOutcome::Removed => {
                self.store.remove_like(actor.id, article_id).await?;
                UNLIKED
            }
        };

        tracing::debug!(article_id, user_id = actor.id, ?outcome, "like toggled");

        Ok(LikeStatus {
            message: message.to_string(),
            status: outcome,
            like_count: self.store.like_count(article_id).await?,
        })
    }

    async fn find(&self, id: i64) -> AppResult<Article> {
        self.store
            .find_article(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Article {} not found", id)))
    }

    /// Detail projection of the stored state of an article.
    async fn project(&self, article: Article) -> AppResult<ArticleDetail> {
        let like_count = self.store.like_count(article.id).await?;
        let comments = self.store.comments_for_article(article.id).await?;

        let mut user_ids: Vec<i64> = comments.iter().map(|c| c.user_id).collect();
        user_ids.push(article.user_id);
        let names = user_names(self.store.as_ref(), &user_ids).await?;

        Ok(ArticleDetail {
            id: article.id,
            user: article.user_id,
            user_name: names.get(&article.user_id).cloned().unwrap_or_default(),
            title: article.title,
            content: article.content,
            image: article.image,
            like_count,
            comments: comments
                .into_iter()
                .map(|c| CommentResponse::with_names(c, &names))
                .collect(),
            created_at: article.created_at,
            updated_at: article.updated_at,
        })
    }
}
