/**
 * Article Routes
 * Listing, creation, detail, likes and comment creation
 */
use axum::{
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::{is_multipart, Payload};
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::services::articles::ArticleInput;
use crate::state::AppState;
use crate::storage::Upload;

// ============================================================================
// Request Types
// ============================================================================

/// Query parameters for GET /articles/
#[derive(Debug, Deserialize)]
pub struct ArticleListQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArticleFields {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentRequest {
    pub content: String,
}

/// Article submission: multipart (with an optional `image` file part),
/// url-encoded form, or JSON.
#[derive(Debug)]
pub struct ArticleForm(pub ArticleInput);

impl FromRequest<AppState> for ArticleForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Payload(fields) = Payload::<ArticleFields>::from_request(req, state).await?;
            return Ok(ArticleForm(ArticleInput {
                title: fields.title,
                content: fields.content,
                image: None,
            }));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        let mut input = ArticleInput::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid multipart data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "title" => input.title = field.text().await.map_err(multipart_error)?,
                "content" => input.content = field.text().await.map_err(multipart_error)?,
                "image" => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    // Browsers send an empty part when no file was chosen.
                    if !(file_name.is_empty() && bytes.is_empty()) {
                        input.image = Some(Upload { file_name, bytes });
                    }
                }
                other => tracing::debug!(field = %other, "ignoring unknown multipart field"),
            }
        }

        Ok(ArticleForm(input))
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Invalid multipart data: {}", e))
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /articles/ - Paginated list, newest first
pub async fn list_articles(
    State(state): State<AppState>,
    Query(query): Query<ArticleListQuery>,
) -> AppResult<impl IntoResponse> {
    let list = state
        .services
        .articles
        .list(query.page, query.page_size)
        .await?;
    Ok(Json(list))
}

/// POST /articles/ - Create an article
pub async fn create_article(
    State(state): State<AppState>,
    user: AuthUser,
    ArticleForm(input): ArticleForm,
) -> AppResult<impl IntoResponse> {
    let created = state.services.articles.create(&user, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /articles/{id}/
pub async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let detail = state.services.articles.detail(id).await?;
    Ok(Json(detail))
}

/// POST /articles/{id}/like/ - Like or unlike
pub async fn toggle_like(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let status = state.services.articles.toggle_like(&user, id).await?;
    Ok(Json(status))
}

/// POST /articles/{id}/comments/
pub async fn create_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Payload(req): Payload<CommentRequest>,
) -> AppResult<impl IntoResponse> {
    let comment = state
        .services
        .comments
        .create(&user, id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    use crate::services::articles::{ARTICLE_CREATED, LIKED, UNLIKED};
    use crate::storage::PNG_BYTES;
    use crate::test_support::{get_bytes, send, send_form, send_multipart, TestEnv};

    #[tokio::test]
    async fn test_create_requires_token() {
        let env = TestEnv::new().await;
        let (status, body) = send(
            env.app(),
            Method::POST,
            "/articles/",
            None,
            Some(json!({"title": "t", "content": "c"})),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
    }

    #[tokio::test]
    async fn test_create_with_garbage_token_is_unauthorized() {
        let env = TestEnv::new().await;
        let (status, _) = send(
            env.app(),
            Method::POST,
            "/articles/",
            Some("not-a-jwt"),
            Some(json!({"title": "t", "content": "c"})),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_json_article() {
        let env = TestEnv::new().await;
        let user = env.auth_user("writer@test.com").await;
        let token = env.access_token(&user);

        let (status, body) = send(
            env.app(),
            Method::POST,
            "/articles/",
            Some(&token),
            Some(json!({"title": "테스트 제목", "content": "테스트 내용"})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], ARTICLE_CREATED);
        assert_eq!(body["article"]["title"], "테스트 제목");
        assert_eq!(body["article"]["user"], user.id);
        assert_eq!(body["article"]["image"], Value::Null);
    }

    #[tokio::test]
    async fn test_create_form_article() {
        let env = TestEnv::new().await;
        let user = env.auth_user("writer@test.com").await;
        let token = env.access_token(&user);

        let (status, body) = send_form(
            env.app(),
            "/articles/",
            Some(&token),
            "title=form+title&content=form+content",
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["article"]["title"], "form title");
    }

    #[tokio::test]
    async fn test_create_multipart_with_image_is_served() {
        let env = TestEnv::new().await;
        let user = env.auth_user("writer@test.com").await;
        let token = env.access_token(&user);

        let (status, body) = send_multipart(
            env.app(),
            "/articles/",
            Some(&token),
            &[("title", "사진"), ("content", "사진 내용")],
            Some(("image", "photo.png", PNG_BYTES)),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let image = body["article"]["image"].as_str().unwrap().to_string();
        assert!(image.starts_with("/media/article/"));
        assert!(env.media_file_exists(&image));

        let (status, bytes) = get_bytes(env.app(), &image).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, PNG_BYTES);

        let (status, detail) = send(
            env.app(),
            Method::GET,
            &format!("/articles/{}/", body["article"]["id"]),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["image"], image.as_str());
    }

    #[tokio::test]
    async fn test_create_multipart_rejects_non_image() {
        let env = TestEnv::new().await;
        let user = env.auth_user("writer@test.com").await;
        let token = env.access_token(&user);

        let (status, _) = send_multipart(
            env.app(),
            "/articles/",
            Some(&token),
            &[("title", "t"), ("content", "c")],
            Some(("image", "notes.txt", b"plain text")),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_missing_title_is_bad_request() {
        let env = TestEnv::new().await;
        let user = env.auth_user("writer@test.com").await;
        let token = env.access_token(&user);

        let (status, _) = send(
            env.app(),
            Method::POST,
            "/articles/",
            Some(&token),
            Some(json!({"content": "c"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_detail_matches_service_projection() {
        let env = TestEnv::new().await;
        let user = env.auth_user("writer@test.com").await;
        let article = env.create_article(&user, "상세").await;

        let (status, body) = send(
            env.app(),
            Method::GET,
            &format!("/articles/{}/", article.id),
            None,
            None,
        )
        .await;

        let expected = env.services.articles.detail(article.id).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::to_value(expected).unwrap());
    }

    #[tokio::test]
    async fn test_detail_unknown_article_is_not_found() {
        let env = TestEnv::new().await;
        let (status, body) = send(env.app(), Method::GET, "/articles/42/", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_list_paginates() {
        let env = TestEnv::new().await;
        let user = env.auth_user("writer@test.com").await;
        for i in 0..3 {
            env.create_article(&user, &format!("글 {}", i)).await;
        }

        let (status, body) = send(
            env.app(),
            Method::GET,
            "/articles/?page=1&page_size=2",
            None,
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(body["page_size"], 2);
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
        assert_eq!(body["items"][0]["title"], "글 2");
    }

    #[tokio::test]
    async fn test_list_page_far_past_the_end_is_empty() {
        let env = TestEnv::new().await;
        let user = env.auth_user("writer@test.com").await;
        env.create_article(&user, "유일한 글").await;

        let (status, body) = send(
            env.app(),
            Method::GET,
            &format!("/articles/?page={}&page_size=100", i64::MAX),
            None,
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"], i64::MAX);
        assert_eq!(body["total"], 1);
        assert!(body["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_like_twice_toggles() {
        let env = TestEnv::new().await;
        let user = env.auth_user("reader@test.com").await;
        let article = env.create_article(&user, "좋아요 글").await;
        let token = env.access_token(&user);
        let uri = format!("/articles/{}/like/", article.id);

        let (status, body) = send(env.app(), Method::POST, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], LIKED);
        assert_eq!(body["like_count"], 1);

        let (status, body) = send(env.app(), Method::POST, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], UNLIKED);
        assert_eq!(body["like_count"], 0);
    }

    #[tokio::test]
    async fn test_like_unknown_article_is_not_found() {
        let env = TestEnv::new().await;
        let user = env.auth_user("reader@test.com").await;
        let token = env.access_token(&user);

        let (status, _) = send(env.app(), Method::POST, "/articles/7/like/", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_comment() {
        let env = TestEnv::new().await;
        let user = env.auth_user("reader@test.com").await;
        let article = env.create_article(&user, "댓글 글").await;
        let token = env.access_token(&user);

        let (status, body) = send(
            env.app(),
            Method::POST,
            &format!("/articles/{}/comments/", article.id),
            Some(&token),
            Some(json!({"content": "comment test"})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["content"], "comment test");
        assert_eq!(body["article"], article.id);
        assert_eq!(body["user"], user.id);
    }

    #[tokio::test]
    async fn test_create_comment_requires_token() {
        let env = TestEnv::new().await;
        let user = env.auth_user("reader@test.com").await;
        let article = env.create_article(&user, "댓글 글").await;

        let (status, _) = send(
            env.app(),
            Method::POST,
            &format!("/articles/{}/comments/", article.id),
            None,
            Some(json!({"content": "comment test"})),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
