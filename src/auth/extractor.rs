use axum::{extract::FromRequestParts, http::request::Parts};

use super::tokens::TokenKind;
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated caller, resolved from `Authorization: Bearer <access>`.
/// Handlers taking this extractor reject unauthenticated requests with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts).ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided".to_string())
        })?;

        let claims = state
            .tokens
            .verify(token, TokenKind::Access)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        Ok(AuthUser {
            id: claims.user_id,
            email: claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut req = Request::get("/");
        if let Some(value) = auth {
            req = req.header(axum::http::header::AUTHORIZATION, value);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_extract_bearer_token() {
        let parts = parts_with(Some("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&parts), Some("abc.def.ghi"));
    }

    #[test]
    fn test_extract_bearer_token_rejects_other_schemes() {
        assert_eq!(extract_bearer_token(&parts_with(Some("Basic dXNlcjpwdw=="))), None);
        assert_eq!(extract_bearer_token(&parts_with(Some("Bearer   "))), None);
        assert_eq!(extract_bearer_token(&parts_with(None)), None);
    }
}
