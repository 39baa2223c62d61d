/**
 * Routes Module
 * API route handlers and the request body extractors they share
 */

pub mod articles;
pub mod comments;
pub mod health;
pub mod users;

use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::AppError;

fn content_type(req: &Request) -> String {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

pub(crate) fn is_multipart(req: &Request) -> bool {
    content_type(req).starts_with("multipart/form-data")
}

/// Request body accepted as JSON, url-encoded form, or the text fields of a
/// multipart form.
#[derive(Debug)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let ctype = content_type(&req);

        if ctype.starts_with("application/json") {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            return Ok(Payload(value));
        }

        if ctype.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            let mut fields = Map::new();
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| AppError::Validation(format!("Invalid multipart data: {}", e)))?
            {
                let Some(name) = field.name().map(str::to_string) else {
                    continue;
                };
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid multipart data: {}", e)))?;
                fields.insert(name, Value::String(text));
            }
            let value = serde_json::from_value(Value::Object(fields))
                .map_err(|e| AppError::Validation(e.to_string()))?;
            return Ok(Payload(value));
        }

        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(Payload(value))
    }
}
