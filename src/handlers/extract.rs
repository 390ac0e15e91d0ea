// handlers/extract.rs - request extractors shared by the resource handlers

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Request},
    http::{header::CONTENT_TYPE, request::Parts, StatusCode},
    Json,
};
use serde_json::{Map, Value};

use crate::app::AppState;
use crate::database::models::ArticleInput;
use crate::error::ApiError;
use crate::validation::{FieldErrors, Upload, UploadRules, ValidUpload, Validate};

/// Multipart field that carries the article photo
pub const PHOTO_FIELD: &str = "photo";

/// Numeric `:id` path segment
#[derive(Debug, Clone, Copy)]
pub struct ResourceId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for ResourceId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        raw.parse::<i64>()
            .map(ResourceId)
            .map_err(|_| ApiError::bad_request(format!("Invalid id '{}'", raw)))
    }
}

/// A JSON object body, kept untyped so validation can report every field
pub struct JsonFields(pub Map<String, Value>);

#[async_trait]
impl<S> FromRequest<S> for JsonFields
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| match rejection.status() {
                StatusCode::UNSUPPORTED_MEDIA_TYPE => {
                    ApiError::UnsupportedMediaType(rejection.body_text())
                }
                StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(rejection.body_text()),
                _ => ApiError::invalid_json(rejection.body_text()),
            })?;

        match value {
            Value::Object(map) => Ok(JsonFields(map)),
            _ => Err(ApiError::invalid_json("Request body must be a JSON object")),
        }
    }
}

/// JSON body validated into a typed input
pub struct Validated<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Validated<T>
where
    S: Send + Sync,
    T: Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let JsonFields(fields) = JsonFields::from_request(req, state).await?;
        Ok(Validated(T::validate(&fields)?))
    }
}

/// Article fields plus an optional photo, from either a multipart form or
/// a JSON body. Field and file errors are reported together.
pub struct ArticlePayload {
    pub input: ArticleInput,
    pub photo: Option<ValidUpload>,
}

#[async_trait]
impl FromRequest<AppState> for ArticlePayload {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let (fields, upload) = if is_multipart(&req) {
            read_multipart(req, state).await?
        } else {
            let JsonFields(fields) = JsonFields::from_request(req, state).await?;
            (fields, None)
        };

        let rules = UploadRules {
            max_bytes: state.config.storage.max_upload_bytes,
        };

        let mut errors = FieldErrors::new();
        let input = ArticleInput::validate(&fields).map_err(|e| errors.extend(e)).ok();
        let photo = match upload {
            Some(upload) => upload.validate(rules).map_err(|e| errors.extend(e)).ok(),
            None => None,
        };

        match input {
            Some(input) if errors.is_empty() => Ok(ArticlePayload { input, photo }),
            _ => Err(ApiError::invalid_fields(errors)),
        }
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

async fn read_multipart(
    req: Request,
    state: &AppState,
) -> Result<(Map<String, Value>, Option<Upload>), ApiError> {
    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?;

    let mut fields = Map::new();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == PHOTO_FIELD {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;

            // Browsers send an empty, unnamed part for an untouched file input
            if bytes.is_empty() && file_name.as_deref().unwrap_or("").is_empty() {
                continue;
            }

            upload = Some(Upload {
                field: name,
                file_name,
                content_type,
                bytes,
            });
        } else {
            let text = field.text().await.map_err(multipart_error)?;
            fields.insert(name, Value::String(text));
        }
    }

    Ok((fields, upload))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::bad_request(err.body_text())
    }
}
