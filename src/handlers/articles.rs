// handlers/articles.rs - /articles CRUD, including the photo upload flow
//
// Writes accept either a JSON body or a multipart form whose `photo` part
// is the image file. Responses embed the relations named by `?include=`.

use axum::{
    extract::{Query, State},
    Extension,
};
use serde::Deserialize;

use crate::api::resources::ArticleResource;
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::ArticleService;
use crate::types::Include;

use super::extract::{ArticlePayload, ResourceId};

#[derive(Debug, Deserialize)]
pub struct IncludeQuery {
    /// Comma separated relations: photo, author, category
    pub include: Option<String>,
}

impl IncludeQuery {
    fn parse(&self) -> Result<Include, ApiError> {
        Include::from_query(self.include.as_deref()).map_err(ApiError::bad_request)
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<IncludeQuery>,
) -> ApiResult<Vec<ArticleResource>> {
    let include = query.parse()?;
    let articles = ArticleService::new(&state).list(include).await?;
    Ok(ApiResponse::success(articles))
}

pub async fn create(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    payload: ArticlePayload,
) -> ApiResult<ArticleResource> {
    if let Some(Extension(user)) = &user {
        tracing::debug!("Article create requested by {}", user.subject);
    }
    let article = ArticleService::new(&state)
        .create(payload.input, payload.photo)
        .await?;
    Ok(ApiResponse::created(article))
}

pub async fn show(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    Query(query): Query<IncludeQuery>,
) -> ApiResult<ArticleResource> {
    let include = query.parse()?;
    let article = ArticleService::new(&state).show(id, include).await?;
    Ok(ApiResponse::success(article))
}

/// PUT /articles/:id - full replace; a new photo replaces the old one
pub async fn update(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    user: Option<Extension<AuthUser>>,
    payload: ArticlePayload,
) -> ApiResult<ArticleResource> {
    if let Some(Extension(user)) = &user {
        tracing::debug!("Article {} update requested by {}", id, user.subject);
    }
    let article = ArticleService::new(&state)
        .update(id, payload.input, payload.photo)
        .await?;
    Ok(ApiResponse::accepted(article))
}

/// DELETE /articles/:id - removes the article, its photo row and its file
pub async fn destroy(State(state): State<AppState>, ResourceId(id): ResourceId) -> ApiResult<()> {
    ArticleService::new(&state).destroy(id).await?;
    Ok(ApiResponse::no_content())
}
