// handlers/authors.rs - /authors CRUD

use axum::extract::State;

use crate::api::resources::{collection, AuthorResource};
use crate::app::AppState;
use crate::database::models::AuthorInput;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

use super::extract::{ResourceId, Validated};

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<AuthorResource>> {
    let rows = state.authors.select_all().await?;
    Ok(ApiResponse::success(collection(rows)))
}

pub async fn create(
    State(state): State<AppState>,
    Validated(input): Validated<AuthorInput>,
) -> ApiResult<AuthorResource> {
    let author = state.authors.insert(&input).await?;
    tracing::info!("Created author {}", author.id);
    Ok(ApiResponse::created(author.into()))
}

pub async fn show(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> ApiResult<AuthorResource> {
    let author = state.authors.select_404(id).await?;
    Ok(ApiResponse::success(author.into()))
}

/// Full replace; an omitted `bio` is cleared
pub async fn update(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    Validated(input): Validated<AuthorInput>,
) -> ApiResult<AuthorResource> {
    let author = state.authors.update(id, &input).await?;
    Ok(ApiResponse::accepted(author.into()))
}

pub async fn destroy(State(state): State<AppState>, ResourceId(id): ResourceId) -> ApiResult<()> {
    state.authors.select_404(id).await?;

    let in_use = state.articles.count_by_author(id).await?;
    if in_use > 0 {
        return Err(ApiError::conflict(format!(
            "Author {} has {} article(s)",
            id, in_use
        )));
    }

    state
        .authors
        .delete(id)
        .await
        .map_err(|e| ApiError::from_delete(e, format!("Author {} has articles", id)))?;
    tracing::info!("Deleted author {}", id);
    Ok(ApiResponse::no_content())
}
