// handlers/categories.rs - /categories CRUD

use axum::extract::State;

use crate::api::resources::{collection, CategoryResource};
use crate::app::AppState;
use crate::database::models::CategoryInput;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

use super::extract::{ResourceId, Validated};

/// GET /categories
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<CategoryResource>> {
    let rows = state.categories.select_all().await?;
    Ok(ApiResponse::success(collection(rows)))
}

/// POST /categories
pub async fn create(
    State(state): State<AppState>,
    Validated(input): Validated<CategoryInput>,
) -> ApiResult<CategoryResource> {
    let category = state.categories.insert(&input).await?;
    tracing::info!("Created category {}", category.id);
    Ok(ApiResponse::created(category.into()))
}

/// GET /categories/:id
pub async fn show(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> ApiResult<CategoryResource> {
    let category = state.categories.select_404(id).await?;
    Ok(ApiResponse::success(category.into()))
}

/// PUT /categories/:id
pub async fn update(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
    Validated(input): Validated<CategoryInput>,
) -> ApiResult<CategoryResource> {
    let category = state.categories.update(id, &input).await?;
    Ok(ApiResponse::accepted(category.into()))
}

/// DELETE /categories/:id - refused while articles still reference it
pub async fn destroy(State(state): State<AppState>, ResourceId(id): ResourceId) -> ApiResult<()> {
    state.categories.select_404(id).await?;

    let in_use = state.articles.count_by_category(id).await?;
    if in_use > 0 {
        return Err(ApiError::conflict(format!(
            "Category {} is used by {} article(s)",
            id, in_use
        )));
    }

    state
        .categories
        .delete(id)
        .await
        .map_err(|e| ApiError::from_delete(e, format!("Category {} is used by articles", id)))?;
    tracing::info!("Deleted category {}", id);
    Ok(ApiResponse::no_content())
}
