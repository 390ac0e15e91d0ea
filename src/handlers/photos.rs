// handlers/photos.rs - read-only /photos; photos are written through articles

use axum::extract::State;

use crate::api::resources::{collection, PhotoResource};
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};

use super::extract::ResourceId;

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<PhotoResource>> {
    let rows = state.photos.select_all().await?;
    Ok(ApiResponse::success(collection(rows)))
}

pub async fn show(
    State(state): State<AppState>,
    ResourceId(id): ResourceId,
) -> ApiResult<PhotoResource> {
    let photo = state.photos.select_404(id).await?;
    Ok(ApiResponse::success(photo.into()))
}
