// handlers/system.rs - public service endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - service description
pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "CMS API (Rust)",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Articles, categories, authors and photos over REST",
        "endpoints": {
            "health": "/health",
            "categories": "/categories[/:id]",
            "authors": "/authors[/:id]",
            "articles": "/articles[/:id] (multipart or JSON, ?include=photo,author,category)",
            "photos": "/photos[/:id] (read only)",
            "storage": "/storage/* (stored files)"
        }
    }))
}

/// GET /health - 503 when the database does not answer
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.health.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok"
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database": "unavailable"
                })),
            )
        }
    }
}
