use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeader,
    trace::TraceLayer,
};

use crate::config::{AppConfig, Environment};
use crate::database::models::{Author, Category, Photo};
use crate::database::{
    ArticleRepository, Database, HealthCheck, PgArticleRepository, PgRepository, Repository,
};
use crate::handlers;
use crate::storage::{BlobStore, LocalBlobStore};

/// Everything a handler needs, injected through axum `State`
#[derive(Clone)]
pub struct AppState {
    pub categories: Arc<dyn Repository<Category>>,
    pub authors: Arc<dyn Repository<Author>>,
    pub photos: Arc<dyn Repository<Photo>>,
    pub articles: Arc<dyn ArticleRepository>,
    pub blobs: Arc<dyn BlobStore>,
    pub health: Arc<dyn HealthCheck>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Postgres repositories over a shared pool, local disk blobs
    pub fn postgres(database: Database, config: AppConfig) -> Self {
        let pool = database.pool().clone();
        let blobs = LocalBlobStore::new(config.storage.root.clone());

        Self {
            categories: Arc::new(PgRepository::<Category>::new(pool.clone())),
            authors: Arc::new(PgRepository::<Author>::new(pool.clone())),
            photos: Arc::new(PgRepository::<Photo>::new(pool.clone())),
            articles: Arc::new(PgArticleRepository::new(pool)),
            blobs: Arc::new(blobs),
            health: Arc::new(database),
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    let resources = Router::new()
        .merge(category_routes())
        .merge(author_routes())
        .merge(article_routes())
        .merge(photo_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::require_bearer,
        ));

    let router = Router::new()
        // Public
        .route("/", get(handlers::system::root))
        .route("/health", get(handlers::system::health))
        .nest_service("/storage", stored_files(&config))
        .merge(resources)
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .with_state(state);

    let router = match cors_layer(&config) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Uploaded files, served with their content type pinned to the extension
fn stored_files(config: &AppConfig) -> SetResponseHeader<ServeDir, HeaderValue> {
    SetResponseHeader::overriding(
        ServeDir::new(&config.storage.root),
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    )
}

fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    if !config.security.enable_cors {
        return None;
    }
    if config.environment == Environment::Development {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

fn category_routes() -> Router<AppState> {
    use handlers::categories;

    Router::new()
        .route("/categories", get(categories::list).post(categories::create))
        .route(
            "/categories/:id",
            get(categories::show)
                .put(categories::update)
                .delete(categories::destroy),
        )
}

fn author_routes() -> Router<AppState> {
    use handlers::authors;

    Router::new()
        .route("/authors", get(authors::list).post(authors::create))
        .route(
            "/authors/:id",
            get(authors::show).put(authors::update).delete(authors::destroy),
        )
}

fn article_routes() -> Router<AppState> {
    use handlers::articles;

    Router::new()
        .route("/articles", get(articles::list).post(articles::create))
        .route(
            "/articles/:id",
            get(articles::show).put(articles::update).delete(articles::destroy),
        )
}

// Photos are created and removed only through their article
fn photo_routes() -> Router<AppState> {
    use handlers::photos;

    Router::new()
        .route("/photos", get(photos::list))
        .route("/photos/:id", get(photos::show))
}
