//! Test utilities: in-memory repositories behind the same traits as the
//! Postgres ones, a temp-dir blob store, and a `TestApp` that drives the
//! real router without a network listener.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::app::{app, AppState};
use crate::config::AppConfig;
use crate::database::models::{
    Article, ArticleInput, Author, AuthorInput, Category, CategoryInput, NewPhoto, Photo,
};
use crate::database::{ArticleRepository, DatabaseError, HealthCheck, Model, Repository};
use crate::storage::{BlobStore, LocalBlobStore};

/// Builds rows the way the database would: fresh timestamps on insert,
/// `created_at` kept and `updated_at` bumped on update.
pub trait MemoryModel: Model + Clone + Sync {
    fn id(&self) -> i64;
    fn build(id: i64, input: &Self::Input, existing: Option<&Self>) -> Self;
}

impl MemoryModel for Category {
    fn id(&self) -> i64 {
        self.id
    }

    fn build(id: i64, input: &CategoryInput, existing: Option<&Self>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: input.name.clone(),
            created_at: existing.map(|e| e.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

impl MemoryModel for Author {
    fn id(&self) -> i64 {
        self.id
    }

    fn build(id: i64, input: &AuthorInput, existing: Option<&Self>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: input.name.clone(),
            email: input.email.clone(),
            bio: input.bio.clone(),
            created_at: existing.map(|e| e.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

impl MemoryModel for Photo {
    fn id(&self) -> i64 {
        self.id
    }

    fn build(id: i64, input: &NewPhoto, existing: Option<&Self>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: input.name.clone(),
            url: input.url.clone(),
            created_at: existing.map(|e| e.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

impl MemoryModel for Article {
    fn id(&self) -> i64 {
        self.id
    }

    fn build(id: i64, input: &ArticleInput, existing: Option<&Self>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: input.title.clone(),
            content: input.content.clone(),
            category_id: input.category_id,
            author_id: input.author_id,
            photo_id: existing.and_then(|e| e.photo_id),
            created_at: existing.map(|e| e.created_at).unwrap_or(now),
            updated_at: now,
        }
    }
}

pub struct MemoryTable<M> {
    rows: Mutex<BTreeMap<i64, M>>,
    next_id: AtomicI64,
}

impl<M: MemoryModel> MemoryTable<M> {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn create(&self, input: &M::Input) -> M {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let row = M::build(id, input, None);
        self.rows.lock().unwrap().insert(id, row.clone());
        row
    }

    fn replace(&self, row: M) {
        self.rows.lock().unwrap().insert(row.id(), row);
    }

    fn get(&self, id: i64) -> Option<M> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    fn remove(&self, id: i64) -> Option<M> {
        self.rows.lock().unwrap().remove(&id)
    }

    fn rows(&self) -> Vec<M> {
        self.rows.lock().unwrap().values().cloned().collect()
    }
}

fn not_found<M: Model>(id: i64) -> DatabaseError {
    DatabaseError::NotFound(format!("{} {}", M::TABLE, id))
}

#[async_trait]
impl<M: MemoryModel> Repository<M> for MemoryTable<M> {
    async fn select_all(&self) -> Result<Vec<M>, DatabaseError> {
        Ok(self.rows())
    }

    async fn select_404(&self, id: i64) -> Result<M, DatabaseError> {
        self.get(id).ok_or_else(|| not_found::<M>(id))
    }

    async fn select_ids(&self, ids: &[i64]) -> Result<Vec<M>, DatabaseError> {
        Ok(ids.iter().filter_map(|id| self.get(*id)).collect())
    }

    async fn insert(&self, input: &M::Input) -> Result<M, DatabaseError> {
        Ok(self.create(input))
    }

    async fn update(&self, id: i64, input: &M::Input) -> Result<M, DatabaseError> {
        let existing = self.get(id).ok_or_else(|| not_found::<M>(id))?;
        let row = M::build(id, input, Some(&existing));
        self.replace(row.clone());
        Ok(row)
    }

    async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        self.remove(id).map(|_| ()).ok_or_else(|| not_found::<M>(id))
    }
}

/// Article table sharing the photo table, with a switch that makes every
/// write fail so compensation paths can be exercised.
pub struct MemoryArticles {
    rows: MemoryTable<Article>,
    photos: Arc<MemoryTable<Photo>>,
    fail_writes: AtomicBool,
}

impl MemoryArticles {
    pub fn new(photos: Arc<MemoryTable<Photo>>) -> Self {
        Self {
            rows: MemoryTable::new(),
            photos,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), DatabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::ConnectionError("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository<Article> for MemoryArticles {
    async fn select_all(&self) -> Result<Vec<Article>, DatabaseError> {
        self.rows.select_all().await
    }

    async fn select_404(&self, id: i64) -> Result<Article, DatabaseError> {
        self.rows.select_404(id).await
    }

    async fn select_ids(&self, ids: &[i64]) -> Result<Vec<Article>, DatabaseError> {
        self.rows.select_ids(ids).await
    }

    async fn insert(&self, input: &ArticleInput) -> Result<Article, DatabaseError> {
        self.check_writable()?;
        self.rows.insert(input).await
    }

    async fn update(&self, id: i64, input: &ArticleInput) -> Result<Article, DatabaseError> {
        self.check_writable()?;
        self.rows.update(id, input).await
    }

    async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        self.check_writable()?;
        self.rows.delete(id).await
    }
}

#[async_trait]
impl ArticleRepository for MemoryArticles {
    async fn insert_with_photo(
        &self,
        input: &ArticleInput,
        photo: Option<&NewPhoto>,
    ) -> Result<(Article, Option<Photo>), DatabaseError> {
        self.check_writable()?;
        let photo = photo.map(|new_photo| self.photos.create(new_photo));
        let mut article = self.rows.create(input);
        article.photo_id = photo.as_ref().map(|p| p.id);
        self.rows.replace(article.clone());
        Ok((article, photo))
    }

    async fn update_with_photo(
        &self,
        id: i64,
        input: &ArticleInput,
        photo: &NewPhoto,
    ) -> Result<(Article, Photo, Option<Photo>), DatabaseError> {
        self.check_writable()?;
        let existing = self.rows.get(id).ok_or_else(|| not_found::<Article>(id))?;
        let photo = self.photos.create(photo);

        let mut article = Article::build(id, input, Some(&existing));
        article.photo_id = Some(photo.id);
        self.rows.replace(article.clone());

        let replaced = existing.photo_id.and_then(|old| self.photos.remove(old));
        Ok((article, photo, replaced))
    }

    async fn delete_with_photo(&self, id: i64) -> Result<Option<Photo>, DatabaseError> {
        self.check_writable()?;
        let article = self.rows.remove(id).ok_or_else(|| not_found::<Article>(id))?;
        Ok(article.photo_id.and_then(|photo_id| self.photos.remove(photo_id)))
    }

    async fn count_by_category(&self, category_id: i64) -> Result<i64, DatabaseError> {
        Ok(self.rows.rows().iter().filter(|a| a.category_id == category_id).count() as i64)
    }

    async fn count_by_author(&self, author_id: i64) -> Result<i64, DatabaseError> {
        Ok(self.rows.rows().iter().filter(|a| a.author_id == author_id).count() as i64)
    }
}

pub struct MemoryHealth {
    healthy: AtomicBool,
}

impl MemoryHealth {
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl HealthCheck for MemoryHealth {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatabaseError::ConnectionError("connection refused".to_string()))
        }
    }
}

/// One multipart/form-data part
pub struct Part {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

impl Part {
    pub fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            file_name: None,
            content_type: None,
            data: value.as_bytes().to_vec(),
        }
    }

    pub fn file(name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            file_name: Some(file_name.to_string()),
            content_type: Some(content_type.to_string()),
            data: data.to_vec(),
        }
    }
}

const BOUNDARY: &str = "cms-test-boundary";

fn multipart_body(parts: Vec<Part>) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(file_name) = &part.file_name {
            disposition.push_str(&format!("; filename=\"{}\"", file_name));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = &part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// The full router over in-memory repositories and a temp-dir blob store
pub struct TestApp {
    pub state: AppState,
    pub articles: Arc<MemoryArticles>,
    pub health: Arc<MemoryHealth>,
    blobs: Arc<LocalBlobStore>,
    _storage: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::development())
    }

    pub fn with_config(mut config: AppConfig) -> Self {
        let storage = TempDir::new().expect("temp storage dir");
        config.storage.root = storage.path().to_path_buf();
        config.api.enable_request_logging = false;

        let photos = Arc::new(MemoryTable::<Photo>::new());
        let articles = Arc::new(MemoryArticles::new(photos.clone()));
        let health = Arc::new(MemoryHealth {
            healthy: AtomicBool::new(true),
        });
        let blobs = Arc::new(LocalBlobStore::new(storage.path()));

        let state = AppState {
            categories: Arc::new(MemoryTable::<Category>::new()),
            authors: Arc::new(MemoryTable::<Author>::new()),
            photos,
            articles: articles.clone(),
            blobs: blobs.clone(),
            health: health.clone(),
            config: Arc::new(config),
        };

        Self {
            state,
            articles,
            health,
            blobs,
            _storage: storage,
        }
    }

    pub fn router(&self) -> Router {
        app(self.state.clone())
    }

    /// Inserts one category and one author, returning their ids
    pub async fn seed_references(&self) -> (i64, i64) {
        let category = self
            .state
            .categories
            .insert(&CategoryInput {
                name: "News".to_string(),
            })
            .await
            .unwrap();
        let author = self
            .state
            .authors
            .insert(&AuthorInput {
                name: "Grace".to_string(),
                email: "grace@example.com".to_string(),
                bio: None,
            })
            .await
            .unwrap();
        (category.id, author.id)
    }

    pub async fn send_raw(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, bytes.to_vec())
    }

    /// Sends a request; an empty body comes back as `Value::Null`, a
    /// non-JSON body as a string.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, _, bytes) = self.send_raw(request).await;
        if bytes.is_empty() {
            return (status, Value::Null);
        }
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_bytes(&self, uri: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
        self.send_raw(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_with_token(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        let request = Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json(Method::POST, uri, body).await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json(Method::PUT, uri, body).await
    }

    async fn send_json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_raw(
        &self,
        uri: &str,
        content_type: &str,
        body: &str,
    ) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::delete(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn send_multipart(
        &self,
        method: &str,
        uri: &str,
        parts: Vec<Part>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }

    pub async fn blob_exists(&self, path: &str) -> bool {
        self.blobs.exists(path).await.unwrap()
    }

    pub async fn read_blob(&self, path: &str) -> Vec<u8> {
        self.blobs.read(path).await.unwrap()
    }

    /// Where a stored path lives on disk
    pub fn blob_file(&self, path: &str) -> PathBuf {
        self.blobs.base_path().join(path)
    }

    /// Files currently in the blob store
    pub fn blob_count(&self) -> usize {
        count_files(self.blobs.base_path())
    }
}

fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}
