use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::api::resources::{ArticleResource, AuthorResource, CategoryResource, PhotoResource};
use crate::app::AppState;
use crate::database::models::{Article, ArticleInput, Author, Category, NewPhoto, Photo};
use crate::database::{ArticleRepository, DatabaseError, Repository};
use crate::storage::{self, BlobStore, StorageError};
use crate::types::Include;
use crate::validation::{FieldErrors, ValidUpload};

use super::ServiceError;

/// Orchestrates article writes that span the blob store and several tables,
/// and resolves eager-loaded relations for responses.
///
/// Write ordering:
/// - create/update with a file: blob first, then rows in one transaction;
///   the blob is removed again if the transaction fails.
/// - destroy: blob first (a missing file is tolerated), then rows in one
///   transaction. Any other storage failure aborts before rows are touched.
pub struct ArticleService {
    articles: Arc<dyn ArticleRepository>,
    categories: Arc<dyn Repository<Category>>,
    authors: Arc<dyn Repository<Author>>,
    photos: Arc<dyn Repository<Photo>>,
    blobs: Arc<dyn BlobStore>,
    photo_dir: String,
}

impl ArticleService {
    pub fn new(state: &AppState) -> Self {
        Self {
            articles: state.articles.clone(),
            categories: state.categories.clone(),
            authors: state.authors.clone(),
            photos: state.photos.clone(),
            blobs: state.blobs.clone(),
            photo_dir: state.config.storage.article_photo_dir.clone(),
        }
    }

    pub async fn list(&self, include: Include) -> Result<Vec<ArticleResource>, ServiceError> {
        let articles = self.articles.select_all().await?;
        self.with_relations(articles, include).await
    }

    pub async fn show(&self, id: i64, include: Include) -> Result<ArticleResource, ServiceError> {
        let article = self.articles.select_404(id).await?;
        self.single(article, include).await
    }

    pub async fn create(
        &self,
        input: ArticleInput,
        photo: Option<ValidUpload>,
    ) -> Result<ArticleResource, ServiceError> {
        self.check_references(&input).await?;

        let new_photo = match photo {
            Some(upload) => Some(self.store_photo(&upload).await?),
            None => None,
        };

        let inserted = self.articles.insert_with_photo(&input, new_photo.as_ref()).await;
        let (article, _) = match inserted {
            Ok(created) => created,
            Err(e) => {
                if let Some(new_photo) = &new_photo {
                    self.discard_blob(&new_photo.url).await;
                }
                return Err(e.into());
            }
        };

        tracing::info!("Created article {} (photo: {:?})", article.id, article.photo_id);
        self.single(article, Include::all()).await
    }

    /// Full replace of the article's fields. With a file the photo is
    /// swapped for the new one, without a file the current photo stays.
    pub async fn update(
        &self,
        id: i64,
        input: ArticleInput,
        photo: Option<ValidUpload>,
    ) -> Result<ArticleResource, ServiceError> {
        self.articles.select_404(id).await?;
        self.check_references(&input).await?;

        let article = match photo {
            None => self.articles.update(id, &input).await?,
            Some(upload) => {
                let new_photo = self.store_photo(&upload).await?;
                match self.articles.update_with_photo(id, &input, &new_photo).await {
                    Ok((article, _, replaced)) => {
                        if let Some(replaced) = replaced {
                            self.discard_blob(&replaced.url).await;
                        }
                        article
                    }
                    Err(e) => {
                        self.discard_blob(&new_photo.url).await;
                        return Err(e.into());
                    }
                }
            }
        };

        tracing::info!("Updated article {}", article.id);
        self.single(article, Include::all()).await
    }

    pub async fn destroy(&self, id: i64) -> Result<(), ServiceError> {
        let article = self.articles.select_404(id).await?;

        if let Some(photo_id) = article.photo_id {
            match self.photos.select_404(photo_id).await {
                Ok(photo) => self.remove_blob(&photo.url).await?,
                Err(DatabaseError::NotFound(_)) => {
                    tracing::warn!("Article {} points at missing photo {}", id, photo_id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let removed = self.articles.delete_with_photo(id).await?;
        tracing::info!(
            "Deleted article {} (photo: {:?})",
            id,
            removed.map(|photo| photo.id)
        );
        Ok(())
    }

    async fn check_references(&self, input: &ArticleInput) -> Result<(), ServiceError> {
        let (category, author) = futures::join!(
            self.categories.select_404(input.category_id),
            self.authors.select_404(input.author_id)
        );

        let mut errors = FieldErrors::new();
        for (field, result) in [
            ("category_id", category.map(|_| ())),
            ("author_id", author.map(|_| ())),
        ] {
            match result {
                Ok(()) => {}
                Err(DatabaseError::NotFound(_)) => {
                    errors.insert(
                        field.to_string(),
                        format!("The selected {} is invalid.", field.replace('_', " ")),
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(errors))
        }
    }

    async fn store_photo(&self, upload: &ValidUpload) -> Result<NewPhoto, ServiceError> {
        let name = storage::unique_name(&upload.extension);
        let url = storage::blob_path(&self.photo_dir, &name);
        self.blobs.put(&url, &upload.bytes).await?;
        Ok(NewPhoto { name, url })
    }

    /// Delete a blob the rows depend on; only a missing file is tolerated
    async fn remove_blob(&self, path: &str) -> Result<(), StorageError> {
        match self.blobs.delete(path).await {
            Ok(()) => Ok(()),
            Err(StorageError::NotFound(_)) => {
                tracing::warn!("Photo blob {} already missing", path);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort cleanup of a blob no row points at any more
    async fn discard_blob(&self, path: &str) {
        if let Err(e) = self.remove_blob(path).await {
            tracing::error!("Failed to remove orphaned blob {}: {}", path, e);
        }
    }

    async fn single(
        &self,
        article: Article,
        include: Include,
    ) -> Result<ArticleResource, ServiceError> {
        let mut resources = self.with_relations(vec![article], include).await?;
        resources
            .pop()
            .ok_or_else(|| ServiceError::Database(DatabaseError::NotFound("article".to_string())))
    }

    /// Resolve the included relations with one follow-up fetch per relation
    async fn with_relations(
        &self,
        articles: Vec<Article>,
        include: Include,
    ) -> Result<Vec<ArticleResource>, ServiceError> {
        let category_ids = unique_ids(articles.iter().map(|a| Some(a.category_id)));
        let author_ids = unique_ids(articles.iter().map(|a| Some(a.author_id)));
        let photo_ids = unique_ids(articles.iter().map(|a| a.photo_id));

        let (categories, authors, photos) = futures::try_join!(
            fetch_if(include.category, self.categories.as_ref(), &category_ids),
            fetch_if(include.author, self.authors.as_ref(), &author_ids),
            fetch_if(include.photo, self.photos.as_ref(), &photo_ids),
        )?;

        let categories: HashMap<i64, Category> =
            categories.into_iter().map(|c| (c.id, c)).collect();
        let authors: HashMap<i64, Author> = authors.into_iter().map(|a| (a.id, a)).collect();
        let photos: HashMap<i64, Photo> = photos.into_iter().map(|p| (p.id, p)).collect();

        Ok(articles
            .into_iter()
            .map(|article| {
                let category = include.category.then(|| {
                    categories
                        .get(&article.category_id)
                        .cloned()
                        .map(CategoryResource::from)
                });
                let author = include
                    .author
                    .then(|| authors.get(&article.author_id).cloned().map(AuthorResource::from));
                let photo = include.photo.then(|| {
                    article
                        .photo_id
                        .and_then(|id| photos.get(&id).cloned())
                        .map(PhotoResource::from)
                });

                let mut resource = ArticleResource::from(article);
                resource.category = category;
                resource.author = author;
                resource.photo = photo;
                resource
            })
            .collect())
    }
}

fn unique_ids(ids: impl Iterator<Item = Option<i64>>) -> Vec<i64> {
    ids.flatten().collect::<BTreeSet<_>>().into_iter().collect()
}

async fn fetch_if<M>(
    wanted: bool,
    repository: &dyn Repository<M>,
    ids: &[i64],
) -> Result<Vec<M>, DatabaseError>
where
    M: crate::database::Model,
{
    if !wanted || ids.is_empty() {
        return Ok(vec![]);
    }
    repository.select_ids(ids).await
}
