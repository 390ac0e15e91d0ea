use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::manager::DatabaseError;
use crate::database::models::{Article, ArticleInput, NewPhoto, Photo};
use crate::database::repository::{ArticleRepository, Model, PgRepository, Repository};

/// Postgres article repository; plain CRUD is delegated to `PgRepository`,
/// the photo flows run in explicit transactions.
pub struct PgArticleRepository {
    pool: PgPool,
    rows: PgRepository<Article>,
}

impl PgArticleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            rows: PgRepository::new(pool.clone()),
            pool,
        }
    }
}

const INSERT_ARTICLE: &str = "INSERT INTO articles \
     (title, content, category_id, author_id, photo_id) \
     VALUES ($1, $2, $3, $4, $5) RETURNING *";

const UPDATE_ARTICLE_WITH_PHOTO: &str = "UPDATE articles \
     SET title = $1, content = $2, category_id = $3, author_id = $4, photo_id = $5, \
     updated_at = now() \
     WHERE id = $6 RETURNING *";

const LOCK_ARTICLE_PHOTO: &str = "SELECT photo_id FROM articles WHERE id = $1 FOR UPDATE";

const DELETE_ARTICLE: &str = "DELETE FROM articles WHERE id = $1 RETURNING photo_id";

#[async_trait]
impl Repository<Article> for PgArticleRepository {
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
        self.rows.insert(input).await
    }

    async fn update(&self, id: i64, input: &ArticleInput) -> Result<Article, DatabaseError> {
        self.rows.update(id, input).await
    }

    async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        self.rows.delete(id).await
    }
}

#[async_trait]
impl ArticleRepository for PgArticleRepository {
    async fn insert_with_photo(
        &self,
        input: &ArticleInput,
        photo: Option<&NewPhoto>,
    ) -> Result<(Article, Option<Photo>), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let photo = match photo {
            Some(new_photo) => {
                let sql = PgRepository::<Photo>::insert_sql();
                let row = Photo::bind_input(new_photo, sqlx::query_as::<_, Photo>(&sql))
                    .fetch_one(&mut *tx)
                    .await?;
                Some(row)
            }
            None => None,
        };

        let article = Article::bind_input(input, sqlx::query_as::<_, Article>(INSERT_ARTICLE))
            .bind(photo.as_ref().map(|p| p.id))
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((article, photo))
    }

    async fn update_with_photo(
        &self,
        id: i64,
        input: &ArticleInput,
        photo: &NewPhoto,
    ) -> Result<(Article, Photo, Option<Photo>), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let previous_photo_id = sqlx::query_scalar::<_, Option<i64>>(LOCK_ARTICLE_PHOTO)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("articles {} not found", id)))?;

        let sql = PgRepository::<Photo>::insert_sql();
        let new_photo = Photo::bind_input(photo, sqlx::query_as::<_, Photo>(&sql))
            .fetch_one(&mut *tx)
            .await?;

        let query = sqlx::query_as::<_, Article>(UPDATE_ARTICLE_WITH_PHOTO);
        let article = Article::bind_input(input, query)
            .bind(new_photo.id)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        let old_photo = match previous_photo_id {
            Some(photo_id) => {
                sqlx::query_as::<_, Photo>("DELETE FROM photos WHERE id = $1 RETURNING *")
                    .bind(photo_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };

        tx.commit().await?;
        Ok((article, new_photo, old_photo))
    }

    async fn delete_with_photo(&self, id: i64) -> Result<Option<Photo>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let photo_id: Option<i64> = sqlx::query_scalar::<_, Option<i64>>(DELETE_ARTICLE)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("articles {} not found", id)))?;

        let photo = match photo_id {
            Some(photo_id) => {
                sqlx::query_as::<_, Photo>("DELETE FROM photos WHERE id = $1 RETURNING *")
                    .bind(photo_id)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };

        tx.commit().await?;
        Ok(photo)
    }

    async fn count_by_category(&self, category_id: i64) -> Result<i64, DatabaseError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles WHERE category_id = $1")
            .bind(category_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn count_by_author(&self, author_id: i64) -> Result<i64, DatabaseError> {
        Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?)
    }
}
