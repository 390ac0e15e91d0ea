use async_trait::async_trait;
use sqlx::{
    self,
    postgres::{PgArguments, PgRow},
    query::QueryAs,
    FromRow, PgPool, Postgres,
};

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Article, ArticleInput, Author, AuthorInput, Category, CategoryInput, NewPhoto, Photo,
};

type PgQueryAs<'q, T> = QueryAs<'q, Postgres, T, PgArguments>;

/// A table-backed entity: knows its table, its writable columns, and how to
/// bind its validated input to an INSERT or UPDATE statement.
pub trait Model: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static {
    type Input: Send + Sync;

    const TABLE: &'static str;
    /// Writable columns, in the order `bind_input` binds them
    const COLUMNS: &'static [&'static str];

    fn bind_input<'q>(input: &'q Self::Input, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self>;
}

impl Model for Category {
    type Input = CategoryInput;

    const TABLE: &'static str = "categories";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn bind_input<'q>(input: &'q CategoryInput, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query.bind(input.name.as_str())
    }
}

impl Model for Author {
    type Input = AuthorInput;

    const TABLE: &'static str = "authors";
    const COLUMNS: &'static [&'static str] = &["name", "email", "bio"];

    fn bind_input<'q>(input: &'q AuthorInput, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(input.name.as_str())
            .bind(input.email.as_str())
            .bind(input.bio.as_deref())
    }
}

impl Model for Photo {
    type Input = NewPhoto;

    const TABLE: &'static str = "photos";
    const COLUMNS: &'static [&'static str] = &["name", "url"];

    fn bind_input<'q>(input: &'q NewPhoto, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query.bind(input.name.as_str()).bind(input.url.as_str())
    }
}

impl Model for Article {
    type Input = ArticleInput;

    const TABLE: &'static str = "articles";
    const COLUMNS: &'static [&'static str] = &["title", "content", "category_id", "author_id"];

    fn bind_input<'q>(input: &'q ArticleInput, query: PgQueryAs<'q, Self>) -> PgQueryAs<'q, Self> {
        query
            .bind(input.title.as_str())
            .bind(input.content.as_str())
            .bind(input.category_id)
            .bind(input.author_id)
    }
}

/// CRUD over one entity type. Lookups by id fail with
/// `DatabaseError::NotFound` rather than returning `None`.
#[async_trait]
pub trait Repository<M: Model>: Send + Sync {
    async fn select_all(&self) -> Result<Vec<M>, DatabaseError>;

    async fn select_404(&self, id: i64) -> Result<M, DatabaseError>;

    async fn select_ids(&self, ids: &[i64]) -> Result<Vec<M>, DatabaseError>;

    async fn insert(&self, input: &M::Input) -> Result<M, DatabaseError>;

    /// Overwrites every writable column from `input`
    async fn update(&self, id: i64, input: &M::Input) -> Result<M, DatabaseError>;

    async fn delete(&self, id: i64) -> Result<(), DatabaseError>;
}

/// Article persistence including the multi-row photo flows, each of which
/// runs inside a single transaction.
#[async_trait]
pub trait ArticleRepository: Repository<Article> {
    /// Inserts the photo row (if any) and the article row linked to it
    async fn insert_with_photo(
        &self,
        input: &ArticleInput,
        photo: Option<&NewPhoto>,
    ) -> Result<(Article, Option<Photo>), DatabaseError>;

    /// Full-replace update that also swaps the article's photo for a new
    /// one. Returns the updated article, the new photo, and the photo row
    /// that was unlinked and deleted.
    async fn update_with_photo(
        &self,
        id: i64,
        input: &ArticleInput,
        photo: &NewPhoto,
    ) -> Result<(Article, Photo, Option<Photo>), DatabaseError>;

    /// Deletes the article and its photo row; returns the deleted photo
    async fn delete_with_photo(&self, id: i64) -> Result<Option<Photo>, DatabaseError>;

    async fn count_by_category(&self, category_id: i64) -> Result<i64, DatabaseError>;

    async fn count_by_author(&self, author_id: i64) -> Result<i64, DatabaseError>;
}

/// Postgres repository for any `Model`
pub struct PgRepository<M> {
    pool: PgPool,
    _phantom: std::marker::PhantomData<fn() -> M>,
}

impl<M: Model> PgRepository<M> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _phantom: std::marker::PhantomData,
        }
    }

    pub(crate) fn insert_sql() -> String {
        let placeholders: Vec<String> = (1..=M::COLUMNS.len()).map(|i| format!("${}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            M::TABLE,
            M::COLUMNS.join(", "),
            placeholders.join(", ")
        )
    }

    pub(crate) fn update_sql() -> String {
        let assignments: Vec<String> = M::COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ${}", column, i + 1))
            .collect();
        format!(
            "UPDATE {} SET {}, updated_at = now() WHERE id = ${} RETURNING *",
            M::TABLE,
            assignments.join(", "),
            M::COLUMNS.len() + 1
        )
    }
}

#[async_trait]
impl<M: Model> Repository<M> for PgRepository<M> {
    async fn select_all(&self) -> Result<Vec<M>, DatabaseError> {
        let sql = format!("SELECT * FROM {} ORDER BY id", M::TABLE);
        Ok(sqlx::query_as::<_, M>(&sql).fetch_all(&self.pool).await?)
    }

    async fn select_404(&self, id: i64) -> Result<M, DatabaseError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", M::TABLE);
        sqlx::query_as::<_, M>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} not found", M::TABLE, id)))
    }

    async fn select_ids(&self, ids: &[i64]) -> Result<Vec<M>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!("SELECT * FROM {} WHERE id = ANY($1) ORDER BY id", M::TABLE);
        Ok(sqlx::query_as::<_, M>(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert(&self, input: &M::Input) -> Result<M, DatabaseError> {
        let sql = Self::insert_sql();
        let query = M::bind_input(input, sqlx::query_as::<_, M>(&sql));
        Ok(query.fetch_one(&self.pool).await?)
    }

    async fn update(&self, id: i64, input: &M::Input) -> Result<M, DatabaseError> {
        let sql = Self::update_sql();
        let query = M::bind_input(input, sqlx::query_as::<_, M>(&sql)).bind(id);
        query
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} not found", M::TABLE, id)))
    }

    async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", M::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("{} {} not found", M::TABLE, id)));
        }
        Ok(())
    }
}
