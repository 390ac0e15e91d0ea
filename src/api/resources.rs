//! Wire representations of the persisted entities.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::models::{Article, Author, Category, Photo};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryResource {
    pub id: i64,
    pub name: String,
}

impl From<Category> for CategoryResource {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorResource {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
}

impl From<Author> for AuthorResource {
    fn from(author: Author) -> Self {
        Self {
            id: author.id,
            name: author.name,
            email: author.email,
            bio: author.bio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoResource {
    pub id: i64,
    pub name: String,
    pub url: String,
}

impl From<Photo> for PhotoResource {
    fn from(photo: Photo) -> Self {
        Self {
            id: photo.id,
            name: photo.name,
            url: photo.url,
        }
    }
}

/// Article with whichever relations were loaded. The outer `Option` of a
/// relation is "was it included", the inner one is "does it exist", so an
/// included article without a photo serializes `"photo": null` while an
/// excluded relation is left out of the object entirely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleResource {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category_id: i64,
    pub author_id: i64,
    pub photo_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Option<CategoryResource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Option<AuthorResource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<Option<PhotoResource>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Article> for ArticleResource {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            title: article.title,
            content: article.content,
            category_id: article.category_id,
            author_id: article.author_id,
            photo_id: article.photo_id,
            category: None,
            author: None,
            photo: None,
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}

pub fn collection<T, R>(rows: Vec<T>) -> Vec<R>
where
    R: From<T>,
{
    rows.into_iter().map(R::from).collect()
}
