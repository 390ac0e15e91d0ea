use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Photo {
    pub id: i64,
    /// Generated unique file name, extension preserved from the upload
    pub name: String,
    /// Blob store path, e.g. `images/articles/<name>`
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Photo row to insert once its blob has been written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub name: String,
    pub url: String,
}
