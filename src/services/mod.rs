pub mod article_service;

pub use article_service::ArticleService;

use thiserror::Error;

use crate::database::DatabaseError;
use crate::storage::StorageError;
use crate::validation::FieldErrors;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(FieldErrors),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
