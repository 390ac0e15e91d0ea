pub mod articles;
pub mod manager;
pub mod models;
pub mod repository;

pub use articles::PgArticleRepository;
pub use manager::{Database, DatabaseError, HealthCheck};
pub use repository::{ArticleRepository, Model, PgRepository, Repository};
