pub mod resources;

pub use resources::{ArticleResource, AuthorResource, CategoryResource, PhotoResource};
