pub mod article;
pub mod author;
pub mod category;
pub mod photo;

pub use article::{Article, ArticleInput};
pub use author::{Author, AuthorInput};
pub use category::{Category, CategoryInput};
pub use photo::{NewPhoto, Photo};
