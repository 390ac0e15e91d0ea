// handlers/mod.rs - REST handlers, one module per resource
//
// Public:    /, /health
// Resources: /categories, /authors, /articles, /photos (bearer-guarded when
//            a JWT secret is configured)

pub mod articles;
pub mod authors;
pub mod categories;
pub mod extract;
pub mod photos;
pub mod system;
