//! Database module: row models and SQL repositories for the content store.
//!
//! - `model`: rows read back from the `videos` and `articles` tables.
//! - `repo`: SQL-only functions (pool setup, migrations, insert-if-absent).
//!
//! Higher layers go through `crate::persist`; this module only knows SQL.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{StoredArticle, StoredVideo};
