pub mod categories;
pub mod fields;
pub mod regions;
pub mod schema;

pub use categories::{CategoryNode, CategorySource, CategorySourceError, CategoryTree, path_slug};
pub use fields::CategoryField;
pub use schema::{has_dynamic_fields, resolve};
