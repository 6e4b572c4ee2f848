// Execution seam: what the compiler needs from storage

pub mod schema;
pub mod traits;

// Re-export commonly used items
pub use schema::{CollectionSchema, RelationDef, RelationKind, SchemaRegistry};
pub use traits::{CollectionMetadata, QueryExecutor};
