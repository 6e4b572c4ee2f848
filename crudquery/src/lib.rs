//! Compile untrusted list requests into safe, paginated queries.
//!
//! A request ([`ListQuery`]) carries a filter tree, a search term, sort keys,
//! a projection, relation paths and a pagination window. [`QueryCompiler`]
//! validates all of it and produces a [`QueryPlan`]; a [`QueryExecutor`] runs
//! the plan and [`Paginator`] wraps the rows into a [`PaginatedResult`].
//!
//! ```ignore
//! let registry = SchemaRegistry::new().with(
//!     CollectionSchema::new("posts", "id")
//!         .fields(&["title", "status", "author_id"])
//!         .searchable(&["title"])
//!         .belongs_to("author", "authors", "author_id", "id"),
//! );
//! let paginator = Paginator::new(SeaOrmExecutor::new(db, registry), CompilerConfig::default());
//!
//! async fn list(State(paginator): State<Arc<Paginator<SeaOrmExecutor>>>, Query(query): Query<ListQuery>)
//!     -> Result<PaginatedResult<JsonValue>, QueryError>
//! {
//!     paginator.paginate("posts", &query, &PaginateOptions::default()).await
//! }
//! ```

pub mod config;
pub mod core;
pub mod database;
pub mod errors;
pub mod filtering;
pub mod models;
pub mod pagination;
pub mod plan;
pub mod validation;

pub use config::{CompilerConfig, MalformedPolicy};
pub use crate::core::{
    CollectionMetadata, CollectionSchema, QueryExecutor, RelationDef, RelationKind, SchemaRegistry,
};
pub use database::SeaOrmExecutor;
pub use errors::QueryError;
pub use filtering::{
    Comparator, FieldPath, FilterCondition, FilterGroup, LogicalOperator, OperatorKind, Predicate,
    SortDirection, SortKey,
};
pub use models::{FilterInput, ListQuery};
pub use pagination::{PaginateOptions, PaginatedResult, PaginationMeta, PaginationSpec, Paginator};
pub use plan::{QueryCompiler, QueryPlan, merge};
pub use validation::{ValidationError, ValidationErrors};

pub use serde_with;
