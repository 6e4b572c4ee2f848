//! # Query Compilation
//!
//! Turns the untrusted pieces of a list request into typed, engine-ready parts.
//! Each compiler runs independently; [`crate::plan`] combines their output.
//!
//! ## Main Components
//!
//! - **[`operators`]**: the closed operator table (`eq`, `between`, `contains`, ...)
//! - **[`conditions`]**: recursive [`FilterGroup`] → [`Predicate`] compilation
//! - **[`search`]**: free-text term → OR of case-insensitive substring matches
//! - **[`sort`]**: `sortBy`/`sortOrder` → ordered [`SortKey`] list
//! - **[`projection`]** and **[`relations`]**: returned columns and expanded relations
//! - **[`predicate`]**: the boolean algebra everything compiles into
//!
//! ## Filter Examples
//!
//! ```rust,ignore
//! // Simple conjunction
//! GET /posts?filter={"conditions":[{"field":"status","operator":"eq","value":"published"},
//!                                  {"field":"views","operator":"gte","value":100}]}
//!
//! // Nested OR group
//! GET /posts?filter={"conditions":[{"field":"status","operator":"eq","value":"published"}],
//!                    "groups":[{"operator":"or","conditions":[
//!                        {"field":"views","operator":"between","value":[10,20]},
//!                        {"field":"author.name","operator":"startsWith","value":"Ann"}]}]}
//!
//! // Search, multi-column sort and relation expansion
//! GET /posts?search=rust&searchFields=title,body&sortBy=author.name,views&sortOrder=ASC,DESC
//!     &relations=author,comments
//! ```
//!
//! ## Dropped input
//!
//! Conditions with an unsupported operator, a value of the wrong shape or an
//! invalid field name are left out and logged at `warn`. Set
//! [`MalformedPolicy::Reject`](crate::config::MalformedPolicy) to fail the
//! request instead. Nesting and size limits fail the request under both policies.

pub mod conditions;
pub mod operators;
pub mod path;
pub mod predicate;
pub mod projection;
pub mod relations;
pub mod search;
pub mod sort;

// Re-export commonly used items
pub use conditions::{FilterCompiler, FilterCondition, FilterGroup, LogicalOperator};
pub use operators::{Arity, LikeShape, OperatorKind};
pub use path::FieldPath;
pub use predicate::{Comparator, Comparison, Predicate};
pub use projection::compile_projection;
pub use relations::{RelationSpec, expand_relations};
pub use search::{SearchCompiler, SearchSpec};
pub use sort::{SortCompiler, SortDirection, SortKey};
