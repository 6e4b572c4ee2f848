use async_trait::async_trait;

use super::schema::CollectionSchema;
use crate::errors::QueryError;
use crate::plan::QueryPlan;

/// Field and relation names valid for each collection.
pub trait CollectionMetadata: Send + Sync {
    fn schema(&self, collection: &str) -> Option<&CollectionSchema>;

    /// Every declared relation of `collection`, used to expand `loadAll`.
    /// Unknown collections have none.
    fn relation_names(&self, collection: &str) -> Vec<String> {
        self.schema(collection)
            .map(|s| s.relations.iter().map(|r| r.name.clone()).collect())
            .unwrap_or_default()
    }

    fn default_search_fields(&self, collection: &str) -> Vec<String> {
        self.schema(collection)
            .map(|s| s.search_fields.clone())
            .unwrap_or_default()
    }
}

/// Runs a compiled [`QueryPlan`] against a collection.
///
/// Implementations return the requested page of rows together with the total
/// number of rows matching the plan's predicate (ignoring `skip`/`take`).
/// References the collection does not have must fail with
/// [`QueryError::InvalidQuery`] before anything is sent to storage.
///
/// The returned future may be dropped at any await point when the request
/// times out or is cancelled.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    type Row: Send;

    fn metadata(&self) -> &dyn CollectionMetadata;

    async fn find_and_count(
        &self,
        collection: &str,
        plan: &QueryPlan,
    ) -> Result<(Vec<Self::Row>, u64), QueryError>;
}
