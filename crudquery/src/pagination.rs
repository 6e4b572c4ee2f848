//! # Pagination
//!
//! [`Paginator`] is the entry point of the crate: it compiles a [`ListQuery`],
//! runs the plan through a [`QueryExecutor`] under a deadline, and wraps the
//! rows in a [`PaginatedResult`] envelope:
//!
//! ```json
//! {"data": [...],
//!  "meta": {"currentPage": 2, "items": 10, "totalItems": 25,
//!           "totalPages": 3, "hasNextPage": true, "hasPreviousPage": true}}
//! ```
//!
//! `items` is the requested page size, not the number of rows returned.
//!
//! ## Consistency
//!
//! Rows and the total are read by one `find_and_count` call, so both see the
//! same predicate. Whether they also share a snapshot is up to the executor;
//! the sea-orm backend reads both inside one transaction.
//!
//! ## Timeouts and cancellation
//!
//! The round-trip is bounded by [`PaginateOptions::timeout`] (or the configured
//! default) and fails with `ExecutionTimeout`. A cancelled
//! [`CancellationToken`] fails the request with `Cancelled`. In both cases the
//! executor future is dropped, which aborts its in-flight work. Nothing is
//! retried.

use axum::{
    Json,
    http::header::{CONTENT_RANGE, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::config::CompilerConfig;
use crate::core::QueryExecutor;
use crate::errors::QueryError;
use crate::filtering::Predicate;
use crate::models::ListQuery;
use crate::plan::{QueryCompiler, QueryPlan};
use crate::validation::{ValidationError, ValidationErrors, validators::validate_range};

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSpec {
    page: u64,
    limit: u64,
}

impl PaginationSpec {
    /// Apply defaults and range checks: `page >= 1`, `1 <= limit <= max_limit`.
    ///
    /// # Errors
    ///
    /// Returns every out-of-range parameter, or a `page` error when the row
    /// offset would not fit in a signed 64-bit `OFFSET`.
    pub fn resolve(
        page: Option<u64>,
        limit: Option<u64>,
        config: &CompilerConfig,
    ) -> Result<Self, ValidationErrors> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(config.default_limit);

        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_range("page", page, Some(1), None) {
            errors.add(e);
        }
        if let Err(e) = validate_range("limit", limit, Some(1), Some(config.max_limit)) {
            errors.add(e);
        }
        errors.result()?;

        let offset = (page - 1).checked_mul(limit).map(i64::try_from);
        if !matches!(offset, Some(Ok(_))) {
            let mut errors = ValidationErrors::new();
            errors.add(ValidationError::new("page", "Page is too large"));
            return Err(errors);
        }
        Ok(Self { page, limit })
    }

    #[must_use]
    pub fn page(&self) -> u64 {
        self.page
    }

    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Rows to skip; `resolve` guarantees this does not overflow.
    #[must_use]
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub current_page: u64,
    /// Requested page size
    pub items: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PaginationMeta {
    /// Metadata for `page` of size `limit` over `total` matching rows.
    #[must_use]
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            current_page: page,
            items: limit,
            total_items: total,
            total_pages,
            has_next_page: page < total_pages,
            has_previous_page: page > 1,
        }
    }

    /// Offset of the first row on this page
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.current_page.saturating_sub(1).saturating_mul(self.items)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PaginatedResult<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

/// Sanitize resource name by removing control characters for HTTP headers
fn sanitize_resource_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != ' ')
        .collect()
}

impl<T> PaginatedResult<T> {
    #[must_use]
    pub fn new(data: Vec<T>, meta: PaginationMeta) -> Self {
        Self { data, meta }
    }

    /// Transform every row, keeping the metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }

    /// `Content-Range` header for clients that page by item range,
    /// e.g. `posts 10-19/25`, or `posts */25` for an empty page.
    #[must_use]
    pub fn content_range(&self, resource_name: &str) -> HeaderMap {
        let safe_name = sanitize_resource_name(resource_name);
        let name = if safe_name.is_empty() { "items" } else { safe_name.as_str() };
        let total = self.meta.total_items;

        let content_range = match u64::try_from(self.data.len()) {
            Ok(len) if len > 0 => {
                let start = self.meta.offset();
                let end = start.saturating_add(len - 1);
                format!("{name} {start}-{end}/{total}")
            }
            _ => format!("{name} */{total}"),
        };

        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&content_range) {
            headers.insert(CONTENT_RANGE, value);
        }
        headers
    }
}

impl<T: Serialize> IntoResponse for PaginatedResult<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Per-call knobs that are not part of the untrusted request.
#[derive(Debug, Clone, Default)]
pub struct PaginateOptions {
    /// Searched when the request names no `searchFields`; falls back to the
    /// collection's own defaults when empty.
    pub default_search_fields: Vec<String>,
    /// Always ANDed into the predicate, e.g. tenant or owner scoping.
    pub mandatory: Option<Predicate>,
    /// Expanded in addition to whatever the request asks for.
    pub additional_relations: Vec<String>,
    pub timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl PaginateOptions {
    #[must_use]
    pub fn with_default_search_fields(mut self, fields: &[&str]) -> Self {
        self.default_search_fields = fields.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_mandatory(mut self, predicate: Predicate) -> Self {
        self.mandatory = Some(predicate);
        self
    }

    #[must_use]
    pub fn with_additional_relations(mut self, relations: &[&str]) -> Self {
        self.additional_relations = relations.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Compiles list requests and executes them through `X`.
pub struct Paginator<X> {
    executor: X,
    config: CompilerConfig,
}

impl<X: QueryExecutor> Paginator<X> {
    #[must_use]
    pub fn new(executor: X, config: CompilerConfig) -> Self {
        Self { executor, config }
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile without executing.
    ///
    /// # Errors
    ///
    /// See [`QueryCompiler::compile`].
    pub fn compile(
        &self,
        collection: &str,
        query: &ListQuery,
        options: &PaginateOptions,
    ) -> Result<QueryPlan, QueryError> {
        QueryCompiler::new(&self.config, self.executor.metadata()).compile(collection, query, options)
    }

    /// Compile `query`, execute it against `collection` and build the envelope.
    ///
    /// # Errors
    ///
    /// - `Validation` when the request cannot be compiled
    /// - `InvalidQuery` when the executor rejects a field or relation
    /// - `ExecutionTimeout` / `Cancelled` when the round-trip does not finish
    /// - `Engine` when storage fails
    pub async fn paginate(
        &self,
        collection: &str,
        query: &ListQuery,
        options: &PaginateOptions,
    ) -> Result<PaginatedResult<X::Row>, QueryError> {
        let pagination = PaginationSpec::resolve(query.page, query.limit, &self.config)?;
        let plan = QueryCompiler::new(&self.config, self.executor.metadata())
            .compile_page(collection, query, options, &pagination)?;

        let timeout = options.timeout.unwrap_or(self.config.execution_timeout);
        let cancel = options.cancellation.clone().unwrap_or_default();

        let (rows, total) = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::warn!(collection, "List query cancelled before execution finished");
                return Err(QueryError::Cancelled);
            }
            result = tokio::time::timeout(timeout, self.executor.find_and_count(collection, &plan)) => {
                if let Ok(found) = result {
                    found?
                } else {
                    tracing::warn!(collection, timeout = ?timeout, "List query timed out");
                    return Err(QueryError::execution_timeout(timeout));
                }
            }
        };

        Ok(PaginatedResult::new(
            rows,
            PaginationMeta::new(pagination.page(), pagination.limit(), total),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CollectionMetadata, CollectionSchema, SchemaRegistry};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    /// Hands back canned rows after an optional delay and records the plan it saw.
    struct MockExecutor {
        registry: SchemaRegistry,
        rows: Vec<Value>,
        total: u64,
        delay: Duration,
        seen: Mutex<Option<QueryPlan>>,
    }

    impl MockExecutor {
        fn new(rows: Vec<Value>, total: u64) -> Self {
            Self {
                registry: SchemaRegistry::new().with(
                    CollectionSchema::new("posts", "id")
                        .fields(&["title"])
                        .searchable(&["title"]),
                ),
                rows,
                total,
                delay: Duration::ZERO,
                seen: Mutex::new(None),
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl QueryExecutor for MockExecutor {
        type Row = Value;

        fn metadata(&self) -> &dyn CollectionMetadata {
            &self.registry
        }

        async fn find_and_count(
            &self,
            collection: &str,
            plan: &QueryPlan,
        ) -> Result<(Vec<Value>, u64), QueryError> {
            if self.registry.schema(collection).is_none() {
                return Err(QueryError::invalid_query(format!("Unknown collection '{collection}'")));
            }
            *self.seen.lock().unwrap() = Some(plan.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok((self.rows.clone(), self.total))
        }
    }

    fn page(page: u64, limit: u64) -> ListQuery {
        ListQuery {
            page: Some(page),
            limit: Some(limit),
            ..Default::default()
        }
    }

    #[test]
    fn test_meta_middle_page() {
        let meta = PaginationMeta::new(2, 10, 25);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next_page);
        assert!(meta.has_previous_page);
        assert_eq!(meta.items, 10);
    }

    #[test]
    fn test_meta_zero_total() {
        for page in [1, 2, 7] {
            let meta = PaginationMeta::new(page, 10, 0);
            assert_eq!(meta.total_pages, 0);
            assert!(!meta.has_next_page);
            assert_eq!(meta.has_previous_page, page > 1);
        }
    }

    #[test]
    fn test_meta_boundary_pages() {
        for (limit, total) in [(10, 25), (10, 30), (1, 1), (100, 101)] {
            let last = PaginationMeta::new(1, limit, total).total_pages;
            assert!(PaginationMeta::new(last, limit, total).total_pages == last);
            assert!(!PaginationMeta::new(last, limit, total).has_next_page);
            assert_eq!(PaginationMeta::new(1, limit, total).has_next_page, last > 1);
            assert!(!PaginationMeta::new(1, limit, total).has_previous_page);
        }
    }

    #[test]
    fn test_meta_serializes_camel_case() {
        let value = serde_json::to_value(PaginationMeta::new(1, 10, 3)).unwrap();
        assert_eq!(
            value,
            json!({
                "currentPage": 1,
                "items": 10,
                "totalItems": 3,
                "totalPages": 1,
                "hasNextPage": false,
                "hasPreviousPage": false
            })
        );
    }

    #[test]
    fn test_resolve_defaults_and_skip() {
        let config = CompilerConfig::default();
        let spec = PaginationSpec::resolve(None, None, &config).unwrap();
        assert_eq!((spec.page(), spec.limit(), spec.skip()), (1, 10, 0));

        let spec = PaginationSpec::resolve(Some(3), Some(25), &config).unwrap();
        assert_eq!(spec.skip(), 50);
    }

    #[test]
    fn test_resolve_rejects_out_of_range() {
        let config = CompilerConfig::default();
        assert!(PaginationSpec::resolve(Some(0), None, &config).is_err());
        assert!(PaginationSpec::resolve(None, Some(0), &config).is_err());
        assert!(PaginationSpec::resolve(None, Some(101), &config).is_err());
        assert!(PaginationSpec::resolve(None, Some(100), &config).is_ok());
        assert!(PaginationSpec::resolve(Some(u64::MAX), Some(100), &config).is_err());
    }

    #[test]
    fn test_resolve_rejects_offset_beyond_i64() {
        let config = CompilerConfig::default();
        let err = PaginationSpec::resolve(Some(95_000_000_000_000_000), Some(100), &config).unwrap_err();
        assert_eq!(err.errors()[0].field, "page");

        let last = u64::try_from(i64::MAX).unwrap() / 100 + 1;
        assert!(PaginationSpec::resolve(Some(last), Some(100), &config).is_ok());
        assert!(PaginationSpec::resolve(Some(last + 1), Some(100), &config).is_err());
    }

    #[test]
    fn test_envelope_schema_describes_data_and_meta() {
        use utoipa::PartialSchema;

        #[derive(ToSchema)]
        #[allow(dead_code)]
        struct Post {
            id: i64,
        }

        let schema = serde_json::to_value(PaginatedResult::<Post>::schema()).unwrap();
        assert_eq!(schema["properties"]["data"]["type"], json!("array"));
        assert!(schema["properties"]["meta"].is_object());
        assert_eq!(schema["required"], json!(["data", "meta"]));
    }

    #[test]
    fn test_content_range() {
        let result = PaginatedResult::new(vec![1, 2, 3], PaginationMeta::new(2, 10, 13));
        let headers = result.content_range("posts");
        assert_eq!(headers.get(CONTENT_RANGE).unwrap(), "posts 10-12/13");

        let empty: PaginatedResult<i32> = PaginatedResult::new(vec![], PaginationMeta::new(1, 10, 0));
        assert_eq!(empty.content_range("posts").get(CONTENT_RANGE).unwrap(), "posts */0");
    }

    #[test]
    fn test_content_range_strips_control_characters() {
        let result = PaginatedResult::new(vec![1], PaginationMeta::new(1, 10, 1));
        let headers = result.content_range("posts\r\nInjected: evil");
        let value = headers.get(CONTENT_RANGE).unwrap().to_str().unwrap();
        assert!(!value.contains('\r'));
        assert!(!value.contains('\n'));
        assert!(value.ends_with(" 0-0/1"));
    }

    #[tokio::test]
    async fn test_paginate_builds_envelope() {
        let rows = (11..=20).map(|i| json!({"id": i})).collect();
        let paginator = Paginator::new(MockExecutor::new(rows, 25), CompilerConfig::default());
        let result = paginator
            .paginate("posts", &page(2, 10), &PaginateOptions::default())
            .await
            .unwrap();
        assert_eq!(result.data.len(), 10);
        assert_eq!(result.meta, PaginationMeta::new(2, 10, 25));

        let plan = paginator.executor().seen.lock().unwrap().clone().unwrap();
        assert_eq!((plan.skip, plan.take), (10, 10));
    }

    #[tokio::test]
    async fn test_paginate_validation_happens_before_execution() {
        let paginator = Paginator::new(MockExecutor::new(vec![], 0), CompilerConfig::default());
        let err = paginator
            .paginate("posts", &page(0, 10), &PaginateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Validation { .. }));
        assert!(paginator.executor().seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paginate_surfaces_invalid_query() {
        let paginator = Paginator::new(MockExecutor::new(vec![], 0), CompilerConfig::default());
        let err = paginator
            .paginate("missing", &ListQuery::default(), &PaginateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidQuery { .. }));
    }

    #[tokio::test]
    async fn test_paginate_times_out() {
        let executor = MockExecutor::new(vec![], 0).slow(Duration::from_secs(5));
        let paginator = Paginator::new(executor, CompilerConfig::default());
        let options = PaginateOptions::default().with_timeout(Duration::from_millis(20));
        let err = paginator
            .paginate("posts", &ListQuery::default(), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::ExecutionTimeout { timeout } if timeout == Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_config_timeout_applies_without_override() {
        let executor = MockExecutor::new(vec![], 0).slow(Duration::from_secs(5));
        let config = CompilerConfig::default().with_execution_timeout(Duration::from_millis(20));
        let err = Paginator::new(executor, config)
            .paginate("posts", &ListQuery::default(), &PaginateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::ExecutionTimeout { .. }));
    }

    #[tokio::test]
    async fn test_paginate_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let paginator = Paginator::new(MockExecutor::new(vec![json!({})], 1), CompilerConfig::default());
        let err = paginator
            .paginate("posts", &ListQuery::default(), &PaginateOptions::default().with_cancellation(token))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Cancelled));
    }

    #[tokio::test]
    async fn test_paginate_cancelled_mid_flight() {
        let token = CancellationToken::new();
        let executor = MockExecutor::new(vec![], 0).slow(Duration::from_secs(5));
        let paginator = Paginator::new(executor, CompilerConfig::default());

        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = paginator
            .paginate("posts", &ListQuery::default(), &PaginateOptions::default().with_cancellation(token))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Cancelled));
        // The executor started before the cancellation arrived
        assert!(paginator.executor().seen.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_paginate_zero_rows() {
        let paginator = Paginator::new(MockExecutor::new(vec![], 0), CompilerConfig::default());
        let result = paginator
            .paginate("posts", &ListQuery::default(), &PaginateOptions::default())
            .await
            .unwrap();
        assert!(result.data.is_empty());
        assert_eq!(result.meta.total_pages, 0);
        assert!(!result.meta.has_next_page);
        assert!(!result.meta.has_previous_page);
    }
}
