//! Query plan assembly.
//!
//! [`QueryCompiler`] runs every compiler over one [`ListQuery`] and merges the
//! results into a [`QueryPlan`]: the immutable, engine-ready value handed to a
//! [`QueryExecutor`](crate::core::QueryExecutor).

use crate::config::CompilerConfig;
use crate::core::CollectionMetadata;
use crate::errors::QueryError;
use crate::filtering::{
    FilterCompiler, Predicate, SearchCompiler, SortCompiler, SortKey, compile_projection,
    expand_relations,
};
use crate::models::ListQuery;
use crate::pagination::{PaginateOptions, PaginationSpec};
use crate::validation::{CompileReport, ValidationError};

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub predicate: Predicate,
    pub order: Vec<SortKey>,
    /// `None` returns every field
    pub projection: Option<Vec<String>>,
    /// Relation paths to expand, shallow first
    pub relations: Vec<String>,
    pub skip: u64,
    pub take: u64,
}

/// Combine the caller's mandatory constraint, the filter tree and the search group.
///
/// The result is `mandatory AND filter AND search`, with every top-level OR
/// distributed so each branch is fully conjoined. Missing parts contribute
/// nothing; with no parts at all the plan matches every row.
#[must_use]
pub fn merge(
    filter: Option<Predicate>,
    search: Option<Predicate>,
    mandatory: Option<Predicate>,
) -> Predicate {
    [mandatory, filter, search]
        .into_iter()
        .flatten()
        .fold(Predicate::True, Predicate::distribute)
}

pub struct QueryCompiler<'a> {
    config: &'a CompilerConfig,
    metadata: &'a dyn CollectionMetadata,
}

impl<'a> QueryCompiler<'a> {
    #[must_use]
    pub fn new(config: &'a CompilerConfig, metadata: &'a dyn CollectionMetadata) -> Self {
        Self { config, metadata }
    }

    /// Compile `query` against `collection`, including its pagination window.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Validation` for out-of-range pagination, undecodable
    /// filter JSON, limit violations, or dropped input under the `Reject` policy.
    pub fn compile(
        &self,
        collection: &str,
        query: &ListQuery,
        options: &PaginateOptions,
    ) -> Result<QueryPlan, QueryError> {
        let pagination = PaginationSpec::resolve(query.page, query.limit, self.config)?;
        self.compile_page(collection, query, options, &pagination)
    }

    /// Compile `query` for an already resolved pagination window.
    ///
    /// # Errors
    ///
    /// Same as [`QueryCompiler::compile`], minus pagination checks.
    pub fn compile_page(
        &self,
        collection: &str,
        query: &ListQuery,
        options: &PaginateOptions,
        pagination: &PaginationSpec,
    ) -> Result<QueryPlan, QueryError> {
        let mut report = CompileReport::new();

        let filter = match &query.filter {
            Some(input) => {
                let group = input.decode()?;
                Some(FilterCompiler::new(self.config).compile_into(&group, &mut report))
            }
            None => None,
        };

        let search = query.search_spec().and_then(|spec| {
            let defaults = if options.default_search_fields.is_empty() {
                self.metadata.default_search_fields(collection)
            } else {
                options.default_search_fields.clone()
            };
            SearchCompiler::new(self.config.max_search_length)
                .with_max_fields(self.config.max_search_fields)
                .compile(&spec, &defaults, &mut report)
        });

        let order = SortCompiler::new(self.config.default_sort_order).compile(
            query.sort_by.as_deref(),
            query.sort_order.as_deref(),
            &mut report,
        );
        let projection = compile_projection(&query.select, &query.exclude, &mut report);
        let relations = expand_relations(
            &query.relation_spec(),
            &options.additional_relations,
            || self.metadata.relation_names(collection),
            &mut report,
        );

        report.finish(self.config.malformed_conditions)?;

        let predicate = merge(filter, search, options.mandatory.clone());
        let leaves = predicate.leaf_count();
        if leaves > self.config.max_predicate_leaves {
            return Err(ValidationError::new(
                "filter",
                format!(
                    "Combined filter and search expand to {leaves} conditions, over the limit of {}",
                    self.config.max_predicate_leaves
                ),
            )
            .into());
        }

        let plan = QueryPlan {
            predicate,
            order,
            projection,
            relations,
            skip: pagination.skip(),
            take: pagination.limit(),
        };
        tracing::debug!(
            collection,
            predicate = %plan.predicate,
            order = ?plan.order.iter().map(ToString::to_string).collect::<Vec<_>>(),
            relations = ?plan.relations,
            skip = plan.skip,
            take = plan.take,
            "Compiled list query"
        );
        Ok(plan)
    }
}
