//! Compiler configuration.
//!
//! [`CompilerConfig`] holds the limits and policies that apply to every
//! request. It can be built in code, deserialized from an application's own
//! config file, or read from `CRUDQUERY_*` environment variables.

use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::filtering::sort::SortDirection;
use crate::validation::ValidationError;

/// What to do with a condition that cannot be compiled (unsupported operator,
/// wrong value shape, invalid field name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Leave the condition out of the predicate and log a warning.
    #[default]
    Drop,
    /// Fail the request with a validation error.
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub malformed_conditions: MalformedPolicy,
    /// Deepest allowed nesting of filter groups; the root group is depth 1.
    pub max_filter_depth: usize,
    /// Upper bound on leaf conditions across the whole filter tree.
    pub max_conditions: usize,
    pub default_limit: u64,
    pub max_limit: u64,
    pub default_sort_order: SortDirection,
    /// Search terms longer than this many characters are truncated.
    pub max_search_length: usize,
    /// Most distinct `searchFields` one request may name.
    pub max_search_fields: usize,
    /// Upper bound on leaves in the merged predicate, after search and the
    /// mandatory constraint are distributed over the filter.
    pub max_predicate_leaves: usize,
    #[serde(with = "duration_secs")]
    pub execution_timeout: Duration,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            malformed_conditions: MalformedPolicy::Drop,
            max_filter_depth: 8,
            max_conditions: 100,
            default_limit: 10,
            max_limit: 100,
            default_sort_order: SortDirection::Desc,
            max_search_length: 10_000,
            max_search_fields: 20,
            max_predicate_leaves: 1_000,
            execution_timeout: Duration::from_secs(30),
        }
    }
}

impl CompilerConfig {
    #[must_use]
    pub fn with_malformed_conditions(mut self, policy: MalformedPolicy) -> Self {
        self.malformed_conditions = policy;
        self
    }

    #[must_use]
    pub fn with_max_filter_depth(mut self, depth: usize) -> Self {
        self.max_filter_depth = depth;
        self
    }

    #[must_use]
    pub fn with_max_conditions(mut self, count: usize) -> Self {
        self.max_conditions = count;
        self
    }

    #[must_use]
    pub fn with_max_search_fields(mut self, count: usize) -> Self {
        self.max_search_fields = count;
        self
    }

    #[must_use]
    pub fn with_max_predicate_leaves(mut self, count: usize) -> Self {
        self.max_predicate_leaves = count;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, default_limit: u64, max_limit: u64) -> Self {
        self.default_limit = default_limit;
        self.max_limit = max_limit;
        self
    }

    #[must_use]
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Recognized variables: `CRUDQUERY_MALFORMED_CONDITIONS` (`drop`/`reject`),
    /// `CRUDQUERY_MAX_FILTER_DEPTH`, `CRUDQUERY_MAX_CONDITIONS`,
    /// `CRUDQUERY_DEFAULT_LIMIT`, `CRUDQUERY_MAX_LIMIT`,
    /// `CRUDQUERY_DEFAULT_SORT_ORDER` (`ASC`/`DESC`),
    /// `CRUDQUERY_MAX_SEARCH_LENGTH`, `CRUDQUERY_MAX_SEARCH_FIELDS`,
    /// `CRUDQUERY_MAX_PREDICATE_LEAVES`, `CRUDQUERY_EXECUTION_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` naming the variable that failed to parse, or
    /// when the resulting limits are inconsistent.
    pub fn from_env() -> Result<Self, ValidationError> {
        let defaults = Self::default();

        let malformed_conditions = match env::var("CRUDQUERY_MALFORMED_CONDITIONS") {
            Ok(value) => match value.to_lowercase().as_str() {
                "drop" => MalformedPolicy::Drop,
                "reject" => MalformedPolicy::Reject,
                _ => {
                    return Err(ValidationError::new(
                        "CRUDQUERY_MALFORMED_CONDITIONS",
                        "Must be 'drop' or 'reject'",
                    ));
                }
            },
            Err(_) => defaults.malformed_conditions,
        };

        let default_sort_order = match env::var("CRUDQUERY_DEFAULT_SORT_ORDER") {
            Ok(value) => SortDirection::parse(&value),
            Err(_) => defaults.default_sort_order,
        };

        let config = Self {
            malformed_conditions,
            max_filter_depth: parse_var("CRUDQUERY_MAX_FILTER_DEPTH", defaults.max_filter_depth)?,
            max_conditions: parse_var("CRUDQUERY_MAX_CONDITIONS", defaults.max_conditions)?,
            default_limit: parse_var("CRUDQUERY_DEFAULT_LIMIT", defaults.default_limit)?,
            max_limit: parse_var("CRUDQUERY_MAX_LIMIT", defaults.max_limit)?,
            default_sort_order,
            max_search_length: parse_var("CRUDQUERY_MAX_SEARCH_LENGTH", defaults.max_search_length)?,
            max_search_fields: parse_var("CRUDQUERY_MAX_SEARCH_FIELDS", defaults.max_search_fields)?,
            max_predicate_leaves: parse_var(
                "CRUDQUERY_MAX_PREDICATE_LEAVES",
                defaults.max_predicate_leaves,
            )?,
            execution_timeout: Duration::from_secs(parse_var(
                "CRUDQUERY_EXECUTION_TIMEOUT_SECS",
                defaults.execution_timeout.as_secs(),
            )?),
        };
        config.check()?;
        Ok(config)
    }

    /// Reject limit combinations no request could satisfy.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` when `default_limit` is outside `[1, max_limit]`
    /// or when the filter depth allows no group at all.
    pub fn check(&self) -> Result<(), ValidationError> {
        if self.max_limit == 0 || self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(ValidationError::new(
                "default_limit",
                format!("Must be between 1 and max_limit ({})", self.max_limit),
            ));
        }
        if self.max_filter_depth == 0 {
            return Err(ValidationError::new("max_filter_depth", "Must be at least 1"));
        }
        if self.max_predicate_leaves < self.max_conditions {
            return Err(ValidationError::new(
                "max_predicate_leaves",
                format!("Must be at least max_conditions ({})", self.max_conditions),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ValidationError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ValidationError::new(name, format!("Invalid value '{value}'"))),
        Err(_) => Ok(default),
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
