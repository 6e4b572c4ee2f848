use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::operators::OperatorKind;
use super::path::FieldPath;
use super::predicate::Predicate;
use crate::config::CompilerConfig;
use crate::validation::{CompileReport, ValidationErrors};

/// One leaf of a filter request: `{"field": "age", "operator": "gte", "value": 18}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: OperatorKind,
    /// Missing values read as `null`, which the null-aware operators understand.
    #[serde(default)]
    pub value: Value,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: OperatorKind, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    #[default]
    #[serde(alias = "AND")]
    And,
    #[serde(alias = "OR")]
    Or,
}

/// A recursive filter tree. Missing members default to an empty AND group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterGroup {
    pub operator: LogicalOperator,
    pub conditions: Vec<FilterCondition>,
    pub groups: Vec<FilterGroup>,
}

impl FilterGroup {
    #[must_use]
    pub fn and(conditions: Vec<FilterCondition>) -> Self {
        Self {
            operator: LogicalOperator::And,
            conditions,
            groups: Vec::new(),
        }
    }

    #[must_use]
    pub fn or(conditions: Vec<FilterCondition>) -> Self {
        Self {
            operator: LogicalOperator::Or,
            conditions,
            groups: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_group(mut self, group: FilterGroup) -> Self {
        self.groups.push(group);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.groups.is_empty()
    }
}

/// Recursive-descent compiler from [`FilterGroup`] to [`Predicate`].
pub struct FilterCompiler<'a> {
    config: &'a CompilerConfig,
}

impl<'a> FilterCompiler<'a> {
    #[must_use]
    pub fn new(config: &'a CompilerConfig) -> Self {
        Self { config }
    }

    /// Compile `group` on its own, applying the configured malformed-condition policy.
    ///
    /// # Errors
    ///
    /// Returns `ValidationErrors` when the tree is too deep or too large, or
    /// when a condition was malformed and the policy is `Reject`.
    pub fn compile(&self, group: &FilterGroup) -> Result<Predicate, ValidationErrors> {
        let mut report = CompileReport::new();
        let predicate = self.compile_into(group, &mut report);
        report.finish(self.config.malformed_conditions)?;
        Ok(predicate)
    }

    /// Compile `group`, recording dropped conditions and limit violations in `report`.
    pub fn compile_into(&self, group: &FilterGroup, report: &mut CompileReport) -> Predicate {
        let predicate = self.compile_group(group, 1, report);

        let leaves = predicate.leaf_count();
        if leaves > self.config.max_conditions {
            report.fatal(
                "filter",
                format!(
                    "{leaves} conditions exceed the limit of {}",
                    self.config.max_conditions
                ),
            );
        }
        predicate
    }

    fn compile_group(&self, group: &FilterGroup, depth: usize, report: &mut CompileReport) -> Predicate {
        if depth > self.config.max_filter_depth {
            report.fatal(
                "filter",
                format!("groups nested deeper than {} levels", self.config.max_filter_depth),
            );
            return Predicate::True;
        }

        let mut children = Vec::with_capacity(group.conditions.len() + group.groups.len());
        for condition in &group.conditions {
            if let Some(leaf) = compile_condition(condition, report) {
                children.push(leaf);
            }
        }
        for nested in &group.groups {
            let compiled = self.compile_group(nested, depth + 1, report);
            // Empty sub-groups are neutral under AND and absent under OR
            if !compiled.is_true() {
                children.push(compiled);
            }
        }

        match group.operator {
            LogicalOperator::And => Predicate::all(children),
            LogicalOperator::Or => Predicate::any(children).unwrap_or(Predicate::True),
        }
    }
}

fn compile_condition(condition: &FilterCondition, report: &mut CompileReport) -> Option<Predicate> {
    let field = match FieldPath::parse(&condition.field) {
        Ok(field) => field,
        Err(reason) => {
            report.drop(condition.field.as_str(), reason);
            return None;
        }
    };

    match condition.operator.build(field, &condition.value) {
        Ok(comparison) => Some(Predicate::Leaf(comparison)),
        Err(reason) => {
            report.drop(condition.field.as_str(), reason);
            None
        }
    }
}
