//! The closed operator table.
//!
//! Every filter operator maps to one predicate-construction rule here. Value
//! shape is checked per operator; anything the rule cannot use is reported
//! back as a reason string and the caller decides (by policy) whether that
//! drops the condition or fails the request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::path::FieldPath;
use super::predicate::{Comparator, Comparison};

// Basic safety limits
const MAX_FIELD_VALUE_LENGTH: usize = 10_000;
const MAX_SET_SIZE: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperatorKind {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
    In,
    NotIn,
    Between,
    Null,
    NotNull,
    StartsWith,
    EndsWith,
    Contains,
    /// Anything outside the table. Kept so the condition can be dropped with
    /// a diagnostic instead of failing deserialization of the whole filter.
    Unsupported(String),
}

/// How many values an operator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// `value` is ignored
    None,
    Single,
    /// A list; a scalar is coerced to a one-element list
    Set,
    /// Exactly two bounds
    Range,
}

/// Where the wildcards go around a LIKE operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeShape {
    Contains,
    StartsWith,
    EndsWith,
}

impl LikeShape {
    /// Build the LIKE pattern, escaping wildcards the user supplied.
    #[must_use]
    pub fn pattern(self, term: &str) -> String {
        let escaped = escape_like_wildcards(term);
        match self {
            Self::Contains => format!("%{escaped}%"),
            Self::StartsWith => format!("{escaped}%"),
            Self::EndsWith => format!("%{escaped}"),
        }
    }
}

/// Escape LIKE wildcards so user text only ever matches literally.
/// The backslash goes first so the escapes added for `%` and `_` stay intact.
#[must_use]
pub fn escape_like_wildcards(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

impl OperatorKind {
    /// Wire name, as accepted in filter JSON
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::ILike => "ilike",
            Self::In => "in",
            Self::NotIn => "nin",
            Self::Between => "between",
            Self::Null => "null",
            Self::NotNull => "notNull",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::Contains => "contains",
            Self::Unsupported(name) => name,
        }
    }

    #[must_use]
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    #[must_use]
    pub fn arity(&self) -> Arity {
        match self {
            Self::Null | Self::NotNull | Self::Unsupported(_) => Arity::None,
            Self::In | Self::NotIn => Arity::Set,
            Self::Between => Arity::Range,
            _ => Arity::Single,
        }
    }

    /// `eq`/`ne` with a JSON `null` become `IS NULL`/`IS NOT NULL`, and the
    /// two null operators never look at the value at all.
    #[must_use]
    pub fn is_null_aware(&self) -> bool {
        matches!(self, Self::Eq | Self::Ne | Self::Null | Self::NotNull)
    }

    /// Pattern placement and case sensitivity for the LIKE family.
    #[must_use]
    pub fn like_shape(&self) -> Option<(LikeShape, bool)> {
        match self {
            Self::Like => Some((LikeShape::Contains, false)),
            Self::ILike | Self::Contains => Some((LikeShape::Contains, true)),
            Self::StartsWith => Some((LikeShape::StartsWith, false)),
            Self::EndsWith => Some((LikeShape::EndsWith, false)),
            _ => None,
        }
    }

    /// Apply this operator to `field` and `value`.
    ///
    /// # Errors
    ///
    /// Returns the reason the condition cannot be compiled: an unsupported
    /// operator, or a value whose shape does not fit the operator's arity.
    pub fn build(&self, field: FieldPath, value: &Value) -> Result<Comparison, String> {
        let comparator = match self {
            Self::Unsupported(name) => return Err(format!("unsupported operator '{name}'")),
            Self::Null => Comparator::IsNull,
            Self::NotNull => Comparator::IsNotNull,
            Self::Eq if value.is_null() => Comparator::IsNull,
            Self::Ne if value.is_null() => Comparator::IsNotNull,
            Self::Eq => Comparator::Eq(scalar(self, value)?),
            Self::Ne => Comparator::Ne(scalar(self, value)?),
            Self::Gt => Comparator::Gt(scalar(self, value)?),
            Self::Gte => Comparator::Gte(scalar(self, value)?),
            Self::Lt => Comparator::Lt(scalar(self, value)?),
            Self::Lte => Comparator::Lte(scalar(self, value)?),
            Self::In => Comparator::In(set(self, value)?),
            Self::NotIn => Comparator::NotIn(set(self, value)?),
            Self::Between => {
                let (low, high) = range(value)?;
                Comparator::Between(low, high)
            }
            Self::Like | Self::ILike | Self::StartsWith | Self::EndsWith | Self::Contains => {
                let (shape, case_insensitive) = self
                    .like_shape()
                    .ok_or_else(|| format!("'{self}' is not a pattern operator"))?;
                let term = like_operand(self, value)?;
                Comparator::Like {
                    pattern: shape.pattern(&term),
                    case_insensitive,
                }
            }
        };
        Ok(Comparison::new(field, comparator))
    }
}

fn scalar(op: &OperatorKind, value: &Value) -> Result<Value, String> {
    match value {
        Value::Null => Err(format!("'{op}' needs a value")),
        Value::Array(_) | Value::Object(_) => Err(format!("'{op}' needs a single value")),
        Value::String(s) if s.len() > MAX_FIELD_VALUE_LENGTH => {
            Err(format!("value for '{op}' is too long"))
        }
        other => Ok(other.clone()),
    }
}

fn set(op: &OperatorKind, value: &Value) -> Result<Vec<Value>, String> {
    let items = match value {
        Value::Array(items) => items.clone(),
        scalar_value => vec![scalar_value.clone()],
    };
    if items.len() > MAX_SET_SIZE {
        return Err(format!("'{op}' accepts at most {MAX_SET_SIZE} values"));
    }
    items.iter().map(|item| scalar(op, item)).collect()
}

fn range(value: &Value) -> Result<(Value, Value), String> {
    match value.as_array().map(Vec::as_slice) {
        Some([low, high]) => Ok((
            scalar(&OperatorKind::Between, low)?,
            scalar(&OperatorKind::Between, high)?,
        )),
        _ => Err("'between' needs exactly two bounds".to_string()),
    }
}

fn like_operand(op: &OperatorKind, value: &Value) -> Result<String, String> {
    match scalar(op, value)? {
        Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

impl From<String> for OperatorKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "eq" => Self::Eq,
            "ne" => Self::Ne,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "like" => Self::Like,
            "ilike" => Self::ILike,
            "in" => Self::In,
            "nin" => Self::NotIn,
            "between" => Self::Between,
            "null" => Self::Null,
            "notNull" => Self::NotNull,
            "startsWith" => Self::StartsWith,
            "endsWith" => Self::EndsWith,
            "contains" => Self::Contains,
            _ => Self::Unsupported(name),
        }
    }
}

impl From<OperatorKind> for String {
    fn from(op: OperatorKind) -> Self {
        match op {
            OperatorKind::Unsupported(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
