//! Boolean predicate algebra.
//!
//! Compiled filters, search groups and caller constraints all become a
//! [`Predicate`]. Combining them is done here, on the tree, and never by
//! merging key/value maps, so two constraints on the same field are both kept
//! and an OR group is never flattened into its branches.

use serde_json::Value;
use std::fmt;

use super::path::FieldPath;

/// A comparison against a single field, ready for the execution layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparator {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    /// `pattern` already carries its `%` wildcards; user-supplied `%`, `_` and
    /// `\` are escaped with `\`.
    Like {
        pattern: String,
        case_insensitive: bool,
    },
    In(Vec<Value>),
    NotIn(Vec<Value>),
    /// Inclusive on both ends. Bounds are passed through unordered.
    Between(Value, Value),
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub field: FieldPath,
    pub comparator: Comparator,
}

impl Comparison {
    #[must_use]
    pub fn new(field: FieldPath, comparator: Comparator) -> Self {
        Self { field, comparator }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every row; the identity of conjunction.
    True,
    Leaf(Comparison),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    #[must_use]
    pub fn leaf(field: FieldPath, comparator: Comparator) -> Self {
        Self::Leaf(Comparison::new(field, comparator))
    }

    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    #[must_use]
    pub fn is_disjunction(&self) -> bool {
        matches!(self, Self::Or(_))
    }

    /// Conjunction with flattening; `True` is dropped.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, p) | (p, Self::True) => p,
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), p) => {
                left.push(p);
                Self::And(left)
            }
            (p, Self::And(right)) => {
                let mut children = Vec::with_capacity(right.len() + 1);
                children.push(p);
                children.extend(right);
                Self::And(children)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }

    /// Disjunction with flattening; `True` absorbs everything.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), p) => {
                left.push(p);
                Self::Or(left)
            }
            (p, Self::Or(right)) => {
                let mut children = Vec::with_capacity(right.len() + 1);
                children.push(p);
                children.extend(right);
                Self::Or(children)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }

    /// Conjoin every predicate; an empty input is `True`.
    pub fn all(predicates: impl IntoIterator<Item = Self>) -> Self {
        predicates.into_iter().fold(Self::True, Self::and)
    }

    /// Disjoin every predicate, or `None` when there is nothing to disjoin.
    ///
    /// An empty disjunction would match no rows; callers decide what an empty
    /// group means instead of getting that silently.
    pub fn any(predicates: impl IntoIterator<Item = Self>) -> Option<Self> {
        predicates.into_iter().reduce(Self::or)
    }

    /// Conjoin `self` with `other`, pushing the conjunction into top-level OR branches.
    ///
    /// The result is either a plain conjunction or a disjunction whose every
    /// branch is fully conjoined:
    ///
    /// - `A ∧ (b₁ ∨ b₂)` becomes `(A ∧ b₁) ∨ (A ∧ b₂)`
    /// - `(a₁ ∨ a₂) ∧ (b₁ ∨ b₂)` becomes the four-branch cross product
    ///
    /// Operand order is kept inside every branch.
    #[must_use]
    pub fn distribute(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, p) | (p, Self::True) => p,
            (Self::Or(left), Self::Or(right)) => {
                let mut branches = Vec::with_capacity(left.len() * right.len());
                for l in &left {
                    for r in &right {
                        branches.push(l.clone().and(r.clone()));
                    }
                }
                Self::Or(branches)
            }
            (Self::Or(branches), p) => {
                Self::Or(branches.into_iter().map(|b| b.and(p.clone())).collect())
            }
            (p, Self::Or(branches)) => {
                Self::Or(branches.into_iter().map(|b| p.clone().and(b)).collect())
            }
            (left, right) => left.and(right),
        }
    }

    /// Number of leaf comparisons in the tree
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::True => 0,
            Self::Leaf(_) => 1,
            Self::And(children) | Self::Or(children) => children.iter().map(Self::leaf_count).sum(),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = &self.field;
        match &self.comparator {
            Comparator::Eq(v) => write!(f, "{field} = {v}"),
            Comparator::Ne(v) => write!(f, "{field} <> {v}"),
            Comparator::Gt(v) => write!(f, "{field} > {v}"),
            Comparator::Gte(v) => write!(f, "{field} >= {v}"),
            Comparator::Lt(v) => write!(f, "{field} < {v}"),
            Comparator::Lte(v) => write!(f, "{field} <= {v}"),
            Comparator::Like {
                pattern,
                case_insensitive,
            } => {
                let keyword = if *case_insensitive { "ILIKE" } else { "LIKE" };
                write!(f, "{field} {keyword} {}", Value::String(pattern.clone()))
            }
            Comparator::In(values) => write!(f, "{field} IN ({})", join_values(values)),
            Comparator::NotIn(values) => write!(f, "{field} NOT IN ({})", join_values(values)),
            Comparator::Between(low, high) => write!(f, "{field} BETWEEN {low} AND {high}"),
            Comparator::IsNull => write!(f, "{field} IS NULL"),
            Comparator::IsNotNull => write!(f, "{field} IS NOT NULL"),
        }
    }
}

fn join_values(values: &[Value]) -> String {
    values.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "TRUE"),
            Self::Leaf(comparison) => write!(f, "{comparison}"),
            Self::And(children) => write_joined(f, children, " AND ", Self::is_disjunction),
            Self::Or(children) => {
                write_joined(f, children, " OR ", |p| matches!(p, Self::And(_)))
            }
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    children: &[Predicate],
    separator: &str,
    needs_parens: fn(&Predicate) -> bool,
) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        if needs_parens(child) {
            write!(f, "({child})")?;
        } else {
            write!(f, "{child}")?;
        }
    }
    Ok(())
}
