//! [`QueryPlan`] → `sea_query` translation.
//!
//! Every column is table-qualified and every value is bound as a parameter.
//! The root table is aliased `t`; a relation chain `author.company` is joined
//! as `t__author` then `t__author__company`. Only to-one (`BelongsTo`) hops
//! can be joined, so joins never multiply rows and the count stays exact.

use sea_orm::{
    DatabaseBackend, JsonValue,
    sea_query::{
        Alias, Asterisk, BinOper, Condition, Expr, Func, JoinType, LikeExpr, Order, Query, SelectStatement,
        SimpleExpr, Value,
    },
};
use uuid::Uuid;

use crate::core::{CollectionMetadata, CollectionSchema, RelationKind, SchemaRegistry};
use crate::errors::QueryError;
use crate::filtering::{Comparator, Comparison, FieldPath, Predicate};
use crate::plan::QueryPlan;

pub(crate) const BASE_ALIAS: &str = "t";
pub(crate) const COUNT_ALIAS: &str = "total";

/// SELECT and COUNT statements for one plan.
#[derive(Debug)]
pub struct PlanStatements {
    pub select: SelectStatement,
    pub count: SelectStatement,
    /// Columns fetched only so relations can be attached; strip them from output.
    pub hidden: Vec<String>,
}

struct Join {
    path: Vec<String>,
    alias: String,
    parent_alias: String,
    table: String,
    local_key: String,
    foreign_key: String,
}

/// Translates one plan against one collection.
pub struct PlanTranslator<'a> {
    registry: &'a SchemaRegistry,
    root: &'a CollectionSchema,
    backend: DatabaseBackend,
    joins: Vec<Join>,
}

impl<'a> PlanTranslator<'a> {
    /// # Errors
    ///
    /// Returns `InvalidQuery` when `collection` is not registered.
    pub fn new(
        registry: &'a SchemaRegistry,
        collection: &str,
        backend: DatabaseBackend,
    ) -> Result<Self, QueryError> {
        let root = registry
            .schema(collection)
            .ok_or_else(|| QueryError::invalid_query(format!("Unknown collection '{collection}'")))?;
        Ok(Self {
            registry,
            root,
            backend,
            joins: Vec::new(),
        })
    }

    /// Build the statements for `plan`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuery` for any field or relation the schema does not
    /// declare, and for filter or sort paths that cross a to-many relation.
    pub fn translate(mut self, plan: &QueryPlan) -> Result<PlanStatements, QueryError> {
        let condition = self.condition(&plan.predicate)?;

        let mut order = Vec::with_capacity(plan.order.len() + 1);
        for key in &plan.order {
            let (alias, column) = self.resolve(&key.path)?;
            order.push((alias, column, Order::from(key.direction)));
        }
        // Stable paging needs a total order
        let pk = self.root.primary_key.clone();
        if !order.iter().any(|(alias, column, _)| alias == BASE_ALIAS && *column == pk) {
            order.push((BASE_ALIAS.to_string(), pk.clone(), Order::Asc));
        }

        let mut columns = match &plan.projection {
            Some(fields) => {
                for field in fields {
                    if !self.root.has_field(field) {
                        return Err(unknown_field(field, self.root));
                    }
                }
                fields.clone()
            }
            None => self.root.fields.clone(),
        };
        let mut hidden = Vec::new();
        // A projection that excluded everything still needs one column to select
        if columns.is_empty() {
            columns.push(pk.clone());
            hidden.push(pk.clone());
        }
        for key in relation_keys(self.registry, self.root, &plan.relations)? {
            if !columns.contains(&key) {
                columns.push(key.clone());
                hidden.push(key);
            }
        }

        let mut select = Query::select();
        select.from_as(Alias::new(&self.root.table), Alias::new(BASE_ALIAS));
        for column in &columns {
            select.expr_as(
                Expr::col((Alias::new(BASE_ALIAS), Alias::new(column))),
                Alias::new(column),
            );
        }
        self.apply_joins(&mut select);
        select.cond_where(condition.clone());
        for (alias, column, direction) in order {
            select.order_by((Alias::new(alias), Alias::new(column)), direction);
        }
        select.limit(plan.take).offset(plan.skip);

        let mut count = Query::select();
        count
            .from_as(Alias::new(&self.root.table), Alias::new(BASE_ALIAS))
            .expr_as(Func::count(Expr::col(Asterisk)), Alias::new(COUNT_ALIAS));
        self.apply_joins(&mut count);
        count.cond_where(condition);

        Ok(PlanStatements {
            select,
            count,
            hidden,
        })
    }

    fn apply_joins(&self, statement: &mut SelectStatement) {
        for join in &self.joins {
            statement.join_as(
                JoinType::LeftJoin,
                Alias::new(&join.table),
                Alias::new(&join.alias),
                Expr::col((Alias::new(&join.parent_alias), Alias::new(&join.local_key)))
                    .equals((Alias::new(&join.alias), Alias::new(&join.foreign_key))),
            );
        }
    }

    /// Table alias and column for `path`, registering any joins it needs.
    fn resolve(&mut self, path: &FieldPath) -> Result<(String, String), QueryError> {
        let mut schema = self.root;
        let mut alias = BASE_ALIAS.to_string();

        for (depth, name) in path.relations().iter().enumerate() {
            let relation = schema
                .get_relation(name)
                .ok_or_else(|| unknown_relation(name, schema))?;
            if relation.kind == RelationKind::HasMany {
                return Err(QueryError::invalid_query(format!(
                    "'{path}' crosses the to-many relation '{name}'; only to-one relations can be filtered or sorted on"
                )));
            }
            let target = self
                .registry
                .schema(&relation.target)
                .ok_or_else(|| unknown_relation(name, schema))?;

            let prefix = &path.relations()[..=depth];
            let child_alias = format!("{BASE_ALIAS}__{}", prefix.join("__"));
            if !self.joins.iter().any(|j| j.path == prefix) {
                self.joins.push(Join {
                    path: prefix.to_vec(),
                    alias: child_alias.clone(),
                    parent_alias: alias,
                    table: target.table.clone(),
                    local_key: relation.local_key.clone(),
                    foreign_key: relation.foreign_key.clone(),
                });
            }
            alias = child_alias;
            schema = target;
        }

        if !schema.has_field(path.field()) {
            return Err(unknown_field(path.field(), schema));
        }
        Ok((alias, path.field().to_string()))
    }

    fn condition(&mut self, predicate: &Predicate) -> Result<Condition, QueryError> {
        let condition = match predicate {
            Predicate::True => Condition::all(),
            Predicate::Leaf(comparison) => Condition::all().add(self.comparison(comparison)?),
            Predicate::And(children) => {
                let mut all = Condition::all();
                for child in children {
                    all = all.add(self.condition(child)?);
                }
                all
            }
            Predicate::Or(children) => {
                let mut any = Condition::any();
                for child in children {
                    any = any.add(self.condition(child)?);
                }
                any
            }
        };
        Ok(condition)
    }

    fn comparison(&mut self, comparison: &Comparison) -> Result<SimpleExpr, QueryError> {
        let (alias, column) = self.resolve(&comparison.field)?;
        let col = Expr::col((Alias::new(alias), Alias::new(column)));
        let backend = self.backend;
        let value = |v: &JsonValue| json_to_value(v, backend);

        let expr = match &comparison.comparator {
            Comparator::Eq(v) => col.eq(value(v)?),
            Comparator::Ne(v) => col.ne(value(v)?),
            Comparator::Gt(v) => col.gt(value(v)?),
            Comparator::Gte(v) => col.gte(value(v)?),
            Comparator::Lt(v) => col.lt(value(v)?),
            Comparator::Lte(v) => col.lte(value(v)?),
            Comparator::Like {
                pattern,
                case_insensitive: true,
            } => Expr::expr(Func::upper(col)).like(LikeExpr::new(pattern.to_uppercase()).escape('\\')),
            Comparator::Like { pattern, .. } => case_sensitive_like(col, pattern, backend),
            Comparator::In(values) if values.is_empty() => Expr::cust("1 = 0"),
            Comparator::In(values) => col.is_in(values.iter().map(value).collect::<Result<Vec<_>, _>>()?),
            Comparator::NotIn(values) if values.is_empty() => Expr::cust("1 = 1"),
            Comparator::NotIn(values) => {
                col.is_not_in(values.iter().map(value).collect::<Result<Vec<_>, _>>()?)
            }
            Comparator::Between(low, high) => col.between(value(low)?, value(high)?),
            Comparator::IsNull => col.is_null(),
            Comparator::IsNotNull => col.is_not_null(),
        };
        Ok(expr)
    }
}

/// `LIKE` ignores ASCII case on `SQLite` and on `MySQL`'s default collations, so
/// those backends get `GLOB` and `LIKE BINARY` respectively.
fn case_sensitive_like(col: Expr, pattern: &str, backend: DatabaseBackend) -> SimpleExpr {
    match backend {
        DatabaseBackend::Sqlite => col.binary(BinOper::Custom("GLOB"), like_to_glob(pattern)),
        DatabaseBackend::MySql => Expr::expr(Expr::cust_with_exprs("BINARY $1", [col.into()]))
            .like(LikeExpr::new(pattern).escape('\\')),
        DatabaseBackend::Postgres => col.like(LikeExpr::new(pattern).escape('\\')),
    }
}

/// Rewrite a backslash-escaped LIKE pattern as a GLOB pattern.
fn like_to_glob(pattern: &str) -> String {
    let mut glob = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        let literal = match c {
            '%' => {
                glob.push('*');
                continue;
            }
            '_' => {
                glob.push('?');
                continue;
            }
            '\\' => chars.next().unwrap_or('\\'),
            other => other,
        };
        match literal {
            '*' | '?' | '[' => {
                glob.push('[');
                glob.push(literal);
                glob.push(']');
            }
            other => glob.push(other),
        }
    }
    glob
}

/// Root columns the relation loader needs, after checking every relation path exists.
fn relation_keys(
    registry: &SchemaRegistry,
    root: &CollectionSchema,
    relations: &[String],
) -> Result<Vec<String>, QueryError> {
    let mut keys: Vec<String> = Vec::new();
    for path in relations {
        let mut schema = root;
        for (depth, name) in path.split('.').enumerate() {
            let relation = schema
                .get_relation(name)
                .ok_or_else(|| unknown_relation(name, schema))?;
            if depth == 0 && !keys.contains(&relation.local_key) {
                keys.push(relation.local_key.clone());
            }
            schema = registry
                .schema(&relation.target)
                .ok_or_else(|| unknown_relation(name, schema))?;
        }
    }
    Ok(keys)
}

/// Bind a JSON scalar as a SQL value. UUID strings become UUIDs on `PostgreSQL`,
/// where text and uuid do not compare implicitly.
///
/// # Errors
///
/// Returns `InvalidQuery` for `null`, arrays and objects.
pub fn json_to_value(value: &JsonValue, backend: DatabaseBackend) -> Result<Value, QueryError> {
    match value {
        JsonValue::String(s) => {
            if backend == DatabaseBackend::Postgres
                && let Ok(uuid) = Uuid::parse_str(s)
            {
                return Ok(uuid.into());
            }
            Ok(s.clone().into())
        }
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i.into())
            } else if let Some(u) = n.as_u64() {
                Ok(u.into())
            } else {
                Ok(n.as_f64().unwrap_or_default().into())
            }
        }
        JsonValue::Bool(b) => Ok((*b).into()),
        other => Err(QueryError::invalid_query(format!("Cannot compare against {other}"))),
    }
}

pub(crate) fn unknown_field(field: &str, schema: &CollectionSchema) -> QueryError {
    QueryError::invalid_query(format!("Unknown field '{field}' on '{}'", schema.name))
}

pub(crate) fn unknown_relation(name: &str, schema: &CollectionSchema) -> QueryError {
    QueryError::invalid_query(format!("Unknown relation '{name}' on '{}'", schema.name))
}
