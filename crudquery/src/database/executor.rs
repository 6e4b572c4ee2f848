use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, FromQueryResult, JsonValue,
    TransactionTrait,
    sea_query::{Alias, Expr, Order, Query},
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use super::statement::{
    BASE_ALIAS, COUNT_ALIAS, PlanTranslator, json_to_value, unknown_relation,
};
use crate::core::{CollectionMetadata, CollectionSchema, QueryExecutor, RelationDef, RelationKind, SchemaRegistry};
use crate::errors::QueryError;
use crate::plan::QueryPlan;

// Keys per secondary query when loading relations
const RELATION_BATCH_SIZE: usize = 500;

/// [`QueryExecutor`] over a Sea-ORM connection, returning rows as JSON objects.
#[derive(Debug, Clone)]
pub struct SeaOrmExecutor {
    db: DatabaseConnection,
    registry: SchemaRegistry,
}

impl SeaOrmExecutor {
    #[must_use]
    pub fn new(db: DatabaseConnection, registry: SchemaRegistry) -> Self {
        Self { db, registry }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }
}

#[async_trait]
impl QueryExecutor for SeaOrmExecutor {
    type Row = JsonValue;

    fn metadata(&self) -> &dyn CollectionMetadata {
        &self.registry
    }

    async fn find_and_count(
        &self,
        collection: &str,
        plan: &QueryPlan,
    ) -> Result<(Vec<JsonValue>, u64), QueryError> {
        let backend = self.db.get_database_backend();
        let statements = PlanTranslator::new(&self.registry, collection, backend)?.translate(plan)?;
        let root = self
            .registry
            .schema(collection)
            .ok_or_else(|| QueryError::invalid_query(format!("Unknown collection '{collection}'")))?;

        // Rows and total come from one snapshot
        let txn = self.db.begin().await?;

        let mut rows = JsonValue::find_by_statement(backend.build(&statements.select))
            .all(&txn)
            .await?;

        let total = match txn.query_one(backend.build(&statements.count)).await? {
            Some(row) => row.try_get::<i64>("", COUNT_ALIAS)?,
            None => 0,
        };

        let tree = RelationTree::from_paths(&plan.relations);
        RelationLoader {
            txn: &txn,
            registry: &self.registry,
        }
        .load(root, &mut rows, &tree)
        .await?;

        txn.commit().await?;

        strip(&mut rows, &statements.hidden);
        tracing::debug!(collection, rows = rows.len(), total, "Executed list query");
        Ok((rows, u64::try_from(total).unwrap_or_default()))
    }
}

/// Requested relation paths as a tree; `comments.author` implies `comments`.
#[derive(Debug, Default)]
struct RelationTree {
    children: Vec<(String, RelationTree)>,
}

impl RelationTree {
    fn from_paths(paths: &[String]) -> Self {
        let mut tree = Self::default();
        for path in paths {
            let mut node = &mut tree;
            for segment in path.split('.') {
                let index = match node.children.iter().position(|(name, _)| name == segment) {
                    Some(index) => index,
                    None => {
                        node.children.push((segment.to_string(), Self::default()));
                        node.children.len() - 1
                    }
                };
                node = &mut node.children[index].1;
            }
        }
        tree
    }
}

struct RelationLoader<'a> {
    txn: &'a DatabaseTransaction,
    registry: &'a SchemaRegistry,
}

impl RelationLoader<'_> {
    /// Attach every relation in `tree` to `rows`, depth first.
    fn load<'b>(
        &'b self,
        schema: &'b CollectionSchema,
        rows: &'b mut [JsonValue],
        tree: &'b RelationTree,
    ) -> Pin<Box<dyn Future<Output = Result<(), QueryError>> + Send + 'b>> {
        Box::pin(async move {
            for (name, subtree) in &tree.children {
                let relation = schema
                    .get_relation(name)
                    .ok_or_else(|| unknown_relation(name, schema))?;
                let target = self
                    .registry
                    .schema(&relation.target)
                    .ok_or_else(|| unknown_relation(name, schema))?;

                let mut related = self.fetch(relation, target, rows, subtree).await?;
                self.load(target, &mut related.rows, subtree).await?;
                attach(relation, rows, related);
            }
            Ok(())
        })
    }

    /// Fetch the target rows referenced by `rows`, ordered by primary key.
    async fn fetch(
        &self,
        relation: &RelationDef,
        target: &CollectionSchema,
        rows: &[JsonValue],
        subtree: &RelationTree,
    ) -> Result<Related, QueryError> {
        let mut keys: Vec<&JsonValue> = Vec::new();
        for row in rows {
            if let Some(key) = row.get(&relation.local_key)
                && !key.is_null()
                && !keys.contains(&key)
            {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            return Ok(Related::default());
        }

        // Keys the next level of relations joins on
        let mut columns = target.fields.clone();
        let mut hidden = Vec::new();
        let needed = std::iter::once(relation.foreign_key.clone()).chain(
            subtree
                .children
                .iter()
                .filter_map(|(name, _)| target.get_relation(name).map(|r| r.local_key.clone())),
        );
        for key in needed {
            if !columns.contains(&key) {
                columns.push(key.clone());
                hidden.push(key);
            }
        }

        let backend = self.txn.get_database_backend();
        let mut fetched = Vec::new();
        for chunk in keys.chunks(RELATION_BATCH_SIZE) {
            let values = chunk
                .iter()
                .map(|key| json_to_value(key, backend))
                .collect::<Result<Vec<_>, _>>()?;

            let mut select = Query::select();
            select.from_as(Alias::new(&target.table), Alias::new(BASE_ALIAS));
            for column in &columns {
                select.expr_as(
                    Expr::col((Alias::new(BASE_ALIAS), Alias::new(column))),
                    Alias::new(column),
                );
            }
            select
                .and_where(Expr::col((Alias::new(BASE_ALIAS), Alias::new(&relation.foreign_key))).is_in(values))
                .order_by((Alias::new(BASE_ALIAS), Alias::new(&target.primary_key)), Order::Asc);

            fetched.extend(
                JsonValue::find_by_statement(backend.build(&select))
                    .all(self.txn)
                    .await?,
            );
        }

        Ok(Related {
            rows: fetched,
            hidden,
        })
    }
}

/// Target rows for one relation plus the columns fetched only for joining.
#[derive(Debug, Default)]
struct Related {
    rows: Vec<JsonValue>,
    hidden: Vec<String>,
}

/// Group related rows by foreign key and attach them under the relation name.
fn attach(relation: &RelationDef, rows: &mut [JsonValue], related: Related) {
    let mut by_key: HashMap<String, Vec<JsonValue>> = HashMap::new();
    for mut row in related.rows {
        let Some(key) = row.get(&relation.foreign_key).map(ToString::to_string) else {
            continue;
        };
        strip(std::slice::from_mut(&mut row), &related.hidden);
        by_key.entry(key).or_default().push(row);
    }

    for row in rows.iter_mut() {
        let matches = row
            .get(&relation.local_key)
            .filter(|key| !key.is_null())
            .and_then(|key| by_key.get(&key.to_string()));

        let value = match relation.kind {
            RelationKind::BelongsTo => matches
                .and_then(|m| m.first().cloned())
                .unwrap_or(JsonValue::Null),
            RelationKind::HasMany => JsonValue::Array(matches.cloned().unwrap_or_default()),
        };
        if let Some(object) = row.as_object_mut() {
            object.insert(relation.name.clone(), value);
        }
    }
}

fn strip(rows: &mut [JsonValue], columns: &[String]) {
    if columns.is_empty() {
        return;
    }
    for row in rows {
        if let Some(object) = row.as_object_mut() {
            for column in columns {
                object.remove(column);
            }
        }
    }
}
