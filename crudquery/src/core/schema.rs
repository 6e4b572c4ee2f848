use std::collections::HashMap;

use super::traits::CollectionMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Many-to-one: the local row holds the reference (`posts.author_id`)
    BelongsTo,
    /// One-to-many: target rows reference the local row (`comments.post_id`)
    HasMany,
}

/// A named relation from one collection to another.
///
/// In both directions the join condition is `local.local_key = target.foreign_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub name: String,
    /// Target collection name
    pub target: String,
    pub local_key: String,
    pub foreign_key: String,
    pub kind: RelationKind,
}

/// Fields and relations of one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    pub fields: Vec<String>,
    pub relations: Vec<RelationDef>,
    /// Fields searched when a request names none
    pub search_fields: Vec<String>,
}

impl CollectionSchema {
    /// Create a schema whose table has the same name as the collection.
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        let name = name.into();
        let primary_key = primary_key.into();
        Self {
            table: name.clone(),
            name,
            fields: vec![primary_key.clone()],
            primary_key,
            relations: Vec::new(),
            search_fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: &[&str]) -> Self {
        for field in fields {
            if !self.has_field(field) {
                self.fields.push((*field).to_string());
            }
        }
        self
    }

    #[must_use]
    pub fn searchable(mut self, fields: &[&str]) -> Self {
        self.search_fields = fields.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn belongs_to(self, name: &str, target: &str, local_key: &str, foreign_key: &str) -> Self {
        self.relation(RelationKind::BelongsTo, name, target, local_key, foreign_key)
    }

    #[must_use]
    pub fn has_many(self, name: &str, target: &str, local_key: &str, foreign_key: &str) -> Self {
        self.relation(RelationKind::HasMany, name, target, local_key, foreign_key)
    }

    fn relation(
        mut self,
        kind: RelationKind,
        name: &str,
        target: &str,
        local_key: &str,
        foreign_key: &str,
    ) -> Self {
        self.relations.push(RelationDef {
            name: name.to_string(),
            target: target.to_string(),
            local_key: local_key.to_string(),
            foreign_key: foreign_key.to_string(),
            kind,
        });
        self
    }

    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    #[must_use]
    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// In-memory [`CollectionMetadata`] built once at startup.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    collections: HashMap<String, CollectionSchema>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, schema: CollectionSchema) -> Self {
        self.register(schema);
        self
    }

    pub fn register(&mut self, schema: CollectionSchema) {
        self.collections.insert(schema.name.clone(), schema);
    }
}

impl CollectionMetadata for SchemaRegistry {
    fn schema(&self, collection: &str) -> Option<&CollectionSchema> {
        self.collections.get(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new()
            .with(
                CollectionSchema::new("posts", "id")
                    .fields(&["title", "author_id"])
                    .searchable(&["title"])
                    .belongs_to("author", "authors", "author_id", "id")
                    .has_many("comments", "comments", "id", "post_id"),
            )
            .with(CollectionSchema::new("authors", "id").fields(&["name"]))
    }

    #[test]
    fn test_schema_builder() {
        let registry = registry();
        let posts = registry.schema("posts").unwrap();
        assert_eq!(posts.table, "posts");
        assert_eq!(posts.fields, ["id", "title", "author_id"]);
        assert!(posts.has_field("title"));
        assert!(!posts.has_field("password"));
        assert_eq!(posts.get_relation("author").unwrap().kind, RelationKind::BelongsTo);
        assert!(posts.get_relation("tags").is_none());
    }

    #[test]
    fn test_metadata_defaults() {
        let registry = registry();
        assert_eq!(registry.relation_names("posts"), ["author", "comments"]);
        assert!(registry.relation_names("authors").is_empty());
        assert!(registry.relation_names("unknown").is_empty());
        assert_eq!(registry.default_search_fields("posts"), ["title"]);
    }

    #[test]
    fn test_custom_table_name() {
        let schema = CollectionSchema::new("people", "id").table("app_people");
        assert_eq!(schema.table, "app_people");
        assert_eq!(schema.name, "people");
    }
}
