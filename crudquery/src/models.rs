use serde::Deserialize;
use serde_with::{PickFirst, StringWithSeparator, formats::CommaSeparator, serde_as};
use std::borrow::Cow;
use utoipa::IntoParams;

use crate::filtering::{FilterGroup, RelationSpec, SearchSpec};
use crate::validation::ValidationError;

/// Query parameters for listing a collection: pagination, sorting, search,
/// filtering, projection and relation expansion.
///
/// # Filtering
/// `filter` is a filter tree, sent either as a JSON object (request bodies) or
/// as a JSON-encoded string (query strings):
/// ```json
/// {"operator": "and",
///  "conditions": [{"field": "status", "operator": "eq", "value": "published"}],
///  "groups": [{"operator": "or", "conditions": [
///      {"field": "views", "operator": "gte", "value": 100},
///      {"field": "author.name", "operator": "contains", "value": "ann"}]}]}
/// ```
///
/// # Lists
/// `searchFields`, `select`, `exclude` and `relations` accept either an array
/// or a comma-separated string, for example `select=id,title`.
///
/// # Sorting
/// `sortBy=author.name,views&sortOrder=ASC,DESC`. Directions pair with fields
/// by position; missing directions repeat the last one given.
#[serde_as]
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Page number, 1-based.
    #[param(example = 1, minimum = 1)]
    pub page: Option<u64>,
    /// Page size.
    #[param(example = 10, minimum = 1, maximum = 100)]
    pub limit: Option<u64>,
    /// Comma-separated sort fields; dotted paths sort on related collections.
    #[param(example = "createdAt,author.name")]
    pub sort_by: Option<String>,
    /// Comma-separated `ASC`/`DESC` tokens paired with `sortBy`.
    #[param(example = "DESC")]
    pub sort_order: Option<String>,
    /// Free-text search term.
    pub search: Option<String>,
    /// Fields to search in, overriding the collection defaults.
    #[serde_as(as = "PickFirst<(_, StringWithSeparator<CommaSeparator, String>)>")]
    #[serde(default)]
    #[param(value_type = Option<Vec<String>>)]
    pub search_fields: Vec<String>,
    /// Filter tree, as an object or a JSON-encoded string.
    #[param(value_type = Option<String>, example = r#"{"conditions":[{"field":"status","operator":"eq","value":"published"}]}"#)]
    pub filter: Option<FilterInput>,
    /// Fields to return; all fields when empty.
    #[serde_as(as = "PickFirst<(_, StringWithSeparator<CommaSeparator, String>)>")]
    #[serde(default)]
    #[param(value_type = Option<Vec<String>>)]
    pub select: Vec<String>,
    /// Fields removed from `select`.
    #[serde_as(as = "PickFirst<(_, StringWithSeparator<CommaSeparator, String>)>")]
    #[serde(default)]
    #[param(value_type = Option<Vec<String>>)]
    pub exclude: Vec<String>,
    /// Relation paths to expand, e.g. `author,comments.author`.
    #[serde_as(as = "PickFirst<(_, StringWithSeparator<CommaSeparator, String>)>")]
    #[serde(default)]
    #[param(value_type = Option<Vec<String>>)]
    pub relations: Vec<String>,
    /// Expand every declared relation; `relations` is ignored.
    #[serde(default)]
    pub load_all: bool,
}

impl ListQuery {
    #[must_use]
    pub fn search_spec(&self) -> Option<SearchSpec> {
        self.search.as_ref().map(|term| SearchSpec {
            term: term.clone(),
            fields: self.search_fields.clone(),
        })
    }

    #[must_use]
    pub fn relation_spec(&self) -> RelationSpec {
        RelationSpec {
            paths: self.relations.clone(),
            load_all: self.load_all,
        }
    }
}

/// The `filter` parameter in either of its transports.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterInput {
    Encoded(String),
    Group(FilterGroup),
}

impl FilterInput {
    /// Decode to a filter tree. A blank string is an empty (match-all) group.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` on `filter` when the string is not a valid
    /// filter tree.
    pub fn decode(&self) -> Result<Cow<'_, FilterGroup>, ValidationError> {
        match self {
            Self::Group(group) => Ok(Cow::Borrowed(group)),
            Self::Encoded(raw) if raw.trim().is_empty() => Ok(Cow::Owned(FilterGroup::default())),
            Self::Encoded(raw) => serde_json::from_str(raw)
                .map(Cow::Owned)
                .map_err(|e| ValidationError::new("filter", format!("Invalid filter JSON: {e}"))),
        }
    }
}

impl From<FilterGroup> for FilterInput {
    fn from(group: FilterGroup) -> Self {
        Self::Group(group)
    }
}
