use std::fmt;

const MAX_SEGMENT_LENGTH: usize = 64;
const MAX_PATH_SEGMENTS: usize = 8;

/// Basic identifier validation for one path segment
fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment.len() <= MAX_SEGMENT_LENGTH
        && !segment.starts_with('_')
        && !segment.starts_with(|c: char| c.is_ascii_digit())
        && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A field reference, optionally reached through a chain of relations.
///
/// `"author.company.name"` is the field `name` reached through the
/// relations `author` then `company`; `"title"` has no relations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    relations: Vec<String>,
    field: String,
}

impl FieldPath {
    /// Parse a dot-separated path, rejecting anything that is not a plain identifier chain.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the path is empty, too deep, or has
    /// a segment that is not `[A-Za-z][A-Za-z0-9_]*`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("field name is empty".to_string());
        }

        let mut segments: Vec<String> = Vec::new();
        for segment in trimmed.split('.') {
            if !is_valid_segment(segment) {
                return Err(format!("'{trimmed}' is not a valid field path"));
            }
            segments.push(segment.to_string());
        }
        if segments.len() > MAX_PATH_SEGMENTS {
            return Err(format!(
                "'{trimmed}' is nested deeper than {MAX_PATH_SEGMENTS} segments"
            ));
        }

        let field = segments.pop().unwrap_or_default();
        Ok(Self {
            relations: segments,
            field,
        })
    }

    #[must_use]
    pub fn column(field: impl Into<String>) -> Self {
        Self {
            relations: Vec::new(),
            field: field.into(),
        }
    }

    /// Relation hops leading to the field, outermost first
    #[must_use]
    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn is_related(&self) -> bool {
        !self.relations.is_empty()
    }

    /// Number of segments including the field itself
    #[must_use]
    pub fn depth(&self) -> usize {
        self.relations.len() + 1
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for relation in &self.relations {
            write!(f, "{relation}.")?;
        }
        write!(f, "{}", self.field)
    }
}

/// Validate a relation path such as `posts.comments` (every segment is a relation name).
///
/// # Errors
///
/// Same rules as [`FieldPath::parse`].
pub fn parse_relation_path(raw: &str) -> Result<Vec<String>, String> {
    let path = FieldPath::parse(raw)?;
    let mut segments = path.relations;
    segments.push(path.field);
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_field() {
        let path = FieldPath::parse("title").unwrap();
        assert_eq!(path.field(), "title");
        assert!(!path.is_related());
        assert_eq!(path.depth(), 1);
    }

    #[test]
    fn test_dotted_path_splits_relations() {
        let path = FieldPath::parse("author.company.name").unwrap();
        assert_eq!(path.relations(), ["author", "company"]);
        assert_eq!(path.field(), "name");
        assert_eq!(path.to_string(), "author.company.name");
        assert_eq!(path.depth(), 3);
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        assert_eq!(FieldPath::parse("  created_at ").unwrap().field(), "created_at");
    }

    #[test]
    fn test_rejects_injection_shaped_names() {
        for raw in [
            "",
            "name; DROP TABLE users",
            "a..b",
            ".name",
            "name.",
            "_private",
            "1column",
            "title\"",
            "author.na me",
        ] {
            assert!(FieldPath::parse(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn test_rejects_overlong_paths() {
        let deep = vec!["a"; MAX_PATH_SEGMENTS + 1].join(".");
        assert!(FieldPath::parse(&deep).is_err());
        assert!(FieldPath::parse(&"x".repeat(MAX_SEGMENT_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_relation_path_segments() {
        assert_eq!(
            parse_relation_path("posts.comments").unwrap(),
            vec!["posts".to_string(), "comments".to_string()]
        );
    }
}
