use super::operators::LikeShape;
use super::path::FieldPath;
use super::predicate::{Comparator, Predicate};
use crate::validation::CompileReport;

/// Free-text search over a list of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSpec {
    pub term: String,
    /// Explicit per-request fields; empty means "use the defaults"
    pub fields: Vec<String>,
}

/// Turns a search term into an OR of case-insensitive substring matches.
pub struct SearchCompiler {
    max_length: usize,
    max_fields: usize,
}

impl SearchCompiler {
    #[must_use]
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            max_fields: usize::MAX,
        }
    }

    /// Fail the request when it names more than `max` distinct fields.
    /// Server-side defaults are not counted.
    #[must_use]
    pub fn with_max_fields(mut self, max: usize) -> Self {
        self.max_fields = max;
        self
    }

    /// Compile `spec`, falling back to `default_fields` when it names none.
    ///
    /// Returns `None` (no predicate contributed) when the term is blank or no
    /// field can be resolved. A search that cannot say *where* to look is
    /// ignored rather than matching everything or failing the request.
    pub fn compile(
        &self,
        spec: &SearchSpec,
        default_fields: &[String],
        report: &mut CompileReport,
    ) -> Option<Predicate> {
        let term = spec.term.trim();
        if term.is_empty() {
            return None;
        }

        let fields = if spec.fields.is_empty() {
            default_fields
        } else {
            let mut requested: Vec<&str> = spec.fields.iter().map(String::as_str).collect();
            requested.sort_unstable();
            requested.dedup();
            if requested.len() > self.max_fields {
                report.fatal(
                    "searchFields",
                    format!("{} fields exceed the limit of {}", requested.len(), self.max_fields),
                );
                return None;
            }
            spec.fields.as_slice()
        };
        if fields.is_empty() {
            tracing::debug!(term = %term, "Search term ignored: no search fields configured");
            return None;
        }

        let term: String = term.chars().take(self.max_length).collect();
        let pattern = LikeShape::Contains.pattern(&term);

        let mut seen: Vec<&str> = Vec::with_capacity(fields.len());
        let mut branches = Vec::with_capacity(fields.len());
        for raw in fields {
            if seen.contains(&raw.as_str()) {
                continue;
            }
            seen.push(raw);
            match FieldPath::parse(raw) {
                Ok(path) => branches.push(Predicate::leaf(
                    path,
                    Comparator::Like {
                        pattern: pattern.clone(),
                        case_insensitive: true,
                    },
                )),
                Err(reason) => report.drop(format!("searchFields.{raw}"), reason),
            }
        }

        let predicate = Predicate::any(branches);
        if predicate.is_none() {
            tracing::debug!(term = %term, "Search term ignored: no valid search fields");
        }
        predicate
    }
}
