use super::path::parse_relation_path;
use crate::validation::CompileReport;

/// Requested relation expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationSpec {
    pub paths: Vec<String>,
    /// Load every declared relation; `paths` is then ignored
    pub load_all: bool,
}

/// Normalize the relation list: validate, de-duplicate, then order by depth.
///
/// With `load_all`, `declared` supplies the collection's relation names and
/// `paths` is ignored. `additional` (caller-mandated relations) is merged in
/// either way. The sort is stable, so paths of equal depth keep request order.
pub fn expand_relations(
    spec: &RelationSpec,
    additional: &[String],
    declared: impl FnOnce() -> Vec<String>,
    report: &mut CompileReport,
) -> Vec<String> {
    let requested: Vec<String> = if spec.load_all {
        declared()
    } else {
        spec.paths.clone()
    };

    let mut relations: Vec<(usize, String)> = Vec::new();
    for raw in requested.iter().chain(additional) {
        match parse_relation_path(raw) {
            Ok(segments) => {
                let normalized = segments.join(".");
                if !relations.iter().any(|(_, r)| *r == normalized) {
                    relations.push((segments.len(), normalized));
                }
            }
            Err(reason) => report.drop("relations", reason),
        }
    }

    relations.sort_by_key(|(depth, _)| *depth);
    relations.into_iter().map(|(_, r)| r).collect()
}
