use super::path::FieldPath;
use crate::validation::CompileReport;

/// Build the list of returned columns from `select` and `exclude`.
///
/// `None` means no restriction. `exclude` only narrows an explicit `select`;
/// on its own it does not restrict output. When every selected field is also
/// excluded the result is an empty projection, and rows come back empty.
pub fn compile_projection(
    select: &[String],
    exclude: &[String],
    report: &mut CompileReport,
) -> Option<Vec<String>> {
    if select.is_empty() {
        return None;
    }

    let mut fields: Vec<String> = Vec::with_capacity(select.len());
    for raw in select {
        let name = raw.trim();
        let path = match FieldPath::parse(name) {
            Ok(path) => path,
            Err(reason) => {
                report.drop("select", reason);
                continue;
            }
        };
        if path.is_related() {
            report.drop("select", format!("'{path}' is a relation path; use relations instead"));
            continue;
        }
        if exclude.iter().any(|e| e.trim() == name) || fields.iter().any(|f| f == name) {
            continue;
        }
        fields.push(name.to_string());
    }
    Some(fields)
}
