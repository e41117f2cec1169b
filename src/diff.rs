use std::collections::HashSet;

/// Names present in `source` but absent from `destination`.
///
/// Builds a membership set from `destination` and scans `source` once, so the
/// result keeps the source listing order. Both inputs are expected to be free
/// of duplicates, which a single listing guarantees.
pub fn diff(source: Vec<String>, destination: &[String]) -> Vec<String> {
    let existing: HashSet<&str> = destination.iter().map(String::as_str).collect();

    source
        .into_iter()
        .filter(|name| !existing.contains(name.as_str()))
        .collect()
}
