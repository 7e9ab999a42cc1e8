//! Short display labels for (possibly taxonomic) feature ids.

use std::collections::HashSet;

/// Most specific named segment of a delimited id.
///
/// Empty segments and bare rank placeholders such as `g__` are skipped. An id
/// with no named segment is returned unchanged.
pub fn most_specific(id: &str, delimiter: char) -> &str {
    id.split(delimiter)
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && !segment.ends_with("__"))
        .last()
        .unwrap_or(id)
}

/// One label per id, in order.
///
/// A label already used by an earlier row is rewritten as `"<label> (<row>)*"`
/// so every label stays unique within the figure.
pub fn display_labels(ids: &[String], delimiter: char) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(ids.len());
    ids.iter()
        .enumerate()
        .map(|(row, id)| {
            let base = most_specific(id, delimiter);
            let label = if used.contains(base) {
                format!("{} ({})*", base, row)
            } else {
                base.to_string()
            };
            used.insert(label.clone());
            label
        })
        .collect()
}
