//! Comma separated APN type lists.

const WILDCARD: &str = "*";

fn split(types: &str) -> impl Iterator<Item = &str> {
    types.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// Union of two type lists, existing order first.
///
/// A `*` on either side absorbs everything else.
pub fn union(existing: &str, incoming: &str) -> String {
    let mut merged: Vec<&str> = Vec::new();
    for t in split(existing).chain(split(incoming)) {
        if t == WILDCARD {
            return WILDCARD.to_string();
        }
        if !merged.iter().any(|m| m.eq_ignore_ascii_case(t)) {
            merged.push(t);
        }
    }
    merged.join(",")
}
