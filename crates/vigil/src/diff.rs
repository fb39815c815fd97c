use std::collections::BTreeSet;

use vigil_types::{ABSENT, Captured, DiffEntry};

/// Structural difference between two captures, one entry per unequal leaf,
/// in key order. An empty result means nothing changed.
pub fn diff(before: &Captured, after: &Captured) -> Vec<DiffEntry> {
    let mut out = Vec::new();
    diff_into(before, after, &mut String::new(), &mut out);
    out
}

fn diff_into(before: &Captured, after: &Captured, path: &mut String, out: &mut Vec<DiffEntry>) {
    let (Captured::Map(left), Captured::Map(right)) = (before, after) else {
        push_if_unequal(path, before.render(), after.render(), out);
        return;
    };

    let keys: BTreeSet<_> = left.keys().chain(right.keys()).collect();
    for key in keys {
        let restore = path.len();
        if !path.is_empty() {
            path.push('.');
        }
        path.push_str(&key.to_string());

        match (left.get(key), right.get(key)) {
            (Some(l @ Captured::Map(_)), Some(r @ Captured::Map(_))) => diff_into(l, r, path, out),
            (l, r) => push_if_unequal(path, render_slot(l), render_slot(r), out),
        }

        path.truncate(restore);
    }
}

fn render_slot(slot: Option<&Captured>) -> String {
    slot.map_or_else(|| ABSENT.to_owned(), Captured::render)
}

fn push_if_unequal(path: &str, before: String, after: String, out: &mut Vec<DiffEntry>) {
    if before != after {
        out.push(DiffEntry {
            path: path.to_owned(),
            before,
            after,
        });
    }
}
