//! Cycle-safe, depth-bounded copying of live values.
//!
//! A capture walks the graph depth-first. The visited set holds the identity
//! of every table on the current path only: a table reached again through a
//! sibling is copied again, a table reached again through its own descendants
//! becomes [`Captured::Cycle`]. The set lives for one call.

use std::collections::{BTreeMap, HashSet};

use compact_str::CompactString;
use vigil_types::{CaptureError, Captured, ExternalRef, Key, TableId, Value, summarize_map};

use crate::unwind::catch_panic;

pub const DEFAULT_MAX_DEPTH: usize = 12;

/// Text a table degrades to when it is write-locked mid-capture.
pub const LOCKED_MARKER: &str = "<locked table>";

/// Text an external degrades to when its `kind` or `name` panics.
pub const UNREADABLE_EXTERNAL: &str = "<unreadable external>";

pub const UNREADABLE_OPAQUE: &str = "<unreadable opaque>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Tables nested deeper than this are replaced by a one-line summary.
    /// The root is depth 0.
    pub max_depth: usize,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Copies `value` with default options. Never fails: anything that cannot be
/// copied degrades to its string form.
pub fn capture(value: &Value) -> Captured {
    capture_with(value, CaptureOptions::default())
}

pub fn capture_with(value: &Value, options: CaptureOptions) -> Captured {
    Walker::new(options).walk(value, 0)
}

/// Like [`capture_with`], but fails instead of degrading when the root table
/// itself cannot be read.
pub fn try_capture(value: &Value, options: CaptureOptions) -> Result<Captured, CaptureError> {
    let mut walker = Walker::new(options);
    let Value::Table(table) = value else {
        return Ok(walker.walk(value, 0));
    };
    let entries = table.try_read().ok_or(CaptureError::Locked)?;
    if walker.options.max_depth == 0 {
        return Ok(Captured::Degraded(CompactString::from(summarize_map(entries.len()))));
    }
    let children = entries.iter().map(|(key, child)| (key.clone(), child.clone())).collect();
    drop(entries);
    Ok(walker.copy_children(table.identity(), children, 0))
}

struct Walker {
    options: CaptureOptions,
    on_path: HashSet<TableId>,
}

impl Walker {
    fn new(options: CaptureOptions) -> Self {
        Self {
            options,
            on_path: HashSet::new(),
        }
    }

    fn walk(&mut self, value: &Value, depth: usize) -> Captured {
        match value {
            Value::Nil => Captured::Nil,
            Value::Bool(b) => Captured::Bool(*b),
            Value::Int(n) => Captured::Int(*n),
            Value::Float(x) => Captured::Float(*x),
            Value::Str(s) => Captured::Str(s.clone()),
            // Host objects and debug impls are foreign code; a panic there
            // costs only this field.
            Value::External(object) => {
                match catch_panic(|| ExternalRef::new(object.kind(), object.name())) {
                    Ok(descriptor) => Captured::External(descriptor),
                    Err(_) => Captured::Degraded(CompactString::from(UNREADABLE_EXTERNAL)),
                }
            }
            Value::Opaque(object) => match catch_panic(|| format!("<opaque {object:?}>")) {
                Ok(text) => Captured::Opaque(CompactString::from(text)),
                Err(_) => Captured::Degraded(CompactString::from(UNREADABLE_OPAQUE)),
            },
            Value::Table(table) => {
                let id = table.identity();
                if self.on_path.contains(&id) {
                    return Captured::Cycle;
                }
                let Some(entries) = table.try_read() else {
                    return Captured::Degraded(CompactString::from(LOCKED_MARKER));
                };
                if depth >= self.options.max_depth {
                    return Captured::Degraded(CompactString::from(summarize_map(entries.len())));
                }

                // Children are cloned out so the read guard is released before
                // recursing; a child may hold a handle back to this table.
                let children = entries
                    .iter()
                    .map(|(key, child)| (key.clone(), child.clone()))
                    .collect();
                drop(entries);
                self.copy_children(id, children, depth)
            }
        }
    }

    fn copy_children(&mut self, id: TableId, children: Vec<(Key, Value)>, depth: usize) -> Captured {
        self.on_path.insert(id);
        let mut map = BTreeMap::new();
        for (key, child) in children {
            let copied = self.walk(&child, depth + 1);
            map.insert(key, copied);
        }
        self.on_path.remove(&id);
        Captured::Map(map)
    }
}
