use compact_str::CompactString;
use facet::Facet;
use std::collections::BTreeMap;
use std::fmt;

use crate::Key;

/// Rendering of a key that exists on only one side of a diff.
pub const ABSENT: &str = "<absent>";

/// Rendering of a table that was already on the capture path.
pub const CYCLE_MARKER: &str = "<cycle>";

/// Lightweight stand-in for a host object: enough to tell two references
/// apart in a diff, nothing that needs the host to be alive.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct ExternalRef {
    /// Always `true`; lets consumers of exported captures tell descriptors
    /// from ordinary maps.
    pub is_external_ref: bool,
    pub kind: String,
    pub name: String,
}

impl ExternalRef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            is_external_ref: true,
            kind: kind.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {:?}>", self.kind, self.name)
    }
}

/// An owned, isolated copy of a live value. Nothing in here aliases the
/// graph it was taken from.
#[derive(Debug, Clone, PartialEq)]
pub enum Captured {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(CompactString),
    Map(BTreeMap<Key, Captured>),
    External(ExternalRef),
    /// The table was already being copied further up the same path.
    Cycle,
    /// Best-effort string form of a subtree that was too deep or could not be
    /// read.
    Degraded(CompactString),
    /// Debug text of a value with no structure of its own.
    Opaque(CompactString),
}

impl Captured {
    pub fn is_map(&self) -> bool {
        matches!(self, Captured::Map(_))
    }

    pub fn as_map(&self) -> Option<&BTreeMap<Key, Captured>> {
        match self {
            Captured::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<&Captured> {
        self.as_map()?.get(&key.into())
    }

    /// Follows a dot-separated path through nested maps.
    pub fn lookup(&self, path: &str) -> Option<&Captured> {
        path.split('.').try_fold(self, |current, segment| {
            let map = current.as_map()?;
            map.get(&Key::from_segment(segment))
                .or_else(|| map.get(&Key::from(segment)))
        })
    }

    /// The text two leaves are compared by. Strings are quoted so `"2"` and
    /// `2` never compare equal.
    pub fn render(&self) -> String {
        match self {
            Captured::Nil => "nil".to_owned(),
            Captured::Bool(b) => b.to_string(),
            Captured::Int(n) => n.to_string(),
            Captured::Float(x) => x.to_string(),
            Captured::Str(s) => format!("{:?}", s.as_str()),
            Captured::Map(map) => summarize_map(map.len()),
            Captured::External(external) => external.to_string(),
            Captured::Cycle => CYCLE_MARKER.to_owned(),
            Captured::Degraded(text) | Captured::Opaque(text) => text.to_string(),
        }
    }
}

/// Summary used wherever a whole table has to fit on one line.
pub fn summarize_map(len: usize) -> String {
    match len {
        1 => "{1 entry}".to_owned(),
        n => format!("{{{n} entries}}"),
    }
}

impl fmt::Display for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Captured::Map(map) => {
                f.write_str("{")?;
                for (index, (key, value)) in map.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key} = {value}")?;
                }
                f.write_str("}")
            }
            other => f.write_str(&other.render()),
        }
    }
}
