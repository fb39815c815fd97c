use compact_str::CompactString;
use facet::Facet;
use std::fmt;

use crate::PTime;

////////////////////////////////////////////////////////////////////////////////////
// Diffs
////////////////////////////////////////////////////////////////////////////////////

/// One leaf-level difference between two captures.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    /// Dot-joined key path; empty when the roots themselves differ.
    pub path: String,
    pub before: String,
    pub after: String,
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "<root>"
        } else {
            self.path.as_str()
        };
        write!(f, "{path}: {} -> {}", self.before, self.after)
    }
}

////////////////////////////////////////////////////////////////////////////////////
// Reports
////////////////////////////////////////////////////////////////////////////////////

/// Severity of a dispatched message.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum Level {
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    /// Header prepended to every dispatched message of this level.
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "[INFO]",
            Level::Warn => "[WARN]",
            Level::Error => "[ERROR]",
            Level::Fatal => "[FATAL]",
        }
    }

    /// Error and fatal messages go to the error sink; everything else is
    /// informational.
    pub fn is_error_severity(self) -> bool {
        matches!(self, Level::Error | Level::Fatal)
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "fatal" => Some(Level::Fatal),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        })
    }
}

/// A message after aggregation, as delivered to subscribers.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub level: Level,
    /// Fully formatted text, including the level tag and, when the message
    /// repeated inside its window, the `(xN Events)` suffix.
    pub message: String,
    /// How many identical dispatches were folded into this report.
    pub count: u32,
    pub emitted_at: PTime,
}

/// Who a published report is meant for. Subscribers decide what to do with
/// targets they don't recognize.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Target {
    #[default]
    Broadcast,
    Named(CompactString),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Broadcast => f.write_str("*"),
            Target::Named(name) => f.write_str(name),
        }
    }
}

/// Per-publish options passed through to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublishOptions {
    /// Component that produced the report (`"dispatch"`, `"guard"`, ...).
    pub origin: Option<CompactString>,
}

impl PublishOptions {
    pub fn from_origin(origin: impl Into<CompactString>) -> Self {
        Self {
            origin: Some(origin.into()),
        }
    }
}
