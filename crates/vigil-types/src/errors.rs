use compact_str::CompactString;
use std::error::Error;
use std::fmt;

use crate::SnapshotId;

/// The root of a capture could not be read at all. Anything below the root
/// degrades in place instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    Locked,
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "root table is write-locked and cannot be captured"),
        }
    }
}

impl Error for CaptureError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    MissingSnapshot(SnapshotId),
    Capture(CaptureError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSnapshot(id) => write!(f, "no snapshot with id {id}"),
            Self::Capture(_) => write!(f, "live target could not be captured"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Capture(source) => Some(source),
            Self::MissingSnapshot(_) => None,
        }
    }
}

impl From<CaptureError> for StoreError {
    fn from(value: CaptureError) -> Self {
        Self::Capture(value)
    }
}

/// A structural read or write named a path that does not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    InvalidPath { path: String, segment: String },
    NotATable { path: String },
    Locked { path: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPath { path, segment } if segment.is_empty() => {
                write!(f, "invalid path {path:?}: empty segment")
            }
            Self::InvalidPath { path, segment } => {
                write!(f, "invalid path {path:?}: segment {segment:?} does not exist")
            }
            Self::NotATable { path } => write!(f, "{path} is not a table"),
            Self::Locked { path } => write!(f, "cannot access {path}: table is locked"),
        }
    }
}

impl Error for PathError {}

////////////////////////////////////////////////////////////////////////////////////
// Failures of units of work
////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The work returned an error.
    Error,
    /// The work panicked.
    Panic,
    /// The task running the work was cancelled before finishing.
    Cancelled,
}

/// Why a unit of work did not produce a value. Cheap to clone so every
/// handler attached to an outcome can see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    kind: FailureKind,
    message: CompactString,
}

impl Failure {
    pub fn error(message: impl fmt::Display) -> Self {
        Self {
            kind: FailureKind::Error,
            message: CompactString::from(message.to_string()),
        }
    }

    pub fn panic(message: impl fmt::Display) -> Self {
        Self {
            kind: FailureKind::Panic,
            message: CompactString::from(message.to_string()),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            message: CompactString::from("cancelled"),
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::Error => f.write_str(&self.message),
            FailureKind::Panic => write!(f, "panicked: {}", self.message),
            FailureKind::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl Error for Failure {}
