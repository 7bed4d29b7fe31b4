use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal failure reported by a domain notification stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct SourceError {
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl SourceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Which edit of a transition an error refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EditKind {
    Remove,
    Insert,
    Update,
}

impl std::fmt::Display for EditKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Remove => "remove",
            Self::Insert => "insert",
            Self::Update => "update",
        })
    }
}

/// Reasons a transition is refused by the commit stage.
///
/// A refused transition leaves the list view untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// An edit addressed a row outside the list at the time it would run.
    #[error("{kind} at index {index} is out of range for a list of {len} rows")]
    IndexOutOfRange {
        kind: EditKind,
        index: usize,
        len: usize,
    },
    /// Removals were not strictly descending or insertions not strictly ascending.
    #[error("{kind} indices are not in application order")]
    Unordered { kind: EditKind },
}

/// Errors returned by the transition slot.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    /// The consumer side was torn down.
    #[error("transition slot is closed")]
    Closed,
}
