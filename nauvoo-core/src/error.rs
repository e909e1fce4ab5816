//! Error taxonomy shared by every subsystem.
use std::fmt;
use thiserror::Error;

/// Kind of entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Character,
    DialogueTree,
    DialogueNode,
    Action,
    Event,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::DialogueTree => "dialogue tree",
            Self::DialogueNode => "dialogue node",
            Self::Action => "action",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of list an index was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Choice,
    Injury,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Choice => "choice",
            Self::Injury => "injury",
        })
    }
}

/// Recoverable failures reported by the engine. State is unchanged whenever one is returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SimError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("{kind} index {index} out of range (len {len})")]
    InvalidIndex {
        kind: IndexKind,
        index: usize,
        len: usize,
    },
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },
}

impl SimError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn invalid_index(kind: IndexKind, index: usize, len: usize) -> Self {
        Self::InvalidIndex { kind, index, len }
    }
}

/// Result alias for engine operations.
pub type SimResult<T> = Result<T, SimError>;

/// Errors raised when authored content violates structural rules.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("schedule for {character}: activity {index} has empty or out-of-day interval {start}..{end}")]
    ActivityBounds {
        character: String,
        index: usize,
        start: u32,
        end: u32,
    },
    #[error("schedule for {character}: activity {index} overlaps or precedes the previous one")]
    ActivityOrder { character: String, index: usize },
    #[error("dialogue tree {tree}: root node {root} missing")]
    MissingRoot { tree: String, root: String },
    #[error("dialogue tree {tree}: duplicate node id {node}")]
    DuplicateNode { tree: String, node: String },
    #[error("dialogue tree {tree}: node {node} points at unknown node {target}")]
    DanglingNode {
        tree: String,
        node: String,
        target: String,
    },
    #[error("dialogue tree {tree}: node {node} can loop without player input")]
    InputFreeCycle { tree: String, node: String },
    #[error("dialogue tree {tree} references unknown action {action}")]
    UnknownAction { tree: String, action: String },
    #[error("duplicate character id {0}")]
    DuplicateCharacter(String),
    #[error("content references unknown character {0}")]
    UnknownCharacter(String),
    #[error("failed to parse content: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ContentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Fatal failures while loading a persisted world. They never touch a running world.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("save blob could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unsupported save format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("save checksum mismatch (stored {stored:#018x}, computed {computed:#018x})")]
    ChecksumMismatch { stored: u64, computed: u64 },
    #[error("{field} out of range: {value}")]
    OutOfRange { field: String, value: String },
    #[error("missing required field {0}")]
    MissingField(String),
}

impl SnapshotError {
    pub(crate) fn out_of_range(field: impl Into<String>, value: impl fmt::Display) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value: value.to_string(),
        }
    }
}
