//! Error types for the resource API crate.

use thiserror::Error;

use crate::types::ObjectKey;

/// Result type alias for resource API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Resource store and schema errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Optimistic concurrency check failed on write.
    #[error("conflict writing {kind} '{key}': expected resource version {expected}, found {actual}")]
    Conflict {
        kind: String,
        key: ObjectKey,
        expected: u64,
        actual: u64,
    },

    /// Create of an object that already exists.
    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: String, key: ObjectKey },

    /// Write to an object that does not exist.
    #[error("{kind} '{key}' not found")]
    NotFound { kind: String, key: ObjectKey },

    /// An object of one kind was decoded as another.
    #[error("unexpected resource kind: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Kind has not been registered.
    #[error("unknown resource kind '{kind}'")]
    UnknownKind { kind: String },

    /// Object failed schema validation.
    #[error("invalid resource '{key}': {reason}")]
    InvalidResource { key: ObjectKey, reason: String },

    /// Spec or status could not be (de)serialized.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// Watch subscriber fell behind and missed events.
    #[error("watch lagged, {skipped} events skipped")]
    WatchLagged { skipped: u64 },

    /// Watch channel closed.
    #[error("watch channel closed")]
    ChannelClosed,

    /// File or parse error from the core crate.
    #[error(transparent)]
    Core(#[from] topology_core::Error),
}

impl Error {
    /// Create a conflict error.
    pub fn conflict(kind: impl Into<String>, key: ObjectKey, expected: u64, actual: u64) -> Self {
        Self::Conflict {
            kind: kind.into(),
            key,
            expected,
            actual,
        }
    }

    /// Create an already-exists error.
    pub fn already_exists(kind: impl Into<String>, key: ObjectKey) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            key,
        }
    }

    /// Create a not found error.
    pub fn not_found(kind: impl Into<String>, key: ObjectKey) -> Self {
        Self::NotFound {
            kind: kind.into(),
            key,
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an unknown kind error.
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind { kind: kind.into() }
    }

    /// Create an invalid resource error.
    pub fn invalid_resource(key: ObjectKey, reason: impl Into<String>) -> Self {
        Self::InvalidResource {
            key,
            reason: reason.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    /// Whether a write failed only because another writer got there first.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
