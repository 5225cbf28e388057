//! Error types for the reconciler crate.

use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
///
/// Classification for the trigger layer lives in [`Error::is_retryable`].
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The identifier was handed a resource of another kind. A wiring bug.
    #[error("unexpected resource kind: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Carrying out an action failed.
    #[error("action '{action}' failed: {reason}")]
    ExecutionFailed { action: String, reason: String },

    /// A stored object could not be decoded or failed validation.
    #[error("invalid resource: {reason}")]
    InvalidResource { reason: String },

    /// The resource store failed outside of an action.
    #[error("store {operation} failed: {reason}")]
    Store { operation: String, reason: String },

    /// A reconcile task ended without producing a result.
    #[error("reconcile task failed: {reason}")]
    TaskFailed { reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The controller's watch feed closed.
    #[error("controller stopped: {reason}")]
    ControllerStopped { reason: String },
}

impl Error {
    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an execution failed error.
    pub fn execution_failed(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            action: action.into(),
            reason: reason.into(),
        }
    }

    /// Create a store error.
    pub fn store(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid resource error.
    pub fn invalid_resource(reason: impl Into<String>) -> Self {
        Self::InvalidResource {
            reason: reason.into(),
        }
    }

    /// Create a task failed error.
    pub fn task_failed(reason: impl Into<String>) -> Self {
        Self::TaskFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a controller stopped error.
    pub fn controller_stopped(reason: impl Into<String>) -> Self {
        Self::ControllerStopped {
            reason: reason.into(),
        }
    }

    /// Map a store error raised during `operation`.
    ///
    /// Decoding an object of the wrong kind stays a [`Error::TypeMismatch`];
    /// an undecodable or invalid object becomes [`Error::InvalidResource`].
    pub fn from_store(operation: &str, err: topology_api::Error) -> Self {
        match err {
            topology_api::Error::TypeMismatch { expected, found } => {
                Self::TypeMismatch { expected, found }
            }
            err @ (topology_api::Error::Serialization { .. }
            | topology_api::Error::InvalidResource { .. }) => {
                Self::invalid_resource(format!("{operation}: {err}"))
            }
            other => Self::store(operation, other.to_string()),
        }
    }

    /// Whether the trigger layer should retry the pass with backoff.
    ///
    /// Type mismatches, undecodable objects and configuration errors need a
    /// code, manifest or config change first.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ExecutionFailed { .. } | Self::Store { .. } | Self::TaskFailed { .. } => true,
            Self::TypeMismatch { .. }
            | Self::InvalidResource { .. }
            | Self::InvalidConfig { .. }
            | Self::ControllerStopped { .. } => false,
        }
    }
}
