//! Untyped resource envelope, the unit the store persists and watches.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ObjectKey, ObjectMeta};

/// A resource of any kind with untyped spec and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicObject {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: Value,
    #[serde(default)]
    pub status: Value,
}

impl DynamicObject {
    /// Create an object with empty spec and status.
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>, metadata: ObjectMeta) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            metadata,
            spec: Value::Null,
            status: Value::Null,
        }
    }

    /// Set the spec.
    #[must_use]
    pub fn with_spec(mut self, spec: Value) -> Self {
        self.spec = spec;
        self
    }

    /// Set the status.
    #[must_use]
    pub fn with_status(mut self, status: Value) -> Self {
        self.status = status;
        self
    }

    /// The key identifying this object within its kind.
    pub fn key(&self) -> ObjectKey {
        self.metadata.key()
    }

    /// Resource version the object was read at.
    pub const fn resource_version(&self) -> u64 {
        self.metadata.resource_version
    }
}
