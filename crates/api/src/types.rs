//! Schema types shared by every cluster resource kind.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};

/// Namespace used when a manifest does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Identity of a resource within its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    /// Create a new object key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key in the default namespace.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(DEFAULT_NAMESPACE, name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Standard object metadata.
///
/// `uid`, `generation`, `resource_version` and `creation_timestamp` are owned by
/// the store; values supplied by a manifest are overwritten on create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Ulid>,
    /// Bumped whenever the spec changes.
    #[serde(default)]
    pub generation: u64,
    /// Bumped on every write; used for optimistic concurrency.
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Metadata for a new object.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Metadata in the default namespace.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(DEFAULT_NAMESPACE, name)
    }

    /// The key this metadata identifies.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// Desired attributes of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    #[serde(default)]
    pub disk_size: u64,
}

impl NodeSpec {
    /// Create a node spec.
    pub const fn new(disk_size: u64) -> Self {
        Self { disk_size }
    }
}

/// Observed attributes of one node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    /// Empty until the node has been provisioned.
    #[serde(rename = "ip", alias = "address", default)]
    pub address: String,
    #[serde(default)]
    pub disk_size: u64,
}

impl NodeStatus {
    /// Create a node status.
    pub fn new(address: impl Into<String>, disk_size: u64) -> Self {
        Self {
            address: address.into(),
            disk_size,
        }
    }
}

/// Desired topology.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterSpec {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

impl ClusterSpec {
    /// Create a spec from node disk sizes.
    pub fn with_disk_sizes(sizes: impl IntoIterator<Item = u64>) -> Self {
        Self {
            nodes: sizes.into_iter().map(NodeSpec::new).collect(),
        }
    }

    /// Reject specs that ask for a node without disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResource`] naming the first node whose `diskSize` is zero.
    pub fn validate(&self, key: &ObjectKey) -> Result<()> {
        match self.nodes.iter().position(|node| node.disk_size == 0) {
            Some(index) => Err(Error::invalid_resource(
                key.clone(),
                format!("spec.nodes[{index}].diskSize must be positive"),
            )),
            None => Ok(()),
        }
    }
}

/// Observed topology.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterStatus {
    #[serde(default)]
    pub nodes: Vec<NodeStatus>,
}
