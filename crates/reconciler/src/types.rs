//! Core types for the reconciler.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use topology_api::{ClusterResource, NodeSpec, NodeStatus, ObjectKey};

use crate::error::Result;
use crate::executor::ActionExecutor;

/// A node attribute that can drift between desired and observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAttribute {
    DiskSize { desired: u64, observed: u64 },
}

impl NodeAttribute {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DiskSize { .. } => "disk_size",
        }
    }
}

impl fmt::Display for NodeAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiskSize { desired, observed } => {
                write!(f, "disk_size {observed} -> {desired}")
            }
        }
    }
}

/// One unit of corrective work.
///
/// Each variant carries what its executor needs, so execution never has to
/// re-derive the delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeAction {
    /// Provision the first desired node with no observed counterpart.
    AddNode { index: usize, spec: NodeSpec },
    /// Decommission the tail observed node.
    RemoveNode { index: usize, node: NodeStatus },
    /// Correct one attribute on one node.
    UpdateNodeAttribute {
        index: usize,
        attribute: NodeAttribute,
    },
}

impl NodeAction {
    /// The node index this action targets.
    pub const fn index(&self) -> usize {
        match self {
            Self::AddNode { index, .. }
            | Self::RemoveNode { index, .. }
            | Self::UpdateNodeAttribute { index, .. } => *index,
        }
    }

    /// Stable name for logs and errors.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddNode { .. } => "add_node",
            Self::RemoveNode { .. } => "remove_node",
            Self::UpdateNodeAttribute { .. } => "update_node_attribute",
        }
    }

    /// Get a description of the action.
    pub fn description(&self) -> String {
        match self {
            Self::AddNode { index, spec } => {
                format!("add node {index} (disk_size {})", spec.disk_size)
            }
            Self::RemoveNode { index, node } if node.address.is_empty() => {
                format!("remove node {index}")
            }
            Self::RemoveNode { index, node } => {
                format!("remove node {index} ({})", node.address)
            }
            Self::UpdateNodeAttribute { index, attribute } => {
                format!("update node {index} {attribute}")
            }
        }
    }
}

impl fmt::Display for NodeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// An identified action bound to the resource it corrects.
///
/// Built fresh for one reconciliation pass and dropped after execution.
#[derive(Debug, Clone)]
pub struct Action<R> {
    resource: R,
    change: NodeAction,
}

impl<R: ClusterResource> Action<R> {
    pub const fn new(resource: R, change: NodeAction) -> Self {
        Self { resource, change }
    }

    /// The resource as read at the start of the pass.
    pub const fn resource(&self) -> &R {
        &self.resource
    }

    pub const fn change(&self) -> &NodeAction {
        &self.change
    }

    pub fn key(&self) -> ObjectKey {
        self.resource.key()
    }

    /// Carry out the action.
    ///
    /// # Errors
    ///
    /// Returns whatever the executor reports; execution errors are retryable.
    pub async fn execute(&self, executor: &dyn ActionExecutor<R>) -> Result<()> {
        executor.execute(&self.resource, &self.change).await
    }

    /// Take the action description out, dropping the resource snapshot.
    pub fn into_change(self) -> NodeAction {
        self.change
    }
}

/// What a single pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassResult {
    /// The resource no longer exists.
    NotFound,
    /// Desired and observed topologies match.
    Converged,
    /// One action was executed successfully.
    Executed(NodeAction),
}

/// Result of one reconciliation pass, as consumed by the trigger layer.
///
/// Errors travel separately as `Err`, completing the
/// (requeue, requeue-after, error) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub requeue: bool,
    pub requeue_after: Option<Duration>,
    pub result: PassResult,
}

impl ReconcileOutcome {
    /// Terminal outcome, no requeue.
    pub const fn done(result: PassResult) -> Self {
        Self {
            requeue: false,
            requeue_after: None,
            result,
        }
    }

    /// Ask the trigger layer to run another pass after `delay`.
    pub const fn requeue_after(result: PassResult, delay: Duration) -> Self {
        Self {
            requeue: true,
            requeue_after: Some(delay),
            result,
        }
    }

    pub const fn is_converged(&self) -> bool {
        matches!(self.result, PassResult::Converged)
    }
}
