//! Diff-and-prioritize: pick the single most important correction for a resource.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. more desired than observed nodes: add a node
//! 2. fewer desired than observed nodes: remove a node
//! 3. equal counts: correct the lowest-index node whose disk size drifted
//! 4. otherwise the resource is converged
//!
//! Desired and observed nodes are paired by position, so attribute drift is
//! only meaningful once the counts agree. One action per pass keeps each pass
//! small and safe to retry; convergence takes as many passes as there are
//! deltas.

use std::cmp::Ordering;
use std::marker::PhantomData;

use topology_api::{ClusterResource, DynamicObject, NodeSpec, NodeStatus};

use crate::error::{Error, Result};
use crate::types::{Action, NodeAction, NodeAttribute};

/// Compute the highest-priority action for a pair of topologies.
pub fn diff(desired: &[NodeSpec], observed: &[NodeStatus]) -> Option<NodeAction> {
    match desired.len().cmp(&observed.len()) {
        Ordering::Greater => {
            let index = observed.len();
            desired
                .get(index)
                .map(|spec| NodeAction::AddNode { index, spec: *spec })
        }
        Ordering::Less => observed.split_last().map(|(node, rest)| NodeAction::RemoveNode {
            index: rest.len(),
            node: node.clone(),
        }),
        Ordering::Equal => desired
            .iter()
            .zip(observed)
            .position(|(spec, status)| spec.disk_size != status.disk_size)
            .and_then(|index| {
                let spec = desired.get(index)?;
                let status = observed.get(index)?;
                Some(NodeAction::UpdateNodeAttribute {
                    index,
                    attribute: NodeAttribute::DiskSize {
                        desired: spec.disk_size,
                        observed: status.disk_size,
                    },
                })
            }),
    }
}

/// Identifies actions for one resource kind.
pub struct ActionIdentifier<R> {
    _kind: PhantomData<fn() -> R>,
}

impl<R> Default for ActionIdentifier<R> {
    fn default() -> Self {
        Self { _kind: PhantomData }
    }
}

impl<R: ClusterResource> ActionIdentifier<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The kind this identifier accepts.
    pub const fn kind(&self) -> &'static str {
        R::KIND
    }

    /// Identify the action for a typed resource, or `None` if converged.
    pub fn identify(&self, resource: &R) -> Option<Action<R>> {
        diff(resource.spec_nodes(), resource.status_nodes())
            .map(|change| Action::new(resource.clone(), change))
    }

    /// Identify the action for an object read from the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the object is not of kind `R`, or
    /// [`Error::InvalidResource`] if its spec or status cannot be decoded.
    pub fn identify_object(&self, object: &DynamicObject) -> Result<Option<Action<R>>> {
        if object.kind != R::KIND {
            return Err(Error::type_mismatch(R::KIND, object.kind.clone()));
        }
        let resource = R::from_object(object).map_err(|e| Error::from_store("decode", e))?;
        Ok(self.identify(&resource))
    }
}
