//! Action execution.

use std::sync::Arc;

use async_trait::async_trait;
use topology_api::{ClusterResource, ResourceStore, TypedStoreExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::provisioner::NodeProvisioner;
use crate::types::{NodeAction, NodeAttribute};

/// Trait for executing node actions against a resource.
///
/// Success means the change was applied and recorded; the caller observes the
/// new topology only on its next read of the store.
#[async_trait]
pub trait ActionExecutor<R: ClusterResource>: Send + Sync {
    /// Execute an action.
    async fn execute(&self, resource: &R, action: &NodeAction) -> Result<()>;
}

/// Executor that drives a [`NodeProvisioner`] and records the result as the
/// resource's new status.
///
/// The status write carries the resource version read at the start of the
/// pass, so a concurrent writer turns into a retryable conflict rather than a
/// lost update. Infrastructure changes and the status write are not atomic: if
/// the write fails after the provisioner succeeded, the next pass re-derives
/// the delta from whatever the store holds.
pub struct ProvisioningExecutor {
    store: Arc<dyn ResourceStore>,
    provisioner: Arc<dyn NodeProvisioner>,
}

impl ProvisioningExecutor {
    /// Create a new provisioning executor.
    pub fn new(store: Arc<dyn ResourceStore>, provisioner: Arc<dyn NodeProvisioner>) -> Self {
        Self { store, provisioner }
    }
}

#[async_trait]
impl<R: ClusterResource> ActionExecutor<R> for ProvisioningExecutor {
    async fn execute(&self, resource: &R, action: &NodeAction) -> Result<()> {
        let key = resource.key();
        let mut next = resource.clone();

        match action {
            NodeAction::AddNode { index, spec } => {
                let node = self.provisioner.provision(&key, *index, spec).await?;
                next.status_mut().nodes.push(node);
            }
            NodeAction::RemoveNode { index, node } => {
                self.provisioner.decommission(&key, node).await?;
                next.status_mut().nodes.truncate(*index);
            }
            NodeAction::UpdateNodeAttribute {
                index,
                attribute: NodeAttribute::DiskSize { desired, .. },
            } => {
                let current = resource.status_nodes().get(*index).ok_or_else(|| {
                    Error::execution_failed(action.name(), format!("node {index} is not observed"))
                })?;
                let resized = self.provisioner.resize_disk(&key, current, *desired).await?;
                if let Some(slot) = next.status_mut().nodes.get_mut(*index) {
                    *slot = resized;
                }
            }
        }

        let written = self
            .store
            .update_status_typed(&next)
            .await
            .map_err(|e| Error::execution_failed(action.name(), e.to_string()))?;

        debug!(
            kind = R::KIND,
            key = %key,
            resource_version = written.metadata().resource_version,
            nodes = written.status_nodes().len(),
            "Recorded observed topology"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::provisioner::SimulatedProvisioner;
    use topology_api::{
        CassandraCluster, ClusterSpec, ClusterStatus, InMemoryResourceStore, NodeSpec, NodeStatus,
        ObjectMeta,
    };

    struct Fixture {
        store: Arc<InMemoryResourceStore>,
        provisioner: Arc<SimulatedProvisioner>,
        executor: ProvisioningExecutor,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryResourceStore::new());
        let provisioner = Arc::new(SimulatedProvisioner::default());
        let executor = ProvisioningExecutor::new(store.clone(), provisioner.clone());
        Fixture {
            store,
            provisioner,
            executor,
        }
    }

    async fn seed(store: &InMemoryResourceStore, desired: &[u64], observed: Vec<NodeStatus>) -> CassandraCluster {
        let ring = CassandraCluster::new(
            ObjectMeta::new("prod", "ring"),
            ClusterSpec::with_disk_sizes(desired.iter().copied()),
        )
        .with_status(ClusterStatus { nodes: observed });
        store.create_typed(&ring).await.unwrap()
    }

    async fn reread(store: &InMemoryResourceStore, ring: &CassandraCluster) -> CassandraCluster {
        store.get_typed(&ring.key()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_add_node_appends_status() {
        let f = fixture();
        let ring = seed(&f.store, &[1024], vec![]).await;

        let action = NodeAction::AddNode {
            index: 0,
            spec: NodeSpec::new(1024),
        };
        f.executor.execute(&ring, &action).await.unwrap();

        let after = reread(&f.store, &ring).await;
        assert_eq!(after.status_nodes(), &[NodeStatus::new("10.0.0.1", 1024)]);
        assert_eq!(f.provisioner.nodes().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_node_drops_tail() {
        let f = fixture();
        let ring = seed(
            &f.store,
            &[1024],
            vec![NodeStatus::new("1.2.3.4", 1024), NodeStatus::new("1.2.3.5", 1024)],
        )
        .await;

        let action = NodeAction::RemoveNode {
            index: 1,
            node: NodeStatus::new("1.2.3.5", 1024),
        };
        f.executor.execute(&ring, &action).await.unwrap();

        let after = reread(&f.store, &ring).await;
        assert_eq!(after.status_nodes(), &[NodeStatus::new("1.2.3.4", 1024)]);
    }

    #[tokio::test]
    async fn test_update_disk_size_in_place() {
        let f = fixture();
        let ring = seed(
            &f.store,
            &[1024, 512],
            vec![NodeStatus::new("1.2.3.4", 1024), NodeStatus::new("1.2.3.5", 1024)],
        )
        .await;

        let action = NodeAction::UpdateNodeAttribute {
            index: 1,
            attribute: NodeAttribute::DiskSize {
                desired: 512,
                observed: 1024,
            },
        };
        f.executor.execute(&ring, &action).await.unwrap();

        let after = reread(&f.store, &ring).await;
        assert_eq!(
            after.status_nodes(),
            &[NodeStatus::new("1.2.3.4", 1024), NodeStatus::new("1.2.3.5", 512)]
        );
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_retryable_failure() {
        let f = fixture();
        let ring = seed(&f.store, &[1024, 1024], vec![]).await;

        let action = NodeAction::AddNode {
            index: 0,
            spec: NodeSpec::new(1024),
        };
        f.executor.execute(&ring, &action).await.unwrap();

        // Same snapshot again: the store has moved on.
        let result = f.executor.execute(&ring, &action).await;
        let err = result.err().unwrap();
        assert!(matches!(err, Error::ExecutionFailed { ref action, .. } if action == "add_node"));
        assert!(err.is_retryable());
        assert_eq!(f.provisioner.nodes().await.len(), 1);
    }

    #[tokio::test]
    async fn test_lost_status_write_does_not_orphan_node() {
        let f = fixture();
        let stale = seed(&f.store, &[1024], vec![]).await;
        f.store.update(stale.to_object().unwrap()).await.unwrap();

        let action = NodeAction::AddNode {
            index: 0,
            spec: NodeSpec::new(1024),
        };
        assert!(f.executor.execute(&stale, &action).await.is_err());
        assert!(reread(&f.store, &stale).await.status_nodes().is_empty());

        let fresh = reread(&f.store, &stale).await;
        f.executor.execute(&fresh, &action).await.unwrap();

        let after = reread(&f.store, &stale).await;
        assert_eq!(after.status_nodes(), &[NodeStatus::new("10.0.0.1", 1024)]);
        assert_eq!(f.provisioner.nodes().await.len(), after.status_nodes().len());
    }

    #[tokio::test]
    async fn test_provisioner_failure_leaves_status_untouched() {
        let f = fixture();
        let ring = seed(&f.store, &[1024], vec![]).await;
        f.provisioner.fail_next(1).await;

        let action = NodeAction::AddNode {
            index: 0,
            spec: NodeSpec::new(1024),
        };
        assert!(f.executor.execute(&ring, &action).await.is_err());
        assert!(reread(&f.store, &ring).await.status_nodes().is_empty());
    }

    #[tokio::test]
    async fn test_update_of_unobserved_index_fails() {
        let f = fixture();
        let ring = seed(&f.store, &[1024], vec![]).await;
        let action = NodeAction::UpdateNodeAttribute {
            index: 3,
            attribute: NodeAttribute::DiskSize {
                desired: 1,
                observed: 2,
            },
        };
        let result = f.executor.execute(&ring, &action).await;
        assert!(matches!(result, Err(Error::ExecutionFailed { .. })));
    }
}
