//! Infrastructure seam: where nodes are actually created, destroyed and resized.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use topology_api::{NodeSpec, NodeStatus, ObjectKey};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Trait for the infrastructure that backs cluster nodes.
///
/// Implementations should be idempotent where they can: a pass may be retried
/// after the infrastructure changed but before the store recorded it.
#[async_trait]
pub trait NodeProvisioner: Send + Sync {
    /// Bring up a node for `spec` and report what was created.
    async fn provision(&self, cluster: &ObjectKey, index: usize, spec: &NodeSpec) -> Result<NodeStatus>;

    /// Tear down a node.
    async fn decommission(&self, cluster: &ObjectKey, node: &NodeStatus) -> Result<()>;

    /// Resize a node's disk and report the node's new state.
    async fn resize_disk(&self, cluster: &ObjectKey, node: &NodeStatus, disk_size: u64) -> Result<NodeStatus>;
}

/// Settings for [`SimulatedProvisioner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedProvisionerConfig {
    /// First three octets of assigned addresses.
    pub address_prefix: String,
}

impl Default for SimulatedProvisionerConfig {
    fn default() -> Self {
        Self {
            address_prefix: "10.0.0".to_string(),
        }
    }
}

/// A node the simulator believes exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedNode {
    pub cluster: ObjectKey,
    pub disk_size: u64,
}

#[derive(Debug, Default)]
struct SimulatorState {
    next_host: u32,
    nodes: BTreeMap<String, SimulatedNode>,
    /// Address provisioned for each `(cluster, index)` slot.
    slots: BTreeMap<(ObjectKey, usize), String>,
    failures_remaining: u32,
}

/// In-memory provisioner that hands out sequential addresses.
///
/// Provisioning is idempotent per `(cluster, index)`: asking again for a slot
/// whose node is still alive returns that node instead of allocating another.
/// A retried pass whose earlier status write was lost therefore adopts the node
/// it already created.
#[derive(Debug)]
pub struct SimulatedProvisioner {
    config: SimulatedProvisionerConfig,
    state: Mutex<SimulatorState>,
}

impl Default for SimulatedProvisioner {
    fn default() -> Self {
        Self::new(SimulatedProvisionerConfig::default())
    }
}

impl SimulatedProvisioner {
    pub fn new(config: SimulatedProvisionerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SimulatorState::default()),
        }
    }

    /// Make the next `count` operations fail.
    pub async fn fail_next(&self, count: u32) {
        self.state.lock().await.failures_remaining = count;
    }

    /// Snapshot of every live node, keyed by address.
    pub async fn nodes(&self) -> BTreeMap<String, SimulatedNode> {
        self.state.lock().await.nodes.clone()
    }

    fn take_failure(state: &mut SimulatorState, operation: &str) -> Result<()> {
        if state.failures_remaining == 0 {
            return Ok(());
        }
        state.failures_remaining = state.failures_remaining.saturating_sub(1);
        Err(Error::execution_failed(operation, "injected infrastructure failure"))
    }
}

#[async_trait]
impl NodeProvisioner for SimulatedProvisioner {
    async fn provision(&self, cluster: &ObjectKey, index: usize, spec: &NodeSpec) -> Result<NodeStatus> {
        let mut state = self.state.lock().await;
        Self::take_failure(&mut state, "add_node")?;

        let slot = (cluster.clone(), index);
        if let Some((address, node)) = state
            .slots
            .get(&slot)
            .and_then(|address| state.nodes.get(address).map(|node| (address, node)))
        {
            debug!(cluster = %cluster, index, address = %address, "Node already provisioned");
            return Ok(NodeStatus::new(address.clone(), node.disk_size));
        }

        state.next_host = state.next_host.saturating_add(1);
        let address = format!("{}.{}", self.config.address_prefix, state.next_host);
        state.slots.insert(slot, address.clone());
        state.nodes.insert(
            address.clone(),
            SimulatedNode {
                cluster: cluster.clone(),
                disk_size: spec.disk_size,
            },
        );

        info!(cluster = %cluster, index, address = %address, disk_size = spec.disk_size, "Provisioned node");
        Ok(NodeStatus::new(address, spec.disk_size))
    }

    async fn decommission(&self, cluster: &ObjectKey, node: &NodeStatus) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::take_failure(&mut state, "remove_node")?;

        state.slots.retain(|_, address| *address != node.address);
        if state.nodes.remove(&node.address).is_none() {
            debug!(cluster = %cluster, address = %node.address, "Node already gone");
        } else {
            info!(cluster = %cluster, address = %node.address, "Decommissioned node");
        }
        Ok(())
    }

    async fn resize_disk(&self, cluster: &ObjectKey, node: &NodeStatus, disk_size: u64) -> Result<NodeStatus> {
        let mut state = self.state.lock().await;
        Self::take_failure(&mut state, "update_node_attribute")?;

        if node.address.is_empty() {
            return Err(Error::execution_failed(
                "update_node_attribute",
                "node has no address yet",
            ));
        }

        // Nodes seeded from a manifest were never provisioned here; adopt them.
        state.nodes.insert(
            node.address.clone(),
            SimulatedNode {
                cluster: cluster.clone(),
                disk_size,
            },
        );

        info!(cluster = %cluster, address = %node.address, from = node.disk_size, to = disk_size, "Resized disk");
        Ok(NodeStatus::new(node.address.clone(), disk_size))
    }
}
