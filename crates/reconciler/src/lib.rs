//! K8s-style reconciliation for cluster node topologies.
//!
//! Each cluster resource declares the nodes it wants (`spec.nodes`) and
//! records the nodes it has (`status.nodes`). A reconciliation pass compares
//! the two and carries out exactly one corrective action:
//!
//! - **Scale up**: more desired than observed nodes, add the next one
//! - **Scale down**: fewer desired than observed nodes, remove the tail one
//! - **Drift**: equal counts, fix the lowest-index node whose disk size differs
//! - **Converged**: nothing to do
//!
//! Repeated passes converge the resource one step at a time. The
//! [`Controller`] supplies the repetition: it watches the store, serializes
//! passes per key and retries retryable failures with backoff.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use topology_api::{
//!     CassandraCluster, ClusterSpec, InMemoryResourceStore, ObjectMeta, TypedStoreExt,
//! };
//! use topology_reconciler::{
//!     Controller, ControllerConfig, Reconciler, ReconcilerConfig, SimulatedProvisioner,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(InMemoryResourceStore::new());
//!     let ring = CassandraCluster::new(
//!         ObjectMeta::new("prod", "ring"),
//!         ClusterSpec::with_disk_sizes([1024, 1024, 1024]),
//!     );
//!     store.create_typed(&ring).await.unwrap();
//!
//!     let reconciler = Arc::new(Reconciler::<CassandraCluster>::with_provisioner(
//!         store.clone(),
//!         Arc::new(SimulatedProvisioner::default()),
//!         ReconcilerConfig::default(),
//!     ));
//!     let controller = Controller::new(reconciler, ControllerConfig::default());
//!
//!     // Runs until stopped
//!     // controller.run().await.unwrap();
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod identifier;
pub mod provisioner;
pub mod queue;
pub mod reconciler;
pub mod types;

// Re-export main types
pub use config::OperatorConfig;
pub use controller::{Controller, ControllerConfig, ControllerStopper};
pub use error::{Error, Result};
pub use executor::{ActionExecutor, ProvisioningExecutor};
pub use identifier::{ActionIdentifier, diff};
pub use provisioner::{NodeProvisioner, SimulatedNode, SimulatedProvisioner, SimulatedProvisionerConfig};
pub use queue::{BackoffConfig, WorkQueue};
pub use reconciler::{Reconciler, ReconcilerBuilder, ReconcilerConfig};
pub use types::{Action, NodeAction, NodeAttribute, PassResult, ReconcileOutcome};
