//! Cluster resource schema, kind registry and watched resource store.
//!
//! This crate provides everything the reconciler reads and writes:
//!
//! - **Schema**: node specs/statuses and object metadata shared by every kind
//! - **Kinds**: `CassandraCluster` and `RedisCluster`, plus the
//!   [`ClusterResource`] trait any other kind can implement
//! - **Registry**: explicit, startup-time registration of served kinds
//! - **Store**: get/list/create/update/watch with optimistic concurrency
//! - **Manifests**: multi-document YAML loading with validation
//!
//! # Example
//!
//! ```ignore
//! use topology_api::{
//!     CassandraCluster, ClusterSpec, InMemoryResourceStore, ObjectMeta, TypedStoreExt,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryResourceStore::new();
//!     let mut watch = store.watch();
//!
//!     let ring = CassandraCluster::new(
//!         ObjectMeta::new("prod", "ring"),
//!         ClusterSpec::with_disk_sizes([1024, 1024, 1024]),
//!     );
//!     store.create_typed(&ring).await.unwrap();
//!
//!     let event = watch.recv().await.unwrap();
//!     println!("{} {}", event.event_type(), event.key());
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod kinds;
pub mod manifest;
pub mod object;
pub mod registry;
pub mod store;
pub mod types;

// Re-export main types
pub use error::{Error, Result};
pub use kinds::{API_VERSION, CassandraCluster, ClusterResource, RedisCluster};
pub use manifest::{load_manifests, parse_manifests};
pub use object::DynamicObject;
pub use registry::{KindInfo, KindRegistry};
pub use store::{
    InMemoryResourceStore, ResourceStore, TracingResourceStore, TypedStoreExt, WatchEvent,
    WatchStream,
};
pub use types::{
    ClusterSpec, ClusterStatus, DEFAULT_NAMESPACE, NodeSpec, NodeStatus, ObjectKey, ObjectMeta,
};
