//! End-to-end convergence through the controller.
//!
//! Every test runs real controllers against the in-memory store and the
//! simulated provisioner, bounded by a timeout.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use topology_api::{
    CassandraCluster, ClusterResource, ClusterSpec, ClusterStatus, InMemoryResourceStore,
    NodeStatus, ObjectKey, ObjectMeta, RedisCluster, ResourceStore, TypedStoreExt,
};
use topology_reconciler::{
    BackoffConfig, Controller, ControllerConfig, PassResult, ReconcileOutcome, Reconciler,
    ReconcilerConfig, SimulatedProvisioner,
};

const DEADLINE: Duration = Duration::from_secs(10);

fn config() -> ControllerConfig {
    ControllerConfig {
        resync_interval: Duration::from_millis(100),
        max_concurrent_reconciles: 4,
        backoff: BackoffConfig {
            initial: Duration::from_millis(5),
            max: Duration::from_millis(40),
            factor: 2,
        },
    }
}

struct Harness {
    store: Arc<InMemoryResourceStore>,
    provisioner: Arc<SimulatedProvisioner>,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: Arc::new(InMemoryResourceStore::new()),
            provisioner: Arc::new(SimulatedProvisioner::default()),
        }
    }

    fn controller<R: ClusterResource>(&self) -> Arc<Controller<R>> {
        let reconciler = Reconciler::<R>::with_provisioner(
            self.store.clone(),
            self.provisioner.clone(),
            ReconcilerConfig::default(),
        );
        Arc::new(Controller::new(Arc::new(reconciler), config()))
    }

    fn start<R: ClusterResource>(&self) -> (Arc<Controller<R>>, tokio::task::JoinHandle<topology_reconciler::Result<()>>) {
        let controller = self.controller::<R>();
        let runner = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.run().await }
        });
        (controller, runner)
    }

    /// Wait until the stored status matches `sizes`.
    async fn converged<R: ClusterResource>(&self, key: &ObjectKey, sizes: &[u64]) -> R {
        tokio::time::timeout(DEADLINE, async {
            loop {
                let current: Option<R> = self.store.get_typed(key).await.unwrap();
                if let Some(resource) = current {
                    let observed: Vec<u64> = resource.status_nodes().iter().map(|n| n.disk_size).collect();
                    if observed == sizes {
                        return resource;
                    }
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap()
    }
}

#[tokio::test]
async fn cassandra_ring_scales_up_from_nothing() {
    let h = Harness::new();
    let ring = CassandraCluster::new(
        ObjectMeta::new("prod", "ring"),
        ClusterSpec::with_disk_sizes([1024, 1024, 1024]),
    );
    h.store.create_typed(&ring).await.unwrap();

    let (controller, runner) = h.start::<CassandraCluster>();
    let done: CassandraCluster = h.converged(&ring.key(), &[1024, 1024, 1024]).await;

    let addresses: Vec<&str> = done.status_nodes().iter().map(|n| n.address.as_str()).collect();
    assert_eq!(addresses, vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
    assert_eq!(h.provisioner.nodes().await.len(), 3);

    controller.stop();
    assert!(runner.await.unwrap().is_ok());
}

#[tokio::test]
async fn mixed_drift_and_scale_down_converge() {
    let h = Harness::new();
    let cache = RedisCluster::new(ObjectMeta::new("prod", "cache"), ClusterSpec::with_disk_sizes([64, 32]))
        .with_status(ClusterStatus {
            nodes: vec![
                NodeStatus::new("1.2.3.4", 64),
                NodeStatus::new("1.2.3.5", 64),
                NodeStatus::new("1.2.3.6", 64),
            ],
        });
    h.store.create_typed(&cache).await.unwrap();

    let (controller, runner) = h.start::<RedisCluster>();
    let done: RedisCluster = h.converged(&cache.key(), &[64, 32]).await;

    let addresses: Vec<&str> = done.status_nodes().iter().map(|n| n.address.as_str()).collect();
    assert_eq!(addresses, vec!["1.2.3.4", "1.2.3.5"]);

    controller.stop();
    assert!(runner.await.unwrap().is_ok());
}

#[tokio::test]
async fn controllers_only_touch_their_own_kind() {
    let h = Harness::new();
    let ring = CassandraCluster::new(ObjectMeta::named("shared"), ClusterSpec::with_disk_sizes([10]));
    let cache = RedisCluster::new(ObjectMeta::named("shared"), ClusterSpec::with_disk_sizes([20, 20]));
    h.store.create_typed(&ring).await.unwrap();
    h.store.create_typed(&cache).await.unwrap();

    let (cassandra, cassandra_runner) = h.start::<CassandraCluster>();
    let _: CassandraCluster = h.converged(&ring.key(), &[10]).await;

    // The Redis controller is not running yet.
    let untouched: RedisCluster = h.store.get_typed(&cache.key()).await.unwrap().unwrap();
    assert!(untouched.status_nodes().is_empty());

    let (redis, redis_runner) = h.start::<RedisCluster>();
    let _: RedisCluster = h.converged(&cache.key(), &[20, 20]).await;

    cassandra.stop();
    redis.stop();
    assert!(cassandra_runner.await.unwrap().is_ok());
    assert!(redis_runner.await.unwrap().is_ok());
}

#[tokio::test]
async fn injected_failures_are_retried_with_backoff() {
    let h = Harness::new();
    h.provisioner.fail_next(4).await;

    let ring = CassandraCluster::new(ObjectMeta::named("flaky"), ClusterSpec::with_disk_sizes([1, 2]));
    h.store.create_typed(&ring).await.unwrap();

    let (controller, runner) = h.start::<CassandraCluster>();
    let _: CassandraCluster = h.converged(&ring.key(), &[1, 2]).await;
    assert_eq!(h.provisioner.nodes().await.len(), 2);

    controller.stop();
    assert!(runner.await.unwrap().is_ok());
}

#[tokio::test]
async fn deleted_resource_is_left_alone() {
    let h = Harness::new();
    let ring = CassandraCluster::new(ObjectMeta::named("gone"), ClusterSpec::with_disk_sizes([1, 1]));
    h.store.create_typed(&ring).await.unwrap();

    let (controller, runner) = h.start::<CassandraCluster>();
    let _: CassandraCluster = h.converged(&ring.key(), &[1, 1]).await;
    let nodes_before = h.provisioner.nodes().await;
    assert_eq!(nodes_before.len(), 2);

    let deleted = h.store.delete(CassandraCluster::KIND, &ring.key()).await.unwrap();
    assert!(deleted.is_some());

    // Give the controller a resync to trip over the missing key.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(h.store.get(CassandraCluster::KIND, &ring.key()).await.unwrap().is_none());
    assert_eq!(h.provisioner.nodes().await, nodes_before);
    assert!(!runner.is_finished());

    let reconciler = Reconciler::<CassandraCluster>::with_provisioner(
        h.store.clone(),
        h.provisioner.clone(),
        ReconcilerConfig::default(),
    );
    let outcome = reconciler.reconcile(&ring.key()).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::done(PassResult::NotFound));
    assert!(!outcome.requeue);
    assert_eq!(outcome.requeue_after, None);

    controller.stop();
    assert!(runner.await.unwrap().is_ok());
    assert_eq!(h.provisioner.nodes().await, nodes_before);
}

#[tokio::test]
async fn spec_edit_during_run_is_followed() {
    let h = Harness::new();
    let ring = CassandraCluster::new(ObjectMeta::named("grow"), ClusterSpec::with_disk_sizes([100]));
    h.store.create_typed(&ring).await.unwrap();

    let (controller, runner) = h.start::<CassandraCluster>();
    let _: CassandraCluster = h.converged(&ring.key(), &[100]).await;

    let mut object = h.store.get(CassandraCluster::KIND, &ring.key()).await.unwrap().unwrap();
    object.spec = serde_json::to_value(ClusterSpec::with_disk_sizes([200, 100, 100])).unwrap();
    let updated = h.store.update(object).await.unwrap();
    assert_eq!(updated.metadata.generation, 2);

    let _: CassandraCluster = h.converged(&ring.key(), &[200, 100, 100]).await;

    controller.stop();
    assert!(runner.await.unwrap().is_ok());
}
