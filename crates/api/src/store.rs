//! Resource store trait and implementations.
//!
//! The store holds desired and observed state for every resource, hands out
//! watch subscriptions, and owns optimistic concurrency: every write bumps the
//! object's `resource_version`, and a write carrying a stale version fails
//! with [`Error::Conflict`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{RwLock, broadcast};
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::kinds::ClusterResource;
use crate::object::DynamicObject;
use crate::types::ObjectKey;

/// Capacity of the watch broadcast channel.
const WATCH_CAPACITY: usize = 1024;

/// A change observed on the store.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Added(DynamicObject),
    Modified(DynamicObject),
    Deleted(DynamicObject),
}

impl WatchEvent {
    /// The object as of this event (last known state for deletions).
    pub const fn object(&self) -> &DynamicObject {
        match self {
            Self::Added(object) | Self::Modified(object) | Self::Deleted(object) => object,
        }
    }

    pub fn kind(&self) -> &str {
        &self.object().kind
    }

    pub fn key(&self) -> ObjectKey {
        self.object().key()
    }

    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Modified(_) => "modified",
            Self::Deleted(_) => "deleted",
        }
    }
}

/// Subscription handle for receiving store changes.
pub struct WatchStream {
    receiver: broadcast::Receiver<WatchEvent>,
}

impl WatchStream {
    /// Receive the next change.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WatchLagged`] if events were dropped because this
    /// subscriber fell behind (the caller should relist), or
    /// [`Error::ChannelClosed`] once the store is gone.
    pub async fn recv(&mut self) -> Result<WatchEvent> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Lagged(skipped) => Error::WatchLagged { skipped },
            broadcast::error::RecvError::Closed => Error::ChannelClosed,
        })
    }
}

/// Trait for resource storage backends.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Read one object. `None` means it does not exist.
    async fn get(&self, kind: &str, key: &ObjectKey) -> Result<Option<DynamicObject>>;

    /// Read every object of a kind, ordered by key.
    async fn list(&self, kind: &str) -> Result<Vec<DynamicObject>>;

    /// Store a new object. Server-owned metadata is assigned here.
    async fn create(&self, object: DynamicObject) -> Result<DynamicObject>;

    /// Replace an object's spec. The status is left untouched.
    async fn update(&self, object: DynamicObject) -> Result<DynamicObject>;

    /// Replace an object's status. The spec is left untouched.
    async fn update_status(&self, object: DynamicObject) -> Result<DynamicObject>;

    /// Remove an object, returning its last state if it existed.
    async fn delete(&self, kind: &str, key: &ObjectKey) -> Result<Option<DynamicObject>>;

    /// Subscribe to changes made after this call.
    fn watch(&self) -> WatchStream;
}

type StoreKey = (String, ObjectKey);

#[derive(Default)]
struct StoreState {
    objects: HashMap<StoreKey, DynamicObject>,
    last_version: u64,
}

impl StoreState {
    fn next_version(&mut self) -> u64 {
        self.last_version = self.last_version.saturating_add(1);
        self.last_version
    }
}

/// In-memory resource store.
pub struct InMemoryResourceStore {
    state: RwLock<StoreState>,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for InMemoryResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryResourceStore {
    /// Create a new in-memory resource store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            state: RwLock::new(StoreState::default()),
            events,
        }
    }

    fn publish(&self, event: WatchEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn check_version(current: &DynamicObject, incoming: &DynamicObject) -> Result<()> {
        if current.resource_version() == incoming.resource_version() {
            Ok(())
        } else {
            Err(Error::conflict(
                incoming.kind.clone(),
                incoming.key(),
                incoming.resource_version(),
                current.resource_version(),
            ))
        }
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn get(&self, kind: &str, key: &ObjectKey) -> Result<Option<DynamicObject>> {
        let state = self.state.read().await;
        Ok(state.objects.get(&(kind.to_string(), key.clone())).cloned())
    }

    async fn list(&self, kind: &str) -> Result<Vec<DynamicObject>> {
        let state = self.state.read().await;
        let mut objects: Vec<DynamicObject> = state
            .objects
            .iter()
            .filter(|((k, _), _)| k == kind)
            .map(|(_, object)| object.clone())
            .collect();
        objects.sort_by_key(DynamicObject::key);
        Ok(objects)
    }

    async fn create(&self, mut object: DynamicObject) -> Result<DynamicObject> {
        let mut state = self.state.write().await;
        let store_key = (object.kind.clone(), object.key());
        if state.objects.contains_key(&store_key) {
            return Err(Error::already_exists(object.kind.clone(), object.key()));
        }

        object.metadata.uid = Some(Ulid::new());
        object.metadata.generation = 1;
        object.metadata.resource_version = state.next_version();
        object.metadata.creation_timestamp = Some(Utc::now());

        state.objects.insert(store_key, object.clone());
        self.publish(WatchEvent::Added(object.clone()));
        Ok(object)
    }

    async fn update(&self, object: DynamicObject) -> Result<DynamicObject> {
        let mut state = self.state.write().await;
        let store_key = (object.kind.clone(), object.key());
        let Some(current) = state.objects.get(&store_key).cloned() else {
            return Err(Error::not_found(object.kind.clone(), object.key()));
        };
        Self::check_version(&current, &object)?;

        let mut updated = current.clone();
        if updated.spec != object.spec {
            updated.spec = object.spec;
            updated.metadata.generation = updated.metadata.generation.saturating_add(1);
        }
        updated.metadata.resource_version = state.next_version();

        state.objects.insert(store_key, updated.clone());
        self.publish(WatchEvent::Modified(updated.clone()));
        Ok(updated)
    }

    async fn update_status(&self, object: DynamicObject) -> Result<DynamicObject> {
        let mut state = self.state.write().await;
        let store_key = (object.kind.clone(), object.key());
        let Some(current) = state.objects.get(&store_key).cloned() else {
            return Err(Error::not_found(object.kind.clone(), object.key()));
        };
        Self::check_version(&current, &object)?;

        let mut updated = current;
        updated.status = object.status;
        updated.metadata.resource_version = state.next_version();

        state.objects.insert(store_key, updated.clone());
        self.publish(WatchEvent::Modified(updated.clone()));
        Ok(updated)
    }

    async fn delete(&self, kind: &str, key: &ObjectKey) -> Result<Option<DynamicObject>> {
        let mut state = self.state.write().await;
        let removed = state.objects.remove(&(kind.to_string(), key.clone()));
        if let Some(ref object) = removed {
            self.publish(WatchEvent::Deleted(object.clone()));
        }
        Ok(removed)
    }

    fn watch(&self) -> WatchStream {
        WatchStream {
            receiver: self.events.subscribe(),
        }
    }
}

/// A wrapper that adds tracing to a resource store.
pub struct TracingResourceStore<S: ResourceStore> {
    inner: S,
}

impl<S: ResourceStore> TracingResourceStore<S> {
    /// Create a new tracing resource store.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: ResourceStore> ResourceStore for TracingResourceStore<S> {
    async fn get(&self, kind: &str, key: &ObjectKey) -> Result<Option<DynamicObject>> {
        tracing::debug!(kind, key = %key, "Getting resource");
        let result = self.inner.get(kind, key).await;
        if let Ok(None) = result {
            tracing::trace!(kind, key = %key, "Resource not found");
        }
        result
    }

    async fn list(&self, kind: &str) -> Result<Vec<DynamicObject>> {
        tracing::debug!(kind, "Listing resources");
        self.inner.list(kind).await
    }

    async fn create(&self, object: DynamicObject) -> Result<DynamicObject> {
        tracing::debug!(kind = %object.kind, key = %object.key(), "Creating resource");
        self.inner.create(object).await
    }

    async fn update(&self, object: DynamicObject) -> Result<DynamicObject> {
        tracing::debug!(
            kind = %object.kind,
            key = %object.key(),
            resource_version = object.resource_version(),
            "Updating resource"
        );
        self.inner.update(object).await
    }

    async fn update_status(&self, object: DynamicObject) -> Result<DynamicObject> {
        tracing::debug!(
            kind = %object.kind,
            key = %object.key(),
            resource_version = object.resource_version(),
            "Updating resource status"
        );
        let result = self.inner.update_status(object).await;
        if let Err(ref e) = result {
            tracing::debug!(error = %e, "Status update rejected");
        }
        result
    }

    async fn delete(&self, kind: &str, key: &ObjectKey) -> Result<Option<DynamicObject>> {
        tracing::debug!(kind, key = %key, "Deleting resource");
        self.inner.delete(kind, key).await
    }

    fn watch(&self) -> WatchStream {
        self.inner.watch()
    }
}

/// Typed access to a store for any [`ClusterResource`].
#[async_trait]
pub trait TypedStoreExt {
    /// Read and decode one resource.
    async fn get_typed<R: ClusterResource>(&self, key: &ObjectKey) -> Result<Option<R>>;

    /// Read and decode every resource of a kind.
    async fn list_typed<R: ClusterResource>(&self) -> Result<Vec<R>>;

    /// Encode and create a resource.
    async fn create_typed<R: ClusterResource>(&self, resource: &R) -> Result<R>;

    /// Encode and write a resource's status.
    async fn update_status_typed<R: ClusterResource>(&self, resource: &R) -> Result<R>;
}

#[async_trait]
impl<S: ResourceStore + ?Sized> TypedStoreExt for S {
    async fn get_typed<R: ClusterResource>(&self, key: &ObjectKey) -> Result<Option<R>> {
        match self.get(R::KIND, key).await? {
            Some(object) => R::from_object(&object).map(Some),
            None => Ok(None),
        }
    }

    async fn list_typed<R: ClusterResource>(&self) -> Result<Vec<R>> {
        self.list(R::KIND)
            .await?
            .iter()
            .map(R::from_object)
            .collect()
    }

    async fn create_typed<R: ClusterResource>(&self, resource: &R) -> Result<R> {
        let created = self.create(resource.to_object()?).await?;
        R::from_object(&created)
    }

    async fn update_status_typed<R: ClusterResource>(&self, resource: &R) -> Result<R> {
        let updated = self.update_status(resource.to_object()?).await?;
        R::from_object(&updated)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::kinds::{CassandraCluster, RedisCluster};
    use crate::types::{ClusterSpec, ClusterStatus, NodeStatus, ObjectMeta};

    fn ring(sizes: &[u64]) -> CassandraCluster {
        CassandraCluster::new(
            ObjectMeta::new("prod", "ring"),
            ClusterSpec::with_disk_sizes(sizes.iter().copied()),
        )
    }

    #[tokio::test]
    async fn test_create_assigns_server_metadata() {
        let store = InMemoryResourceStore::new();
        let created = store.create_typed(&ring(&[1024])).await.unwrap();

        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.creation_timestamp.is_some());
        assert_eq!(created.metadata.generation, 1);
        assert!(created.metadata.resource_version > 0);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let store = InMemoryResourceStore::new();
        store.create_typed(&ring(&[1024])).await.unwrap();
        let second = store.create_typed(&ring(&[1024])).await;
        assert!(matches!(second, Err(Error::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_same_name_different_kind_is_distinct() {
        let store = InMemoryResourceStore::new();
        store.create_typed(&ring(&[1024])).await.unwrap();
        let cache = RedisCluster::new(ObjectMeta::new("prod", "ring"), ClusterSpec::default());
        assert!(store.create_typed(&cache).await.is_ok());
        assert_eq!(store.list(CassandraCluster::KIND).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = InMemoryResourceStore::new();
        let found = store
            .get_typed::<CassandraCluster>(&ObjectKey::new("prod", "ring"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_status_update_with_stale_version_conflicts() {
        let store = InMemoryResourceStore::new();
        let created = store.create_typed(&ring(&[1024])).await.unwrap();

        let mut first = created.clone();
        first.status.nodes.push(NodeStatus::new("10.0.0.1", 1024));
        let written = store.update_status_typed(&first).await.unwrap();
        assert!(written.metadata.resource_version > created.metadata.resource_version);

        let mut stale = created;
        stale.status = ClusterStatus::default();
        let result = store.update_status_typed(&stale).await;
        assert!(result.as_ref().err().is_some_and(Error::is_conflict));
    }

    #[tokio::test]
    async fn test_update_status_keeps_spec_and_generation() {
        let store = InMemoryResourceStore::new();
        let created = store.create_typed(&ring(&[1024])).await.unwrap();

        let mut next = created.clone();
        next.spec = ClusterSpec::with_disk_sizes([1]);
        next.status.nodes.push(NodeStatus::new("10.0.0.1", 1024));
        let written = store.update_status_typed(&next).await.unwrap();

        assert_eq!(written.spec, created.spec);
        assert_eq!(written.metadata.generation, 1);
        assert_eq!(written.status.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_spec_update_bumps_generation() {
        let store = InMemoryResourceStore::new();
        let created = store.create_typed(&ring(&[1024])).await.unwrap();

        let mut next = created.clone();
        next.spec = ClusterSpec::with_disk_sizes([1024, 2048]);
        let written = store.update(next.to_object().unwrap()).await.unwrap();
        assert_eq!(written.metadata.generation, 2);

        let unchanged = store.update(written.clone()).await.unwrap();
        assert_eq!(unchanged.metadata.generation, 2);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryResourceStore::new();
        let result = store.update(ring(&[1]).to_object().unwrap()).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_status_missing_is_not_found() {
        let store = InMemoryResourceStore::new();
        let result = store.update_status(ring(&[1]).to_object().unwrap()).await;
        assert!(matches!(
            result,
            Err(Error::NotFound { ref kind, ref key })
                if kind == CassandraCluster::KIND && *key == ObjectKey::new("prod", "ring")
        ));
    }

    #[tokio::test]
    async fn test_watch_sees_writes_in_order() {
        let store = InMemoryResourceStore::new();
        let mut watch = store.watch();

        let created = store.create_typed(&ring(&[1024])).await.unwrap();
        store.update_status_typed(&created).await.unwrap();
        store
            .delete(CassandraCluster::KIND, &created.key())
            .await
            .unwrap();

        let kinds = [
            watch.recv().await.unwrap().event_type(),
            watch.recv().await.unwrap().event_type(),
            watch.recv().await.unwrap().event_type(),
        ];
        assert_eq!(kinds, ["added", "modified", "deleted"]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_none() {
        let store = InMemoryResourceStore::new();
        let removed = store
            .delete(CassandraCluster::KIND, &ObjectKey::named("ghost"))
            .await
            .unwrap();
        assert!(removed.is_none());
    }

    #[tokio::test]
    async fn test_tracing_store_delegates() {
        let store = TracingResourceStore::new(InMemoryResourceStore::new());
        store.create_typed(&ring(&[1024])).await.unwrap();
        let listed = store.list_typed::<CassandraCluster>().await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
