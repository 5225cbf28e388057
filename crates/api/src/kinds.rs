//! Cluster resource kinds.
//!
//! Every kind exposes the same shape (`spec.nodes`, `status.nodes`) through
//! [`ClusterResource`], so one identifier and one reconciler serve them all.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::object::DynamicObject;
use crate::types::{ClusterSpec, ClusterStatus, NodeSpec, NodeStatus, ObjectKey, ObjectMeta};

/// API group and version of the bundled kinds.
pub const API_VERSION: &str = "db.k8s.io/v1beta1";

/// A resource with a desired and an observed node topology.
pub trait ClusterResource: Clone + fmt::Debug + Send + Sync + 'static {
    /// Kind name as it appears in manifests and the store.
    const KIND: &'static str;

    /// API version written on conversion to a [`DynamicObject`].
    const API_VERSION: &'static str = API_VERSION;

    /// Assemble a resource from its parts.
    fn from_parts(metadata: ObjectMeta, spec: ClusterSpec, status: ClusterStatus) -> Self;

    fn metadata(&self) -> &ObjectMeta;

    fn spec(&self) -> &ClusterSpec;

    fn status(&self) -> &ClusterStatus;

    fn status_mut(&mut self) -> &mut ClusterStatus;

    /// Desired topology.
    fn spec_nodes(&self) -> &[NodeSpec] {
        &self.spec().nodes
    }

    /// Observed topology.
    fn status_nodes(&self) -> &[NodeStatus] {
        &self.status().nodes
    }

    fn key(&self) -> ObjectKey {
        self.metadata().key()
    }

    /// Convert to the store's untyped envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if spec or status cannot be encoded.
    fn to_object(&self) -> Result<DynamicObject> {
        Ok(
            DynamicObject::new(Self::API_VERSION, Self::KIND, self.metadata().clone())
                .with_spec(serde_json::to_value(self.spec())?)
                .with_status(serde_json::to_value(self.status())?),
        )
    }

    /// Decode from the store's untyped envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the object is of another kind, or
    /// [`Error::Serialization`] if spec or status do not match the schema.
    fn from_object(object: &DynamicObject) -> Result<Self> {
        if object.kind != Self::KIND {
            return Err(Error::type_mismatch(Self::KIND, object.kind.clone()));
        }
        Ok(Self::from_parts(
            object.metadata.clone(),
            decode_or_default(&object.spec)?,
            decode_or_default(&object.status)?,
        ))
    }
}

fn decode_or_default<T: Default + for<'de> Deserialize<'de>>(value: &Value) -> Result<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(T::deserialize(value)?)
}

macro_rules! cluster_kind {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
        pub struct $name {
            pub metadata: ObjectMeta,
            #[serde(default)]
            pub spec: ClusterSpec,
            #[serde(default)]
            pub status: ClusterStatus,
        }

        impl $name {
            /// Create a resource with an empty observed topology.
            pub fn new(metadata: ObjectMeta, spec: ClusterSpec) -> Self {
                Self {
                    metadata,
                    spec,
                    status: ClusterStatus::default(),
                }
            }

            /// Set the observed topology.
            #[must_use]
            pub fn with_status(mut self, status: ClusterStatus) -> Self {
                self.status = status;
                self
            }
        }

        impl ClusterResource for $name {
            const KIND: &'static str = stringify!($name);

            fn from_parts(metadata: ObjectMeta, spec: ClusterSpec, status: ClusterStatus) -> Self {
                Self {
                    metadata,
                    spec,
                    status,
                }
            }

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn spec(&self) -> &ClusterSpec {
                &self.spec
            }

            fn status(&self) -> &ClusterStatus {
                &self.status
            }

            fn status_mut(&mut self) -> &mut ClusterStatus {
                &mut self.status
            }
        }
    };
}

cluster_kind! {
    /// Schema for the cassandraclusters API.
    CassandraCluster
}

cluster_kind! {
    /// Schema for the redisclusters API.
    RedisCluster
}
