//! Explicit registry of the resource kinds a process serves.
//!
//! Built at startup and passed to whatever needs it; there is no global scheme.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::error::{Error, Result};
use crate::kinds::{CassandraCluster, ClusterResource, RedisCluster};

/// Registration record for one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindInfo {
    pub kind: &'static str,
    pub api_version: &'static str,
}

/// Set of registered kinds.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<&'static str, KindInfo>,
}

impl KindRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every kind bundled with this crate.
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        registry.register::<CassandraCluster>();
        registry.register::<RedisCluster>();
        registry
    }

    /// Register a kind. Registering twice is a no-op.
    pub fn register<R: ClusterResource>(&mut self) -> &mut Self {
        self.kinds.entry(R::KIND).or_insert(KindInfo {
            kind: R::KIND,
            api_version: R::API_VERSION,
        });
        self
    }

    /// Look up a kind by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownKind`] if the kind was never registered.
    pub fn resolve(&self, kind: &str) -> Result<&KindInfo> {
        self.kinds.get(kind).ok_or_else(|| Error::unknown_kind(kind))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Restrict the registry to the named kinds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownKind`] for the first name that is not registered.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let kinds = names
            .iter()
            .map(|name| self.resolve(name.as_ref()).map(|info| (info.kind, info.clone())))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { kinds })
    }

    /// Registered kind names in sorted order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.kinds.keys().copied().collect_vec()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
