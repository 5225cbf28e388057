//! Per-kind entry points for the served resource kinds.
//!
//! Each kind registers one [`KindHandler`]; commands look handlers up by kind
//! name instead of matching on kinds themselves.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tokio::task::JoinHandle;

use topology_api::{
    CassandraCluster, ClusterResource, DynamicObject, KindRegistry, RedisCluster, ResourceStore,
};
use topology_reconciler::{
    Action, ActionIdentifier, Controller, ControllerConfig, ControllerStopper, NodeAction,
    NodeProvisioner, Reconciler, ReconcilerConfig,
};

/// A running controller and the handle to stop it.
pub type Runner = (ControllerStopper, JoinHandle<topology_reconciler::Result<()>>);

type IdentifyFn = fn(&DynamicObject) -> topology_reconciler::Result<Option<NodeAction>>;

type SpawnFn = fn(
    &Arc<dyn ResourceStore>,
    &Arc<dyn NodeProvisioner>,
    &ReconcilerConfig,
    &ControllerConfig,
) -> Runner;

/// Typed operations for one kind behind untyped function pointers.
#[derive(Clone, Copy)]
pub struct KindHandler {
    identify: IdentifyFn,
    spawn: SpawnFn,
}

impl KindHandler {
    fn of<R: ClusterResource>() -> Self {
        Self {
            identify: identify_as::<R>,
            spawn: spawn_controller::<R>,
        }
    }

    /// Next action for an object of this handler's kind.
    pub fn identify(&self, object: &DynamicObject) -> topology_reconciler::Result<Option<NodeAction>> {
        (self.identify)(object)
    }

    /// Start a controller for this handler's kind.
    pub fn spawn(
        &self,
        store: &Arc<dyn ResourceStore>,
        provisioner: &Arc<dyn NodeProvisioner>,
        reconciler: &ReconcilerConfig,
        controller: &ControllerConfig,
    ) -> Runner {
        (self.spawn)(store, provisioner, reconciler, controller)
    }
}

fn identify_as<R: ClusterResource>(object: &DynamicObject) -> topology_reconciler::Result<Option<NodeAction>> {
    Ok(ActionIdentifier::<R>::new()
        .identify_object(object)?
        .map(Action::into_change))
}

fn spawn_controller<R: ClusterResource>(
    store: &Arc<dyn ResourceStore>,
    provisioner: &Arc<dyn NodeProvisioner>,
    reconciler_config: &ReconcilerConfig,
    controller_config: &ControllerConfig,
) -> Runner {
    let reconciler = Reconciler::<R>::with_provisioner(
        Arc::clone(store),
        Arc::clone(provisioner),
        reconciler_config.clone(),
    );
    let controller = Controller::new(Arc::new(reconciler), controller_config.clone());
    let stopper = controller.stopper();
    let handle = tokio::spawn(async move { controller.run().await });
    (stopper, handle)
}

/// Handlers keyed by kind name.
#[derive(Clone, Default)]
pub struct KindHandlers {
    handlers: BTreeMap<&'static str, KindHandler>,
}

impl KindHandlers {
    /// Handlers for every kind this binary can control.
    pub fn builtin() -> Self {
        let mut handlers = Self::default();
        handlers.register::<CassandraCluster>();
        handlers.register::<RedisCluster>();
        handlers
    }

    /// Register a kind. Registering twice is a no-op.
    pub fn register<R: ClusterResource>(&mut self) -> &mut Self {
        self.handlers.entry(R::KIND).or_insert_with(KindHandler::of::<R>);
        self
    }

    /// Restrict these handlers to the kinds served by `registry`.
    ///
    /// # Errors
    ///
    /// Fails if a served kind has no handler.
    pub fn serving(&self, registry: &KindRegistry) -> Result<Self> {
        let handlers = registry
            .kinds()
            .into_iter()
            .map(|kind| self.get(kind).map(|handler| (kind, *handler)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { handlers })
    }

    /// Look up the handler for a kind.
    ///
    /// # Errors
    ///
    /// Fails if the kind has no handler.
    pub fn get(&self, kind: &str) -> Result<&KindHandler> {
        self.handlers
            .get(kind)
            .ok_or_else(|| anyhow!("No controller for kind {kind}"))
    }

    /// Next action for an object of any handled kind.
    pub fn identify(&self, object: &DynamicObject) -> Result<Option<NodeAction>> {
        Ok(self.get(&object.kind)?.identify(object)?)
    }

    /// Handled kinds with their handlers, in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &KindHandler)> {
        self.handlers.iter().map(|(kind, handler)| (*kind, handler))
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }
}
