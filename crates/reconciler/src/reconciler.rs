//! Reconciler implementation.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use topology_api::{ClusterResource, ObjectKey, ResourceStore};
use tracing::{debug, info, warn};

use crate::config::optional_duration_ms;
use crate::error::{Error, Result};
use crate::executor::{ActionExecutor, ProvisioningExecutor};
use crate::identifier::ActionIdentifier;
use crate::provisioner::NodeProvisioner;
use crate::types::{PassResult, ReconcileOutcome};

/// Configuration for the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Ask for another pass this long after a successful action.
    ///
    /// `None` relies on the store's watch feed to trigger the next pass.
    #[serde(rename = "requeue_after_action_ms", with = "optional_duration_ms")]
    pub requeue_after_action: Option<Duration>,
}

/// K8s-style reconciler for one cluster resource kind.
///
/// Each call to [`Reconciler::reconcile`] is one complete pass:
/// fetch, identify, then execute at most one action. It never sleeps, loops
/// or retries; the trigger layer decides what happens next.
pub struct Reconciler<R: ClusterResource> {
    /// Resource store.
    store: Arc<dyn ResourceStore>,
    /// Priority policy.
    identifier: ActionIdentifier<R>,
    /// Action executor.
    executor: Arc<dyn ActionExecutor<R>>,
    /// Configuration.
    config: ReconcilerConfig,
}

impl<R: ClusterResource> Reconciler<R> {
    /// Create a new reconciler.
    pub fn new(
        store: Arc<dyn ResourceStore>,
        executor: Arc<dyn ActionExecutor<R>>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            identifier: ActionIdentifier::new(),
            executor,
            config,
        }
    }

    /// Create a reconciler that executes through a provisioner.
    pub fn with_provisioner(
        store: Arc<dyn ResourceStore>,
        provisioner: Arc<dyn NodeProvisioner>,
        config: ReconcilerConfig,
    ) -> Self {
        let executor = Arc::new(ProvisioningExecutor::new(store.clone(), provisioner));
        Self::new(store, executor, config)
    }

    /// Run one reconciliation pass for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the store hands back another kind,
    /// [`Error::Store`] if the fetch fails, or the executor's error if the
    /// action fails. A missing resource is not an error.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome> {
        let Some(object) = self
            .store
            .get(R::KIND, key)
            .await
            .map_err(|e| Error::from_store("get", e))?
        else {
            debug!(kind = R::KIND, key = %key, "Resource deleted, nothing to do");
            return Ok(ReconcileOutcome::done(PassResult::NotFound));
        };

        let Some(action) = self.identifier.identify_object(&object)? else {
            debug!(kind = R::KIND, key = %key, "Resource converged");
            return Ok(ReconcileOutcome::done(PassResult::Converged));
        };

        info!(
            kind = R::KIND,
            key = %key,
            generation = object.metadata.generation,
            action = %action.change(),
            "Executing action"
        );

        if let Err(e) = action.execute(self.executor.as_ref()).await {
            warn!(kind = R::KIND, key = %key, action = action.change().name(), error = %e, "Action failed");
            return Err(e);
        }

        let executed = PassResult::Executed(action.into_change());
        Ok(match self.config.requeue_after_action {
            Some(delay) => ReconcileOutcome::requeue_after(executed, delay),
            None => ReconcileOutcome::done(executed),
        })
    }

    /// Get the resource store.
    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    /// Get the configuration.
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder<R: ClusterResource> {
    store: Option<Arc<dyn ResourceStore>>,
    executor: Option<Arc<dyn ActionExecutor<R>>>,
    provisioner: Option<Arc<dyn NodeProvisioner>>,
    config: ReconcilerConfig,
}

impl<R: ClusterResource> ReconcilerBuilder<R> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            store: None,
            executor: None,
            provisioner: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Set the resource store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ResourceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set a custom action executor.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn ActionExecutor<R>>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Execute through a provisioner (ignored if an executor is set).
    #[must_use]
    pub fn with_provisioner(mut self, provisioner: Arc<dyn NodeProvisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the requeue delay after a successful action.
    #[must_use]
    pub fn requeue_after_action(mut self, delay: Duration) -> Self {
        self.config.requeue_after_action = Some(delay);
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the store, or both the executor and
    /// the provisioner, are missing.
    pub fn build(self) -> Result<Reconciler<R>> {
        let store = self
            .store
            .ok_or_else(|| Error::invalid_config("Resource store is required"))?;

        let executor: Arc<dyn ActionExecutor<R>> = match (self.executor, self.provisioner) {
            (Some(executor), _) => executor,
            (None, Some(provisioner)) => Arc::new(ProvisioningExecutor::new(store.clone(), provisioner)),
            (None, None) => {
                return Err(Error::invalid_config(
                    "An action executor or node provisioner is required",
                ));
            }
        };

        Ok(Reconciler::new(store, executor, self.config))
    }
}

impl<R: ClusterResource> Default for ReconcilerBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}
