//! Event-driven trigger layer around a [`Reconciler`].
//!
//! The controller lists every object of its kind, then reacts to the store's
//! watch feed, a periodic resync and its own requeue timers. Passes for
//! different keys run concurrently up to a limit; passes for the same key
//! never overlap.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use topology_api::{ClusterResource, ObjectKey};
use tracing::{debug, error, info, warn};

use crate::config::duration_ms;
use crate::error::{Error, Result};
use crate::queue::{BackoffConfig, WorkQueue};
use crate::reconciler::Reconciler;
use crate::types::{PassResult, ReconcileOutcome};

/// Configuration for a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Interval between full relists.
    #[serde(rename = "resync_interval_ms", with = "duration_ms")]
    pub resync_interval: Duration,
    /// Maximum passes in flight at once.
    pub max_concurrent_reconciles: usize,
    /// Retry schedule for retryable failures.
    pub backoff: BackoffConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(30),
            max_concurrent_reconciles: 4,
            backoff: BackoffConfig::default(),
        }
    }
}

type PassReport = (ObjectKey, Result<ReconcileOutcome>);

/// Drives reconciliation passes for one resource kind.
pub struct Controller<R: ClusterResource> {
    reconciler: Arc<Reconciler<R>>,
    config: ControllerConfig,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl<R: ClusterResource> Controller<R> {
    /// Create a new controller.
    pub fn new(reconciler: Arc<Reconciler<R>>, config: ControllerConfig) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            reconciler,
            config,
            stop_tx,
            stop_rx,
        }
    }

    /// Run until stopped.
    ///
    /// In-flight passes are awaited before returning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the initial list fails, or
    /// [`Error::ControllerStopped`] if the watch feed closes.
    pub async fn run(&self) -> Result<()> {
        info!(
            kind = R::KIND,
            resync_interval_ms = self.config.resync_interval.as_millis(),
            max_concurrent = self.config.max_concurrent_reconciles,
            "Starting controller"
        );

        // Subscribe before listing so nothing written in between is missed.
        let mut feed = self.reconciler.store().watch();
        let mut queue = WorkQueue::new();
        let listed = self.enqueue_all(&mut queue).await?;
        debug!(kind = R::KIND, count = listed, "Initial list");

        let mut passes: JoinSet<PassReport> = JoinSet::new();
        let mut timers: JoinSet<ObjectKey> = JoinSet::new();
        let mut resync = tokio::time::interval(self.config.resync_interval);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);
        resync.tick().await;
        let mut stop_rx = self.stop_rx.clone();

        loop {
            let stopping = *stop_rx.borrow_and_update();
            if stopping {
                info!(kind = R::KIND, in_flight = passes.len(), "Stopping controller");
                Self::drain(&mut passes, &mut queue).await;
                return Ok(());
            }

            self.dispatch(&mut queue, &mut passes);

            tokio::select! {
                Some(joined) = passes.join_next(), if !passes.is_empty() => match joined {
                    Ok((key, report)) => self.handle_report(key, report, &mut queue, &mut timers),
                    Err(e) => error!(kind = R::KIND, error = %e, "Pass task aborted"),
                },
                Some(Ok(key)) = timers.join_next(), if !timers.is_empty() => {
                    queue.add(key);
                }
                event = feed.recv() => match event {
                    Ok(event) => {
                        if event.kind() == R::KIND {
                            debug!(kind = R::KIND, key = %event.key(), event = event.event_type(), "Watch event");
                            queue.add(event.key());
                        }
                    }
                    Err(topology_api::Error::WatchLagged { skipped }) => {
                        warn!(kind = R::KIND, skipped, "Watch lagged, relisting");
                        self.resync(&mut queue).await;
                    }
                    Err(e) => {
                        warn!(kind = R::KIND, error = %e, "Watch feed closed");
                        Self::drain(&mut passes, &mut queue).await;
                        return Err(Error::controller_stopped(e.to_string()));
                    }
                },
                _ = resync.tick() => {
                    self.resync(&mut queue).await;
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        Self::drain(&mut passes, &mut queue).await;
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Stop the controller.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Get a stopper handle.
    pub fn stopper(&self) -> ControllerStopper {
        ControllerStopper {
            stop_tx: self.stop_tx.clone(),
        }
    }

    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn dispatch(&self, queue: &mut WorkQueue, passes: &mut JoinSet<PassReport>) {
        let limit = self.config.max_concurrent_reconciles.max(1);
        while passes.len() < limit {
            let Some(key) = queue.pop() else {
                break;
            };
            let reconciler = Arc::clone(&self.reconciler);
            passes.spawn(async move {
                let pass_key = key.clone();
                // A panicking pass must still hand its key back to the queue.
                let report = tokio::spawn(async move { reconciler.reconcile(&pass_key).await })
                    .await
                    .unwrap_or_else(|e| Err(Error::task_failed(e.to_string())));
                (key, report)
            });
        }
    }

    fn handle_report(
        &self,
        key: ObjectKey,
        report: Result<ReconcileOutcome>,
        queue: &mut WorkQueue,
        timers: &mut JoinSet<ObjectKey>,
    ) {
        queue.done(&key);
        match report {
            Ok(outcome) => {
                queue.forget(&key);
                if let PassResult::Executed(action) = &outcome.result {
                    debug!(kind = R::KIND, key = %key, action = action.name(), "Pass executed");
                }
                match outcome.requeue_after {
                    Some(delay) => Self::schedule(timers, key, delay),
                    None if outcome.requeue => queue.add(key),
                    None => {}
                }
            }
            Err(e) if e.is_retryable() => {
                let failures = queue.record_failure(&key);
                let delay = self.config.backoff.delay(failures);
                warn!(
                    kind = R::KIND,
                    key = %key,
                    failures,
                    retry_in_ms = delay.as_millis(),
                    error = %e,
                    "Reconcile failed, retrying"
                );
                Self::schedule(timers, key, delay);
            }
            Err(e) => {
                queue.forget(&key);
                error!(kind = R::KIND, key = %key, error = %e, "Reconcile failed permanently");
            }
        }
    }

    fn schedule(timers: &mut JoinSet<ObjectKey>, key: ObjectKey, delay: Duration) {
        timers.spawn(async move {
            tokio::time::sleep(delay).await;
            key
        });
    }

    async fn enqueue_all(&self, queue: &mut WorkQueue) -> Result<usize> {
        let objects = self
            .reconciler
            .store()
            .list(R::KIND)
            .await
            .map_err(|e| Error::from_store("list", e))?;
        let count = objects.len();
        for object in objects {
            queue.add(object.key());
        }
        Ok(count)
    }

    async fn resync(&self, queue: &mut WorkQueue) {
        match self.enqueue_all(queue).await {
            Ok(count) => debug!(kind = R::KIND, count, "Resync"),
            Err(e) => warn!(kind = R::KIND, error = %e, "Resync list failed"),
        }
    }

    async fn drain(passes: &mut JoinSet<PassReport>, queue: &mut WorkQueue) {
        while let Some(joined) = passes.join_next().await {
            if let Ok((key, report)) = joined {
                queue.done(&key);
                if let Err(e) = report {
                    debug!(kind = R::KIND, key = %key, error = %e, "Pass failed during shutdown");
                }
            }
        }
    }
}

/// Handle to stop a controller.
#[derive(Clone)]
pub struct ControllerStopper {
    stop_tx: watch::Sender<bool>,
}

impl ControllerStopper {
    /// Stop the controller.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}
