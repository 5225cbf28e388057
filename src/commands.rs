//! CLI command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use tracing::{info, warn};

use topology_api::{
    DynamicObject, InMemoryResourceStore, KindRegistry, ResourceStore, TracingResourceStore,
    load_manifests,
};
use topology_core::ResultExt;
use topology_reconciler::{NodeProvisioner, OperatorConfig, SimulatedProvisioner};

use crate::cli::Commands;
use crate::handlers::{KindHandlers, Runner};

/// How often `run --until-converged` checks the store.
const CONVERGENCE_POLL: Duration = Duration::from_millis(50);

/// Execute a CLI command.
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Plan { manifests, config } => cmd_plan(&manifests, config.as_deref()),
        Commands::Run {
            manifests,
            config,
            until_converged,
            timeout_secs,
        } => {
            cmd_run(
                &manifests,
                config.as_deref(),
                until_converged,
                timeout_secs.map(Duration::from_secs),
            )
            .await
        }
        Commands::Kinds { config } => cmd_kinds(config.as_deref()),
    }
}

/// Load config, apply environment overrides and resolve the served kinds
/// together with their handlers.
fn load_config(path: Option<&Path>) -> Result<(OperatorConfig, KindRegistry, KindHandlers)> {
    let config = match path {
        Some(path) => OperatorConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => OperatorConfig::default(),
    };
    let config = config.apply_env()?;
    let registry = config.validate(&KindRegistry::with_builtin_kinds())?;
    let handlers = KindHandlers::builtin().serving(&registry)?;
    Ok((config, registry, handlers))
}

fn cmd_kinds(config: Option<&Path>) -> Result<()> {
    let (_, registry, _) = load_config(config)?;
    println!("{}", registry.kinds().join("\n"));
    Ok(())
}

fn cmd_plan(manifests: &[PathBuf], config: Option<&Path>) -> Result<()> {
    let (_, registry, handlers) = load_config(config)?;
    let objects = load_manifests(manifests, &registry).context("Failed to load manifests")?;
    println!("{}", plan_lines(&handlers, &objects)?.join("\n"));
    Ok(())
}

/// One line per object: its identity and next action.
fn plan_lines(handlers: &KindHandlers, objects: &[DynamicObject]) -> Result<Vec<String>> {
    objects
        .iter()
        .map(|object| {
            let next = handlers
                .identify(object)?
                .map_or_else(|| "converged".to_string(), |a| a.description());
            Ok(format!("{} {}: {next}", object.kind, object.key()))
        })
        .collect()
}

async fn cmd_run(
    manifests: &[PathBuf],
    config_path: Option<&Path>,
    until_converged: bool,
    timeout: Option<Duration>,
) -> Result<()> {
    let (config, registry, handlers) = load_config(config_path)?;
    let objects = load_manifests(manifests, &registry).context("Failed to load manifests")?;

    let store: Arc<dyn ResourceStore> = Arc::new(TracingResourceStore::new(InMemoryResourceStore::new()));
    for object in objects {
        store.create(object).await.context("Failed to seed store")?;
    }

    let provisioner: Arc<dyn NodeProvisioner> =
        Arc::new(SimulatedProvisioner::new(config.provisioner.clone()));

    let runners: Vec<Runner> = handlers
        .iter()
        .map(|(_, handler)| handler.spawn(&store, &provisioner, &config.reconciler, &config.controller))
        .collect();

    info!(kinds = %handlers.kinds().join(","), "Controllers started");

    let finished = wait(&store, &handlers, until_converged, timeout).await;

    for (stopper, _) in &runners {
        stopper.stop();
    }
    for (_, handle) in runners {
        if let Err(e) = handle.await.context("Controller task failed")? {
            warn!(error = %e, "Controller exited with error");
        }
    }

    print!("{}", render_status(&store, &handlers).await?);

    match finished {
        Finished::TimedOut if until_converged => bail!("Timed out before convergence"),
        _ => Ok(()),
    }
}

enum Finished {
    Converged,
    Interrupted,
    TimedOut,
}

async fn wait(
    store: &Arc<dyn ResourceStore>,
    handlers: &KindHandlers,
    until_converged: bool,
    timeout: Option<Duration>,
) -> Finished {
    let until = async {
        if until_converged {
            while !all_converged(store, handlers).await {
                tokio::time::sleep(CONVERGENCE_POLL).await;
            }
            info!("All resources converged");
            Finished::Converged
        } else {
            info!("Running. Press Ctrl+C to stop.");
            wait_for_shutdown().await;
            Finished::Interrupted
        }
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, until).await.unwrap_or_else(|_| {
            warn!(timeout_secs = limit.as_secs(), "Timed out");
            Finished::TimedOut
        }),
        None => until.await,
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn wait_for_shutdown() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(err) => warn!("Failed to listen for shutdown signal: {}", err),
    }
}

async fn list_all(store: &Arc<dyn ResourceStore>, handlers: &KindHandlers) -> Result<Vec<DynamicObject>> {
    let mut objects = Vec::new();
    for kind in handlers.kinds() {
        objects.extend(store.list(kind).await?);
    }
    Ok(objects)
}

async fn all_converged(store: &Arc<dyn ResourceStore>, handlers: &KindHandlers) -> bool {
    list_all(store, handlers)
        .await
        .and_then(|objects| {
            objects
                .iter()
                .map(|object| handlers.identify(object))
                .fold_ok(true, |all, next| all && next.is_none())
        })
        .or_default_logged(false)
}

/// Every stored object as a multi-document YAML stream.
async fn render_status(store: &Arc<dyn ResourceStore>, handlers: &KindHandlers) -> Result<String> {
    list_all(store, handlers)
        .await?
        .iter()
        .map(|object| serde_yaml::to_string(object).map(|doc| format!("---\n{doc}")))
        .collect::<std::result::Result<String, _>>()
        .context("Failed to render status")
}
