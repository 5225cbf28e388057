//! # topology-operator
//!
//! Command-line entry point for the cluster topology operator.
//!
//! Manifests are loaded into an in-memory store, one controller per served
//! kind watches that store, and every pass executes at most one node action
//! through the simulated provisioner.
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`); command
//! output goes to stdout.

#![forbid(unsafe_code)]

mod cli;
mod commands;
mod handlers;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    commands::execute_command(cli.command).await
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
