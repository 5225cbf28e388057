//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Topology operator
#[derive(Parser, Debug)]
#[command(name = "topology-operator")]
#[command(version)]
#[command(about = "Converge cluster node topologies one action at a time")]
#[command(
    long_about = "Loads CassandraCluster and RedisCluster manifests, compares each resource's desired nodes with its observed nodes, and drives them together through a watch-based controller."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the next action for each resource without executing anything
    Plan {
        /// Manifest files (multi-document YAML)
        #[arg(required = true)]
        manifests: Vec<PathBuf>,

        /// Operator config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Reconcile manifests against the simulated provisioner
    Run {
        /// Manifest files (multi-document YAML)
        #[arg(required = true)]
        manifests: Vec<PathBuf>,

        /// Operator config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop once every resource is converged
        #[arg(long, default_value_t = false)]
        until_converged: bool,

        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// List the kinds this operator serves
    Kinds {
        /// Operator config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "topology-operator",
            "run",
            "a.yaml",
            "b.yaml",
            "--until-converged",
            "--timeout-secs",
            "5",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Commands::Run {
                ref manifests,
                config: None,
                until_converged: true,
                timeout_secs: Some(5),
            } if manifests == &[PathBuf::from("a.yaml"), PathBuf::from("b.yaml")]
        ));
    }

    #[test]
    fn test_plan_requires_manifest() {
        assert!(Cli::try_parse_from(["topology-operator", "plan"]).is_err());
    }

    #[test]
    fn test_kinds_with_config() {
        let cli = Cli::try_parse_from(["topology-operator", "kinds", "-c", "operator.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Kinds { config: Some(_) }));
    }
}
