//! Operator configuration: TOML file plus environment overrides.
//!
//! ```toml
//! kinds = ["CassandraCluster", "RedisCluster"]
//!
//! [controller]
//! resync_interval_ms = 30000
//! max_concurrent_reconciles = 4
//!
//! [controller.backoff]
//! initial_ms = 100
//! max_ms = 30000
//! factor = 2
//!
//! [reconciler]
//! requeue_after_action_ms = 0
//!
//! [provisioner]
//! address_prefix = "10.0.0"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use topology_api::KindRegistry;
use tracing::debug;

use crate::controller::ControllerConfig;
use crate::error::{Error, Result};
use crate::provisioner::SimulatedProvisionerConfig;
use crate::reconciler::ReconcilerConfig;

/// Environment variable overriding `controller.resync_interval_ms`.
pub const ENV_RESYNC_INTERVAL_MS: &str = "TOPOLOGY_RESYNC_INTERVAL_MS";
/// Environment variable overriding `controller.max_concurrent_reconciles`.
pub const ENV_MAX_CONCURRENT_RECONCILES: &str = "TOPOLOGY_MAX_CONCURRENT_RECONCILES";

/// Complete operator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Kinds to run controllers for.
    pub kinds: Vec<String>,
    pub controller: ControllerConfig,
    pub reconciler: ReconcilerConfig,
    pub provisioner: SimulatedProvisionerConfig,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            kinds: KindRegistry::with_builtin_kinds()
                .kinds()
                .into_iter()
                .map(str::to_string)
                .collect(),
            controller: ControllerConfig::default(),
            reconciler: ReconcilerConfig::default(),
            provisioner: SimulatedProvisionerConfig::default(),
        }
    }
}

impl OperatorConfig {
    /// Load from a TOML file. Missing sections keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self =
            topology_core::load_toml(path).map_err(|e| Error::invalid_config(e.to_string()))?;
        debug!(path = %path.display(), "Loaded operator config");
        Ok(config)
    }

    /// Parse from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the text is not a valid config.
    pub fn parse(source_name: &str, content: &str) -> Result<Self> {
        topology_core::parse_toml(source_name, content).map_err(|e| Error::invalid_config(e.to_string()))
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if an override is not a number.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if an override is not a number.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_RESYNC_INTERVAL_MS) {
            let ms = parse_env_number::<u64>(ENV_RESYNC_INTERVAL_MS, &value)?;
            self.controller.resync_interval = Duration::from_millis(ms);
        }
        if let Some(value) = lookup(ENV_MAX_CONCURRENT_RECONCILES) {
            self.controller.max_concurrent_reconciles =
                parse_env_number::<usize>(ENV_MAX_CONCURRENT_RECONCILES, &value)?;
        }
        Ok(self)
    }

    /// Check the settings and narrow `registry` to the configured kinds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first bad setting or
    /// unknown kind.
    pub fn validate(&self, registry: &KindRegistry) -> Result<KindRegistry> {
        if self.kinds.is_empty() {
            return Err(Error::invalid_config("kinds must name at least one kind"));
        }
        if self.controller.max_concurrent_reconciles == 0 {
            return Err(Error::invalid_config(
                "controller.max_concurrent_reconciles must be at least 1",
            ));
        }
        if self.controller.resync_interval.is_zero() {
            return Err(Error::invalid_config(
                "controller.resync_interval_ms must be greater than 0",
            ));
        }
        let backoff = &self.controller.backoff;
        if backoff.factor == 0 {
            return Err(Error::invalid_config("controller.backoff.factor must be at least 1"));
        }
        if backoff.initial > backoff.max {
            return Err(Error::invalid_config(
                "controller.backoff.initial_ms must not exceed max_ms",
            ));
        }
        registry
            .select(&self.kinds)
            .map_err(|e| Error::invalid_config(e.to_string()))
    }
}

fn parse_env_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid_config(format!("{name} must be a non-negative integer, got '{value}'")))
}

/// Serde adapter for a [`Duration`] stored as whole milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Like [`duration_ms`], with zero meaning "unset".
pub mod optional_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = value.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok((ms > 0).then(|| Duration::from_millis(ms)))
    }
}
