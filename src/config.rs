// src/config.rs

//! Loads and validates the controller's top-level configuration.

use crate::core::controller::config::GroupPolicy;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// The controller's top-level configuration, loaded from a TOML file.
///
/// Coordinates for the concrete `TopoServer`/`Agent`/`TmClient` backends
/// (addresses, TLS, credentials, protocol selection) are a surrounding-binary
/// concern and are not modeled here; this crate only needs trait objects
/// implementing those collaborators, however they were constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The `tracing` `EnvFilter` directive used when no `RUST_LOG` is set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// How often a shard controller re-reads its tablet inventory from the
    /// topology store.
    #[serde(with = "humantime_serde", default = "default_tablet_refresh")]
    pub tablet_refresh_interval: Duration,

    /// How often the fleet supervisor polls the topology store for
    /// `(keyspace, shard)` additions/removals.
    #[serde(with = "humantime_serde", default = "default_shard_discovery")]
    pub shard_discovery_interval: Duration,

    /// Upper bound on concurrent per-instance fetches (`FetchGroupView`,
    /// `FetchApplierGTIDSet`, `Ping`) within a single tick.
    #[serde(default = "default_max_fetch_concurrency")]
    pub max_fetch_concurrency: usize,

    /// The diagnose/repair policy shared by every shard in the fleet.
    #[serde(default)]
    pub group: GroupPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tablet_refresh() -> Duration {
    Duration::from_secs(30)
}

fn default_shard_discovery() -> Duration {
    Duration::from_secs(15)
}

fn default_max_fetch_concurrency() -> usize {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            tablet_refresh_interval: default_tablet_refresh(),
            shard_discovery_interval: default_shard_discovery(),
            max_fetch_concurrency: default_max_fetch_concurrency(),
            group: GroupPolicy::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the parsed configuration for logical consistency.
    fn validate(&self) -> Result<()> {
        if self.max_fetch_concurrency == 0 {
            return Err(anyhow!("max_fetch_concurrency cannot be 0"));
        }
        self.group.validate()?;
        Ok(())
    }
}
