// src/core/controller/config.rs

//! The diagnose/repair policy shared by every shard the fleet supervises.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for one group's diagnose/repair behaviour, the repair
/// waits, and the anti-thrash discipline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPolicy {
    /// Expected number of replicating instances in each group.
    #[serde(default = "default_group_size")]
    pub group_size: usize,

    /// Minimum acceptable after-repair replica count.
    #[serde(default = "default_min_num_replica")]
    pub min_num_replica: usize,

    /// Wait before re-diagnosing a `BackoffError`.
    #[serde(with = "humantime_serde", default = "default_backoff_error_wait")]
    pub backoff_error_wait: Duration,

    /// Quiesce period after `BootstrapGroupLocked`.
    #[serde(with = "humantime_serde", default = "default_bootstrap_wait")]
    pub bootstrap_wait: Duration,

    /// Consecutive non-healthy ticks without progress before a shard enters
    /// anti-thrash backoff.
    #[serde(default = "default_anti_thrash_threshold")]
    pub anti_thrash_threshold: u32,

    /// Ceiling on the anti-thrash exponential backoff.
    #[serde(with = "humantime_serde", default = "default_anti_thrash_max_backoff")]
    pub anti_thrash_max_backoff: Duration,
}

fn default_group_size() -> usize {
    3
}

fn default_min_num_replica() -> usize {
    2
}

fn default_backoff_error_wait() -> Duration {
    Duration::from_secs(5)
}

fn default_bootstrap_wait() -> Duration {
    Duration::from_secs(5)
}

fn default_anti_thrash_threshold() -> u32 {
    3
}

fn default_anti_thrash_max_backoff() -> Duration {
    Duration::from_secs(300)
}

impl Default for GroupPolicy {
    fn default() -> Self {
        Self {
            group_size: default_group_size(),
            min_num_replica: default_min_num_replica(),
            backoff_error_wait: default_backoff_error_wait(),
            bootstrap_wait: default_bootstrap_wait(),
            anti_thrash_threshold: default_anti_thrash_threshold(),
            anti_thrash_max_backoff: default_anti_thrash_max_backoff(),
        }
    }
}

impl GroupPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.group_size == 0 {
            return Err(anyhow!("group_size cannot be 0"));
        }
        if self.min_num_replica >= self.group_size {
            return Err(anyhow!(
                "min_num_replica ({}) must be less than group_size ({})",
                self.min_num_replica,
                self.group_size
            ));
        }
        if self.anti_thrash_threshold == 0 {
            return Err(anyhow!("anti_thrash_threshold cannot be 0"));
        }
        Ok(())
    }

    pub fn quorum_size(&self) -> usize {
        self.group_size / 2 + 1
    }
}
