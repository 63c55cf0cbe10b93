// src/core/controller/mod.rs

//! The diagnose-decide-repair controller: value types, the pure diagnose
//! engine, the repair engine, the per-shard lifecycle, and the fleet
//! supervisor that ties them together.

pub mod collaborators;
pub mod config;
pub mod diagnose;
pub mod fleet;
pub mod group;
pub mod gtid;
pub mod repair;
pub mod shard;
pub mod snapshot;
pub mod types;

pub use collaborators::{Agent, ShardUnlocker, TabletRecord, TabletType, TmClient, TopoServer};
pub use config::GroupPolicy;
pub use diagnose::DiagnoseType;
pub use fleet::FleetSupervisor;
pub use gtid::{GtidOrdering, GtidSet};
pub use repair::RepairOutcome;
pub use shard::ShardController;
pub use types::{GroupView, InstanceKey, MemberRole, MemberState, MemberView};

use crate::config::Config;
use anyhow::Result;
use std::sync::Arc;

/// Starts the fleet supervisor and runs it to completion (i.e. until its
/// shutdown signal fires and every in-flight tick drains).
///
/// `agent`/`tm_client`/`topo` are the caller's concrete collaborator
/// implementations; this crate only depends on their trait interfaces.
pub async fn run(
    config: Config,
    agent: Arc<dyn Agent>,
    tm_client: Arc<dyn TmClient>,
    topo: Arc<dyn TopoServer>,
) -> Result<()> {
    // The tick cadence itself is not separately configurable: it tracks the
    // fastest interval the controller ever needs to act on, the backoff
    // wait, so a BackoffError/BootstrapBackoff diagnosis re-checks promptly.
    let tick_interval = config.group.backoff_error_wait;
    let supervisor = FleetSupervisor::new(
        agent,
        tm_client,
        topo,
        config.group,
        tick_interval,
        config.tablet_refresh_interval,
        config.max_fetch_concurrency,
    );
    supervisor.run(config.shard_discovery_interval).await;
    Ok(())
}
