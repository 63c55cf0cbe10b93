// src/core/controller/fleet.rs

//! Spawns one `ShardController` per `(keyspace, shard)` learned from the
//! topology store, propagates a single shutdown signal to all of them, and
//! periodically logs a fleet-wide health summary.

use crate::core::controller::collaborators::{Agent, TmClient, TopoServer};
use crate::core::controller::config::GroupPolicy;
use crate::core::controller::shard::ShardController;
use crate::core::metrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{info, warn};

/// Watches the topology for shards to supervise and owns the lifetime of
/// every `ShardController` task.
pub struct FleetSupervisor {
    agent: Arc<dyn Agent>,
    tm_client: Arc<dyn TmClient>,
    topo: Arc<dyn TopoServer>,
    policy: GroupPolicy,
    tick_interval: Duration,
    tablet_refresh_interval: Duration,
    max_fetch_concurrency: usize,
    shutdown_tx: broadcast::Sender<()>,
}

impl FleetSupervisor {
    pub fn new(
        agent: Arc<dyn Agent>,
        tm_client: Arc<dyn TmClient>,
        topo: Arc<dyn TopoServer>,
        policy: GroupPolicy,
        tick_interval: Duration,
        tablet_refresh_interval: Duration,
        max_fetch_concurrency: usize,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            agent,
            tm_client,
            topo,
            policy,
            tick_interval,
            tablet_refresh_interval,
            max_fetch_concurrency,
            shutdown_tx,
        }
    }

    /// A handle that, when dropped or signalled, stops every shard
    /// controller this supervisor owns.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Polls the topology store for the fleet's `(keyspace, shard)` set on
    /// `shard_discovery_interval`, spawning a controller for each new pair
    /// and cancelling controllers for pairs that disappeared. Runs until
    /// the shutdown signal fires, then waits for in-flight ticks to drain.
    pub async fn run(self, shard_discovery_interval: Duration) {
        let mut discovery_timer = tokio::time::interval(shard_discovery_interval);
        let mut summary_timer = tokio::time::interval(shard_discovery_interval * 10);
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut active: HashMap<(String, String), AbortHandle> = HashMap::new();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                _ = discovery_timer.tick() => {
                    self.reconcile(&mut tasks, &mut active).await;
                }
                _ = summary_timer.tick() => {
                    info!(active_shards = active.len(), "fleet health summary");
                }
                _ = shutdown_rx.recv() => {
                    info!("fleet supervisor shutting down, draining in-flight ticks");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                Some(res) = tasks.join_next() => {
                    if let Err(e) = res {
                        warn!(error = %e, "a shard controller task panicked");
                    }
                }
            }
        }

        while tasks.join_next().await.is_some() {}
    }

    async fn reconcile(
        &self,
        tasks: &mut JoinSet<()>,
        active: &mut HashMap<(String, String), AbortHandle>,
    ) {
        let pairs = match self.topo.get_srv_keyspace_names().await {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!(error = %e, "failed to enumerate shards from topology");
                return;
            }
        };
        let current: std::collections::HashSet<_> = pairs.into_iter().collect();

        for (keyspace, shard) in current.iter() {
            if active.contains_key(&(keyspace.clone(), shard.clone())) {
                continue;
            }
            info!(keyspace, shard, "discovered new shard, spawning controller");
            let controller = Arc::new(ShardController::new(
                keyspace.clone(),
                shard.clone(),
                Arc::clone(&self.agent),
                Arc::clone(&self.tm_client),
                Arc::clone(&self.topo),
                self.policy.clone(),
                self.tablet_refresh_interval,
                self.max_fetch_concurrency,
            ));
            let shutdown_rx = self.shutdown_tx.subscribe();
            let tick_interval = self.tick_interval;
            let handle = tasks.spawn(async move {
                controller.run(tick_interval, shutdown_rx).await;
            });
            active.insert((keyspace.clone(), shard.clone()), handle);
        }

        let removed: Vec<_> = active
            .keys()
            .filter(|pair| !current.contains(*pair))
            .cloned()
            .collect();
        for pair in removed {
            if let Some(handle) = active.remove(&pair) {
                info!(keyspace = %pair.0, shard = %pair.1, "shard removed from topology, aborting controller");
                handle.abort();
            }
        }
        metrics::ACTIVE_SHARDS.set(active.len() as f64);
    }
}
