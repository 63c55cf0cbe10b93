// src/core/controller/shard.rs

//! The per-shard lifecycle: tablet inventory, the tick loop, and the
//! anti-thrash/backoff discipline.
//!
//! Mirrors the monitor-task shape used elsewhere in this codebase for a
//! single managed unit: one long-lived struct, one tick loop driven by
//! `tokio::time::interval`, state guarded by a `parking_lot::Mutex` that is
//! never held across an `.await`.

use crate::core::controller::collaborators::{Agent, TabletRecord, TmClient, TopoServer};
use crate::core::controller::config::GroupPolicy;
use crate::core::controller::diagnose::{DiagnoseType, diagnose};
use crate::core::controller::repair::repair;
use crate::core::controller::snapshot::ShardSnapshot;
use crate::core::controller::types::InstanceKey;
use crate::core::metrics;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Tracks, per diagnosis kind, how many consecutive ticks it has recurred
/// without progress, and the resulting backoff.
#[derive(Debug, Clone, Default)]
struct AntiThrash {
    last_diagnosis: Option<DiagnoseType>,
    consecutive_failures: u32,
    last_active_members: HashSet<InstanceKey>,
    last_primary: Option<InstanceKey>,
    backoff_until: Option<Instant>,
}

impl AntiThrash {
    /// Records one tick's outcome and returns the backoff to apply before
    /// the next repair attempt, if any.
    fn record(
        &mut self,
        diagnosis: &DiagnoseType,
        active_members: &HashSet<InstanceKey>,
        primary: &Option<InstanceKey>,
        policy: &GroupPolicy,
    ) -> Option<Duration> {
        let progressed = active_members != &self.last_active_members || primary != &self.last_primary;
        self.last_active_members = active_members.clone();
        self.last_primary = primary.clone();

        if diagnosis.is_healthy() {
            self.consecutive_failures = 0;
            self.last_diagnosis = Some(diagnosis.clone());
            self.backoff_until = None;
            return None;
        }

        if self.last_diagnosis.as_ref() == Some(diagnosis) && !progressed {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 1;
        }
        self.last_diagnosis = Some(diagnosis.clone());

        if self.consecutive_failures >= policy.anti_thrash_threshold {
            let exponent = self.consecutive_failures - policy.anti_thrash_threshold;
            let backoff = policy
                .backoff_error_wait
                .saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX))
                .min(policy.anti_thrash_max_backoff);
            warn!(
                diagnosis = %diagnosis,
                consecutive_failures = self.consecutive_failures,
                backoff_secs = backoff.as_secs(),
                "shard entering anti-thrash backoff"
            );
            self.backoff_until = Some(Instant::now() + backoff);
            Some(backoff)
        } else {
            None
        }
    }

    fn is_backing_off(&self) -> bool {
        self.backoff_until.is_some_and(|t| Instant::now() < t)
    }
}

/// The tablet inventory and last-diagnosis bookkeeping for one shard,
/// persisted across ticks within this process's lifetime only.
struct ShardInner {
    tablets: HashMap<String, TabletRecord>,
    last_tablet_refresh: Option<Instant>,
    last_diagnose_result: Option<DiagnoseType>,
    last_diagnose_time: Option<Instant>,
    anti_thrash: AntiThrash,
}

/// Drives the diagnose/repair loop for exactly one `(keyspace, shard)`.
pub struct ShardController {
    keyspace: String,
    shard: String,
    inner: Mutex<ShardInner>,
    agent: Arc<dyn Agent>,
    tm_client: Arc<dyn TmClient>,
    topo: Arc<dyn TopoServer>,
    policy: GroupPolicy,
    tablet_refresh_interval: Duration,
    max_fetch_concurrency: usize,
}

impl ShardController {
    pub fn new(
        keyspace: String,
        shard: String,
        agent: Arc<dyn Agent>,
        tm_client: Arc<dyn TmClient>,
        topo: Arc<dyn TopoServer>,
        policy: GroupPolicy,
        tablet_refresh_interval: Duration,
        max_fetch_concurrency: usize,
    ) -> Self {
        Self {
            keyspace,
            shard,
            inner: Mutex::new(ShardInner {
                tablets: HashMap::new(),
                last_tablet_refresh: None,
                last_diagnose_result: None,
                last_diagnose_time: None,
                anti_thrash: AntiThrash::default(),
            }),
            agent,
            tm_client,
            topo,
            policy,
            tablet_refresh_interval,
            max_fetch_concurrency,
        }
    }

    /// Runs the tick loop until `shutdown` fires. Waits for the current tick
    /// to complete before returning; never starts a new repair step after
    /// shutdown is observed.
    pub async fn run(self: Arc<Self>, tick_interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(tick_interval);
        info!(keyspace = %self.keyspace, shard = %self.shard, "shard controller started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    info!(keyspace = %self.keyspace, shard = %self.shard, "shard controller shutting down");
                    return;
                }
            }
        }
    }

    /// One full `Idle -> Refreshing -> Diagnosing -> Repairing -> Idle` pass.
    async fn tick(&self) {
        if self.inner.lock().anti_thrash.is_backing_off() {
            return;
        }

        // Refreshing: reload the tablet inventory from topo if stale.
        let needs_refresh = {
            let inner = self.inner.lock();
            inner
                .last_tablet_refresh
                .is_none_or(|t| t.elapsed() >= self.tablet_refresh_interval)
        };
        if needs_refresh {
            match self.topo.get_tablets_by_shard(&self.keyspace, &self.shard).await {
                Ok(records) => {
                    let mut inner = self.inner.lock();
                    inner.tablets = records.into_iter().map(|t| (t.alias.clone(), t)).collect();
                    inner.last_tablet_refresh = Some(Instant::now());
                }
                Err(e) => {
                    warn!(keyspace = %self.keyspace, shard = %self.shard, error = %e, "failed to refresh tablet inventory");
                    return;
                }
            }
        }

        let tablets = self.inner.lock().tablets.clone();
        if tablets.is_empty() {
            return;
        }

        let snapshot = ShardSnapshot::gather(
            tablets,
            Arc::clone(&self.agent),
            Arc::clone(&self.tm_client),
            self.max_fetch_concurrency,
        )
        .await;

        // Diagnosing.
        let diagnosis = diagnose(&snapshot, &self.policy);
        metrics::DIAGNOSES_TOTAL
            .with_label_values(&[&self.keyspace, &self.shard, &diagnosis.to_string()])
            .inc();
        metrics::SHARD_HEALTHY
            .with_label_values(&[&self.keyspace, &self.shard])
            .set(if diagnosis.is_healthy() { 1.0 } else { 0.0 });

        if !diagnosis.is_healthy() {
            warn!(
                keyspace = %self.keyspace,
                shard = %self.shard,
                diagnosis = %diagnosis,
                snapshot = %serde_json::json!({
                    "views": snapshot.views.iter().map(|(k, v)| (k.clone(), v.as_ref().map(|_| "ok").map_err(|e| e.to_string()))).collect::<HashMap<_, _>>(),
                    "ping_ok": snapshot.ping_ok,
                }),
                "non-healthy diagnosis"
            );
        }

        let active_members: HashSet<InstanceKey> = snapshot
            .views
            .values()
            .filter_map(|v| v.as_ref().ok())
            .flat_map(|v| v.members.iter())
            .filter(|m| m.state.is_active())
            .map(|m| m.key.clone())
            .collect();
        let primary = snapshot
            .views
            .values()
            .filter_map(|v| v.as_ref().ok())
            .flat_map(|v| v.members.iter())
            .find(|m| m.role == crate::core::controller::types::MemberRole::Primary)
            .map(|m| m.key.clone());

        let backoff = {
            let mut inner = self.inner.lock();
            inner.last_diagnose_result = Some(diagnosis.clone());
            inner.last_diagnose_time = Some(Instant::now());
            inner
                .anti_thrash
                .record(&diagnosis, &active_members, &primary, &self.policy)
        };
        metrics::ANTI_THRASH_BACKOFF_SECONDS
            .with_label_values(&[&self.keyspace, &self.shard])
            .set(backoff.map(|d| d.as_secs_f64()).unwrap_or(0.0));

        if diagnosis.is_healthy() {
            return;
        }

        // Repairing: acquire the distributed shard lock, scoped to this
        // block only.
        let unlocker = match self.topo.lock_shard(&self.keyspace, &self.shard).await {
            Ok(u) => u,
            Err(e) => {
                warn!(keyspace = %self.keyspace, shard = %self.shard, error = %e, "failed to acquire shard lock");
                return;
            }
        };

        let outcome = repair(&diagnosis, &snapshot, &self.policy, &self.agent, &self.tm_client).await;
        let outcome_label = match &outcome {
            Ok(_) => "applied",
            Err(e) if e.is_semantic_refusal() => "refused",
            Err(_) => "error",
        };
        metrics::REPAIRS_TOTAL
            .with_label_values(&[&self.keyspace, &self.shard, &diagnosis.to_string(), outcome_label])
            .inc();

        unlocker.unlock().await;
    }
}
