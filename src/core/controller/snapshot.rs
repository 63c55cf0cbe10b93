// src/core/controller/snapshot.rs

//! Builds a `ShardSnapshot`: the immutable, tick-local bundle of every
//! tablet's group view, GTID position, and reachability, gathered with a
//! bounded fan-out.

use crate::core::VtgrError;
use crate::core::controller::collaborators::{Agent, TabletRecord, TmClient};
use crate::core::controller::gtid::GtidSet;
use crate::core::controller::types::GroupView;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// The tick-local bundle every downstream stage reasons over. Regenerated
/// every tick; never mutated after construction.
#[derive(Debug, Clone)]
pub struct ShardSnapshot {
    pub tablets: HashMap<String, TabletRecord>,
    pub views: HashMap<String, Result<GroupView, VtgrError>>,
    pub gtid: HashMap<String, Result<GtidSet, VtgrError>>,
    /// Per-tablet `Agent::ping` (MySQL reachability), keyed by alias.
    pub ping_ok: HashMap<String, bool>,
    /// Per-tablet `TmClient::ping` (tablet-process liveness, distinct from
    /// MySQL reachability per §4.2), keyed by alias.
    pub tablet_ping_ok: HashMap<String, bool>,
}

impl ShardSnapshot {
    /// Gathers `FetchGroupView`, `FetchApplierGTIDSet`, and both `Agent::Ping`
    /// and `TMClient::Ping` for every tablet in `tablets`, concurrently,
    /// bounded by `max_concurrency`.
    ///
    /// GTID fetches complete before this function returns, satisfying the
    /// "GTID fetches must complete before candidate selection" ordering
    /// guarantee; the caller runs diagnosis only after this returns.
    pub async fn gather(
        tablets: HashMap<String, TabletRecord>,
        agent: Arc<dyn Agent>,
        tm_client: Arc<dyn TmClient>,
        max_concurrency: usize,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));

        let mut views = HashMap::with_capacity(tablets.len());
        let mut gtid = HashMap::with_capacity(tablets.len());
        let mut ping_ok = HashMap::with_capacity(tablets.len());
        let mut tablet_ping_ok = HashMap::with_capacity(tablets.len());

        #[allow(clippy::type_complexity)]
        let mut join_set: JoinSet<(
            String,
            Result<GroupView, VtgrError>,
            Result<GtidSet, VtgrError>,
            bool,
            bool,
        )> = JoinSet::new();

        for (alias, tablet) in &tablets {
            let alias = alias.clone();
            let tablet = tablet.clone();
            let key = tablet.instance_key();
            let agent = Arc::clone(&agent);
            let tm_client = Arc::clone(&tm_client);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
                let view = agent.fetch_group_view(&alias, &key).await;
                let gtid_set = agent.fetch_applier_gtid_set(&key).await;
                let ping_ok = agent.ping(&key).await.is_ok();
                let tablet_ping_ok = tm_client.ping(&tablet).await.is_ok();
                (alias, view, gtid_set, ping_ok, tablet_ping_ok)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((alias, view, gtid_set, pinged, tablet_pinged)) => {
                    views.insert(alias.clone(), view);
                    gtid.insert(alias.clone(), gtid_set);
                    ping_ok.insert(alias.clone(), pinged);
                    tablet_ping_ok.insert(alias, tablet_pinged);
                }
                Err(join_err) => {
                    // A fetch task panicked; treat it as an unreachable
                    // instance rather than crashing the shard controller.
                    tracing::error!(error = %join_err, "fetch task panicked during snapshot gather");
                }
            }
        }

        Self {
            tablets,
            views,
            gtid,
            ping_ok,
            tablet_ping_ok,
        }
    }

    /// Number of tablets whose MySQL instance answered `Agent::Ping`
    /// successfully this tick.
    pub fn reachable_count(&self) -> usize {
        self.ping_ok.values().filter(|&&ok| ok).count()
    }

    /// Number of tablets whose tablet process answered `TMClient::Ping`
    /// successfully this tick.
    pub fn tablet_reachable_count(&self) -> usize {
        self.tablet_ping_ok.values().filter(|&&ok| ok).count()
    }

    pub fn total_count(&self) -> usize {
        self.tablets.len()
    }
}
