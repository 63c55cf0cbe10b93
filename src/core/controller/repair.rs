// src/core/controller/repair.rs

//! Dispatches a `DiagnoseType` to its one idempotent repair action.
//!
//! Every action logs before and after, and candidate-ambiguity errors
//! include the full GTID set of each candidate (see `spec.md` §7).

use crate::core::VtgrError;
use crate::core::controller::collaborators::{Agent, TabletType, TmClient};
use crate::core::controller::config::GroupPolicy;
use crate::core::controller::diagnose::DiagnoseType;
use crate::core::controller::gtid::select_best_candidate;
use crate::core::controller::snapshot::ShardSnapshot;
use crate::core::controller::types::{InstanceKey, MemberRole, MemberState};
use std::sync::Arc;
use tracing::{info, warn};

/// What happened as a result of dispatching a repair action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    /// The action ran to completion (it may take another tick to converge).
    Applied(String),
    /// The diagnosis requires no action this tick (e.g. waiting out a
    /// backoff).
    NoOp(String),
}

/// Runs the repair action for `diagnosis` against `snapshot`.
pub async fn repair(
    diagnosis: &DiagnoseType,
    snapshot: &ShardSnapshot,
    policy: &GroupPolicy,
    agent: &Arc<dyn Agent>,
    tm_client: &Arc<dyn TmClient>,
) -> Result<RepairOutcome, VtgrError> {
    info!(diagnosis = %diagnosis, "starting repair");
    let outcome = match diagnosis {
        DiagnoseType::ShardHasNoGroup => repair_bootstrap(snapshot, policy, agent, tm_client).await,
        DiagnoseType::ShardHasInactiveGroup => repair_rebootstrap(snapshot, agent).await,
        DiagnoseType::WrongPrimaryTablet => repair_realign_topology(snapshot, tm_client).await,
        DiagnoseType::UnreachablePrimary => repair_graceful_failover(snapshot, agent, tm_client).await,
        DiagnoseType::InsufficientGroupSize => repair_rejoin(snapshot, agent).await,
        DiagnoseType::UnconnectedReplica => repair_rejoin_one(snapshot, agent).await,
        DiagnoseType::ReadOnlyShard => repair_clear_read_only(snapshot, agent).await,
        DiagnoseType::BackoffError | DiagnoseType::BootstrapBackoff => {
            Ok(RepairOutcome::NoOp(format!("waiting out {diagnosis}")))
        }
        DiagnoseType::SplitBrain => Err(VtgrError::SplitBrain),
        DiagnoseType::ShardNetworkPartition => Err(VtgrError::NetworkPartition),
        DiagnoseType::Healthy => Ok(RepairOutcome::NoOp("shard is healthy".to_string())),
    };

    match &outcome {
        Ok(o) => info!(diagnosis = %diagnosis, outcome = ?o, "repair finished"),
        Err(e) => warn!(diagnosis = %diagnosis, error = %e, "repair refused or failed"),
    }
    outcome
}

/// Reachable candidates with their GTID sets, keyed by the order they
/// appear in the snapshot's tablet map.
fn reachable_candidates(snapshot: &ShardSnapshot) -> Vec<(InstanceKey, crate::core::controller::gtid::GtidSet)> {
    snapshot
        .tablets
        .values()
        .filter(|t| snapshot.ping_ok.get(&t.alias).copied().unwrap_or(false))
        .filter_map(|t| {
            let gtid = snapshot.gtid.get(&t.alias)?.as_ref().ok()?.clone();
            Some((t.instance_key(), gtid))
        })
        .collect()
}

async fn repair_bootstrap(
    snapshot: &ShardSnapshot,
    policy: &GroupPolicy,
    agent: &Arc<dyn Agent>,
    tm_client: &Arc<dyn TmClient>,
) -> Result<RepairOutcome, VtgrError> {
    let candidates = reachable_candidates(snapshot);
    if candidates.len() < 2 {
        return Err(VtgrError::UnsafeBootstrap);
    }
    let candidate = select_best_candidate(&candidates)?;
    agent.bootstrap_group_locked(&candidate).await?;
    tokio::time::sleep(policy.bootstrap_wait).await;

    if let Some(tablet) = snapshot.tablets.values().find(|t| t.instance_key() == candidate) {
        if tablet.tablet_type != TabletType::Master {
            tm_client.change_type(tablet, TabletType::Master).await?;
        }
    }
    Ok(RepairOutcome::Applied(format!("bootstrapped group on {candidate}")))
}

async fn repair_rebootstrap(
    snapshot: &ShardSnapshot,
    agent: &Arc<dyn Agent>,
) -> Result<RepairOutcome, VtgrError> {
    let resolved_name = snapshot
        .views
        .values()
        .filter_map(|v| v.as_ref().ok())
        .find_map(|v| v.group_name.clone());

    let candidates: Vec<_> = reachable_candidates(snapshot)
        .into_iter()
        .filter(|(key, _)| {
            let alias = snapshot
                .tablets
                .values()
                .find(|t| &t.instance_key() == key)
                .map(|t| &t.alias);
            match (&resolved_name, alias) {
                (Some(name), Some(alias)) => snapshot
                    .views
                    .get(alias)
                    .and_then(|v| v.as_ref().ok())
                    .and_then(|v| v.group_name.as_ref())
                    .is_some_and(|g| g == name),
                _ => true,
            }
        })
        .collect();

    let candidate = select_best_candidate(&candidates)?;
    agent.stop_group_locked(&candidate).await?;
    agent.bootstrap_group_locked(&candidate).await?;
    Ok(RepairOutcome::Applied(format!("rebootstrapped group on {candidate}")))
}

async fn repair_realign_topology(
    snapshot: &ShardSnapshot,
    tm_client: &Arc<dyn TmClient>,
) -> Result<RepairOutcome, VtgrError> {
    let group_primary = snapshot
        .views
        .values()
        .filter_map(|v| v.as_ref().ok())
        .flat_map(|v| v.members.iter())
        .find(|m| m.role == MemberRole::Primary)
        .map(|m| m.key.clone())
        .ok_or(VtgrError::UnsafeBootstrap)?;

    let correct_tablet = snapshot
        .tablets
        .values()
        .find(|t| t.instance_key() == group_primary)
        .ok_or_else(|| VtgrError::Unreachable(group_primary.to_string()))?;

    if let Some(current_master) = snapshot
        .tablets
        .values()
        .find(|t| t.tablet_type == TabletType::Master)
    {
        if current_master.instance_key() != group_primary {
            tm_client.change_type(current_master, TabletType::Replica).await?;
        }
    }
    tm_client.change_type(correct_tablet, TabletType::Master).await?;
    Ok(RepairOutcome::Applied(format!(
        "realigned topology MASTER to {group_primary}"
    )))
}

async fn repair_graceful_failover(
    snapshot: &ShardSnapshot,
    agent: &Arc<dyn Agent>,
    tm_client: &Arc<dyn TmClient>,
) -> Result<RepairOutcome, VtgrError> {
    let candidates = reachable_candidates(snapshot);
    let candidate = select_best_candidate(&candidates)?;
    agent.failover(&candidate).await?;
    if let Some(tablet) = snapshot.tablets.values().find(|t| t.instance_key() == candidate) {
        tm_client.change_type(tablet, TabletType::Master).await?;
    }
    Ok(RepairOutcome::Applied(format!("failed over to {candidate}")))
}

async fn repair_rejoin(
    snapshot: &ShardSnapshot,
    agent: &Arc<dyn Agent>,
) -> Result<RepairOutcome, VtgrError> {
    let primary_key = snapshot
        .views
        .values()
        .filter_map(|v| v.as_ref().ok())
        .flat_map(|v| v.members.iter())
        .find(|m| m.role == MemberRole::Primary)
        .map(|m| m.key.clone())
        .ok_or(VtgrError::UnsafeBootstrap)?;

    let mut rejoined = Vec::new();
    for (alias, view) in &snapshot.views {
        let Ok(view) = view else { continue };
        let Some(self_member) = view.members.iter().find(|m| m.key == view.self_key) else {
            continue;
        };
        if matches!(self_member.state, MemberState::Offline | MemberState::Error) {
            agent.stop_group_locked(&view.self_key).await?;
            agent.join_group_locked(&view.self_key, &primary_key).await?;
            rejoined.push(alias.clone());
        }
    }
    Ok(RepairOutcome::Applied(format!("rejoined {} member(s)", rejoined.len())))
}

async fn repair_rejoin_one(
    snapshot: &ShardSnapshot,
    agent: &Arc<dyn Agent>,
) -> Result<RepairOutcome, VtgrError> {
    let primary_key = snapshot
        .views
        .values()
        .filter_map(|v| v.as_ref().ok())
        .flat_map(|v| v.members.iter())
        .find(|m| m.role == MemberRole::Primary)
        .map(|m| m.key.clone())
        .ok_or(VtgrError::UnsafeBootstrap)?;

    let mut offline_replicas: Vec<_> = snapshot
        .tablets
        .values()
        .filter(|t| t.tablet_type == TabletType::Replica)
        .filter(|t| {
            matches!(
                snapshot.views.get(&t.alias),
                Some(Ok(v)) if matches!(
                    v.members.iter().find(|m| m.key == v.self_key).map(|m| m.state),
                    Some(MemberState::Offline) | Some(MemberState::Error)
                )
            )
        })
        .collect();
    offline_replicas.sort_by(|a, b| a.alias.cmp(&b.alias));

    let target = offline_replicas
        .first()
        .ok_or_else(|| VtgrError::InvariantViolation("no unconnected replica found".to_string()))?;
    let target_key = target.instance_key();
    agent.stop_group_locked(&target_key).await?;
    agent.join_group_locked(&target_key, &primary_key).await?;
    Ok(RepairOutcome::Applied(format!("rejoined {}", target.alias)))
}

async fn repair_clear_read_only(
    snapshot: &ShardSnapshot,
    agent: &Arc<dyn Agent>,
) -> Result<RepairOutcome, VtgrError> {
    let master = snapshot
        .tablets
        .values()
        .find(|t| t.tablet_type == TabletType::Master)
        .ok_or(VtgrError::UnsafeBootstrap)?;
    let key = master.instance_key();
    agent.set_super_read_only(&key, false).await?;
    Ok(RepairOutcome::Applied(format!("cleared read-only on {key}")))
}
