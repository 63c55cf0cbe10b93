// src/core/controller/diagnose.rs

//! The pure diagnose engine: `(ShardSnapshot, GroupPolicy) -> DiagnoseType`.
//!
//! Conditions are evaluated in the order the controller's own decision tree
//! requires: diagnoses that would make a lower-priority repair unsafe
//! (split-brain, partition, an in-flight bootstrap) must short-circuit
//! first. The evaluation order here is `SplitBrain`, `BootstrapBackoff`,
//! `ShardHasNoGroup`, `ShardHasInactiveGroup`, `ShardNetworkPartition`,
//! `BackoffError`, `WrongPrimaryTablet`, `UnreachablePrimary`,
//! `UnconnectedReplica`, `InsufficientGroupSize`, `ReadOnlyShard`,
//! `Healthy` — see `DESIGN.md` for why this departs from the naming order
//! (`BootstrapBackoff` must precede the group-name conditions it would
//! otherwise race with; `ShardNetworkPartition` is checked only after both
//! group-name conditions, so a cold no-group shard with a minority of
//! tablets ever registered still falls through to the bootstrap-refusal
//! path instead of being misreported as a partition; and
//! `UnconnectedReplica`'s narrower single-node repair is preferred over
//! `InsufficientGroupSize`'s generic one whenever both would apply).

use crate::core::controller::collaborators::TabletType;
use crate::core::controller::config::GroupPolicy;
use crate::core::controller::group::SQLGroup;
use crate::core::controller::snapshot::ShardSnapshot;
use crate::core::controller::types::{InstanceKey, MemberRole, MemberState};
use serde::{Deserialize, Serialize};

/// The outcome of diagnosing one shard's snapshot. Exactly one variant is
/// returned per `diagnose` call.
#[derive(Debug, Clone, PartialEq, Eq, strum_macros::Display, Serialize, Deserialize)]
pub enum DiagnoseType {
    ShardHasNoGroup,
    ShardHasInactiveGroup,
    SplitBrain,
    ShardNetworkPartition,
    BackoffError,
    BootstrapBackoff,
    WrongPrimaryTablet,
    UnreachablePrimary,
    InsufficientGroupSize,
    UnconnectedReplica,
    ReadOnlyShard,
    Healthy,
}

impl DiagnoseType {
    /// `Healthy` is the only diagnosis that is not itself an incident.
    pub fn is_healthy(&self) -> bool {
        matches!(self, DiagnoseType::Healthy)
    }
}

/// Classifies `snapshot` into exactly one `DiagnoseType`.
pub fn diagnose(snapshot: &ShardSnapshot, policy: &GroupPolicy) -> DiagnoseType {
    let ok_views: Vec<_> = snapshot
        .views
        .values()
        .filter_map(|v| v.as_ref().ok())
        .cloned()
        .collect();
    let group = SQLGroup::aggregate(&ok_views, policy.group_size);

    // 3. SplitBrain short-circuits everything below it: repair must never
    // act while the group's identity itself is ambiguous.
    if group.split_brain {
        return DiagnoseType::SplitBrain;
    }

    // 6. BootstrapBackoff: exactly one member RECOVERING, rest OFFLINE;
    // a bootstrap is already in progress. Checked ahead of everything below
    // it (including ShardHasNoGroup/ShardHasInactiveGroup and
    // BackoffError, see DESIGN.md) since re-diagnosing into another
    // bootstrap/rebootstrap while one is converging is unsafe.
    let recovering_count = ok_views
        .iter()
        .filter(|v| self_state(v) == Some(MemberState::Recovering))
        .count();
    let others_offline = ok_views
        .iter()
        .filter(|v| self_state(v) != Some(MemberState::Recovering))
        .all(|v| self_state(v) == Some(MemberState::Offline));
    if recovering_count == 1 && others_offline {
        return DiagnoseType::BootstrapBackoff;
    }

    // 1. ShardHasNoGroup: every reachable, valid-key member reports no
    // group and OFFLINE, and at least one such member exists.
    let valid_reachable_views: Vec<_> = ok_views
        .iter()
        .filter(|v| v.self_key.is_valid() && snapshot.ping_ok.get(&v.reporter_alias).copied().unwrap_or(false))
        .collect();
    if !valid_reachable_views.is_empty()
        && valid_reachable_views
            .iter()
            .all(|v| v.has_no_group() && self_state(v) == Some(MemberState::Offline))
    {
        return DiagnoseType::ShardHasNoGroup;
    }

    // 2. ShardHasInactiveGroup: a group name exists somewhere, but no
    // member at all is confirmed ONLINE by any reporter (the whole group
    // is inactive, as opposed to UnreachablePrimary/InsufficientGroupSize
    // below, where secondaries are confirmed ONLINE and only the primary
    // or a subset of members is missing).
    let any_group_name = ok_views.iter().any(|v| !v.has_no_group());
    let any_member_online = ok_views
        .iter()
        .any(|v| v.members.iter().any(|m| m.state == MemberState::Online));
    if any_group_name && !any_member_online {
        return DiagnoseType::ShardHasInactiveGroup;
    }

    // 4. ShardNetworkPartition: quorum of tablets unreachable via
    // `TMClient.Ping` (tablet-process liveness, distinct from the MySQL
    // reachability `Agent.Ping` already folded into `ShardHasNoGroup`/
    // `ShardHasInactiveGroup` above). Checked after those two: a cold shard
    // with only a minority of tablets ever registered (and the rest still
    // empty-keyed) is a no-group shard to refuse bootstrap on, not a
    // partition, matching `original_source`'s "raise error if all nodes
    // failed" rather than a mere-quorum rule (see DESIGN.md).
    let tablet_reachable = snapshot.tablet_reachable_count();
    let total = snapshot.total_count().max(1);
    let ping_quorum = total / 2 + 1;
    if tablet_reachable < ping_quorum {
        return DiagnoseType::ShardNetworkPartition;
    }

    // 5. BackoffError: the primary is UNREACHABLE in its own view but
    // ONLINE in peers' views, or reporters disagree on primary identity.
    if is_backoff_error(&ok_views) {
        return DiagnoseType::BackoffError;
    }

    let topo_master = snapshot
        .tablets
        .values()
        .find(|t| t.tablet_type == TabletType::Master);
    let group_primary = unique_primary(&group);

    // 7. WrongPrimaryTablet.
    match (&topo_master, &group_primary) {
        (None, Some(_)) => return DiagnoseType::WrongPrimaryTablet,
        (Some(master), Some(primary)) if &master.instance_key() != primary => {
            return DiagnoseType::WrongPrimaryTablet;
        }
        _ => {}
    }

    // 8. UnreachablePrimary: topology MASTER fails `TMClient.Ping` but some
    // other member is ONLINE and the group is otherwise healthy.
    if let Some(master) = &topo_master {
        let master_alias = &master.alias;
        let master_reachable = snapshot.tablet_ping_ok.get(master_alias).copied().unwrap_or(false);
        let other_online = ok_views.iter().any(|v| {
            v.members
                .iter()
                .any(|m| m.key != master.instance_key() && m.state == MemberState::Online)
        });
        if !master_reachable && other_online {
            return DiagnoseType::UnreachablePrimary;
        }
    }

    // 10. UnconnectedReplica: a REPLICA tablet whose MySQL is OFFLINE/ERROR
    // while the group is otherwise healthy. Checked ahead of
    // InsufficientGroupSize: when a specific tracked REPLICA tablet
    // explains the membership gap, the narrower single-node rejoin is
    // preferred over the generic whole-group rejoin.
    let has_unconnected_replica = snapshot.tablets.values().any(|t| {
        t.tablet_type == TabletType::Replica
            && matches!(
                snapshot.views.get(&t.alias),
                Some(Ok(v)) if matches!(self_state(v), Some(MemberState::Offline) | Some(MemberState::Error))
            )
    });
    if has_unconnected_replica {
        return DiagnoseType::UnconnectedReplica;
    }

    // 9. InsufficientGroupSize.
    if group.active_members.len() < policy.group_size && group.has_quorum_active {
        return DiagnoseType::InsufficientGroupSize;
    }

    // 11. ReadOnlyShard: topology MASTER set, group primary matches, but
    // read_only is true.
    if let (Some(master), Some(primary)) = (&topo_master, &group_primary) {
        if &master.instance_key() == primary {
            if let Some(Ok(view)) = snapshot.views.get(&master.alias) {
                if view.read_only {
                    return DiagnoseType::ReadOnlyShard;
                }
            }
        }
    }

    DiagnoseType::Healthy
}

fn self_state(view: &crate::core::controller::types::GroupView) -> Option<MemberState> {
    view.members
        .iter()
        .find(|m| m.key == view.self_key)
        .map(|m| m.state)
}

/// The unique `InstanceKey` every group-member view agrees holds `PRIMARY`,
/// or `None` if there is no agreement.
fn unique_primary(group: &SQLGroup) -> Option<InstanceKey> {
    if group.primaries.len() == 1 {
        group.primaries.iter().next().cloned()
    } else {
        None
    }
}

fn is_backoff_error(views: &[crate::core::controller::types::GroupView]) -> bool {
    let primary_key = match views
        .iter()
        .flat_map(|v| v.members.iter())
        .find(|m| m.role == MemberRole::Primary)
        .map(|m| m.key.clone())
    {
        Some(k) => k,
        None => return false,
    };

    let primary_self_unreachable = views.iter().any(|v| {
        v.self_key == primary_key
            && v.members
                .iter()
                .any(|m| m.key == primary_key && m.state == MemberState::Unreachable)
    });
    let peers_say_online = views.iter().any(|v| {
        v.self_key != primary_key
            && v.members
                .iter()
                .any(|m| m.key == primary_key && m.state == MemberState::Online)
    });
    if primary_self_unreachable && peers_say_online {
        return true;
    }

    // Reporters disagree on who holds PRIMARY.
    let distinct_primaries: std::collections::HashSet<&InstanceKey> = views
        .iter()
        .flat_map(|v| v.members.iter())
        .filter(|m| m.role == MemberRole::Primary)
        .map(|m| &m.key)
        .collect();
    distinct_primaries.len() > 1
}
