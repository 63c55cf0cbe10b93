// src/core/controller/group.rs

//! Aggregates the `GroupView`s collected from every member of one shard into
//! a single picture of the group: its effective name, active members, and
//! whether it has split.

use crate::core::controller::types::{GroupView, InstanceKey, MemberRole};
use std::collections::HashSet;

/// The aggregated view of a shard's MySQL group over all `GroupView`s
/// gathered in one tick.
#[derive(Debug, Clone)]
pub struct SQLGroup {
    /// The unique non-empty group name, if all reporters agree.
    pub resolved_group_name: Option<String>,
    /// True when two or more reporters disagree on a non-empty group name.
    pub split_brain: bool,
    /// Members reported `ONLINE` by at least one reporter that itself has a
    /// `PRIMARY` in its own view.
    pub active_members: HashSet<InstanceKey>,
    /// `floor(group_size / 2) + 1`.
    pub quorum_size: usize,
    pub has_quorum_active: bool,
    /// Every `InstanceKey` any reporter currently believes holds `PRIMARY`.
    pub primaries: HashSet<InstanceKey>,
}

impl SQLGroup {
    /// Builds the aggregate from every successfully-fetched `GroupView` this
    /// tick. Views that failed to fetch are simply absent from `views`; the
    /// diagnose engine reasons about missing members separately via
    /// `ShardSnapshot::ping_ok`.
    pub fn aggregate(views: &[GroupView], group_size: usize) -> Self {
        let quorum_size = group_size / 2 + 1;

        let mut distinct_names: HashSet<&str> = HashSet::new();
        for v in views {
            if let Some(name) = v.group_name.as_deref() {
                if !name.is_empty() {
                    distinct_names.insert(name);
                }
            }
        }
        let split_brain = distinct_names.len() > 1;
        let resolved_group_name = if distinct_names.len() == 1 {
            distinct_names.iter().next().map(|s| s.to_string())
        } else {
            None
        };

        // Reporters that themselves see a PRIMARY in their own view are
        // trusted to report on ONLINE membership; a reporter with no
        // primary in view (e.g. a lone OFFLINE node) contributes nothing.
        let reporters_with_primary: HashSet<&InstanceKey> = views
            .iter()
            .filter(|v| v.self_role() == MemberRole::Primary || v.members.iter().any(|m| m.role == MemberRole::Primary))
            .map(|v| &v.self_key)
            .collect();

        let mut active_members = HashSet::new();
        let mut primaries = HashSet::new();
        for v in views {
            if !reporters_with_primary.contains(&v.self_key) {
                continue;
            }
            for m in &v.members {
                if m.state.is_active() {
                    active_members.insert(m.key.clone());
                }
                if m.role == MemberRole::Primary {
                    primaries.insert(m.key.clone());
                }
            }
        }

        let has_quorum_active = active_members.len() >= quorum_size;

        Self {
            resolved_group_name,
            split_brain,
            active_members,
            quorum_size,
            has_quorum_active,
            primaries,
        }
    }
}
