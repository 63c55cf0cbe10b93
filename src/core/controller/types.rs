// src/core/controller/types.rs

//! Value types shared across the diagnose/repair pipeline: instance
//! addressing and the per-instance group-replication view.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The network address of a mysqld instance participating in group
/// replication.
///
/// `InstanceKey::EMPTY` is the sentinel value returned by collaborators when
/// an instance's address could not be resolved; callers must check
/// `is_valid()` before using a key to index a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    pub hostname: String,
    pub port: u16,
}

impl InstanceKey {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }

    /// The sentinel empty key, used when an instance's address is unknown.
    pub fn empty() -> Self {
        Self {
            hostname: String::new(),
            port: 0,
        }
    }

    /// A key is valid when it has a non-empty hostname and non-zero port.
    pub fn is_valid(&self) -> bool {
        !self.hostname.is_empty() && self.port != 0
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}

/// The group-replication membership state of an instance, as reported by its
/// own `performance_schema.replication_group_members` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberState {
    Online,
    Recovering,
    Offline,
    Error,
    Unreachable,
}

impl MemberState {
    /// Online and Recovering members count toward the shard's active-member
    /// set; Offline, Error, and Unreachable do not.
    pub fn is_active(&self) -> bool {
        matches!(self, MemberState::Online | MemberState::Recovering)
    }
}

/// The replication role an instance believes it holds within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberRole {
    Primary,
    Secondary,
    /// The instance could not determine a role, e.g. it has no group.
    None,
}

/// A single member row as reported inside a `GroupView`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberView {
    pub key: InstanceKey,
    pub state: MemberState,
    pub role: MemberRole,
}

/// One instance's perspective on its group-replication group, as returned by
/// `Agent::FetchGroupView`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupView {
    /// The alias of the tablet that reported this view.
    pub reporter_alias: String,
    /// The group UUID this instance believes it belongs to, or `None` if it
    /// has no active group.
    pub group_name: Option<String>,
    /// The address of the reporting instance itself.
    pub self_key: InstanceKey,
    /// Whether the reporting instance's `super_read_only` is set.
    pub read_only: bool,
    /// Every member this instance's group considers to be a participant,
    /// including the reporter itself.
    pub members: Vec<MemberView>,
}

impl GroupView {
    /// The role the reporter believes it holds, looked up from its own entry
    /// in `members`.
    pub fn self_role(&self) -> MemberRole {
        self.members
            .iter()
            .find(|m| m.key == self.self_key)
            .map(|m| m.role)
            .unwrap_or(MemberRole::None)
    }

    /// Whether the reporter has no group at all.
    pub fn has_no_group(&self) -> bool {
        self.group_name.is_none() || self.members.is_empty()
    }
}
