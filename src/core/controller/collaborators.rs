// src/core/controller/collaborators.rs

//! The external collaborators the controller depends on: one MySQL agent per
//! instance, a tablet-manager RPC client, and the topology store.
//!
//! These are trait objects so tests can substitute in-memory fakes; the
//! concrete wire protocol each implementation speaks is outside this crate.

use crate::core::VtgrError;
use crate::core::controller::gtid::GtidSet;
use crate::core::controller::types::{GroupView, InstanceKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The topology-persisted role of a tablet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TabletType {
    Master,
    Replica,
    Rdonly,
}

impl fmt::Display for TabletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TabletType::Master => "MASTER",
            TabletType::Replica => "REPLICA",
            TabletType::Rdonly => "RDONLY",
        };
        write!(f, "{s}")
    }
}

/// One tablet's record as persisted in the topology store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabletRecord {
    pub alias: String,
    pub hostname: String,
    pub mysql_port: u16,
    pub tablet_type: TabletType,
    pub keyspace: String,
    pub shard: String,
    pub master_term_start_time: Option<DateTime<Utc>>,
}

impl TabletRecord {
    pub fn instance_key(&self) -> InstanceKey {
        InstanceKey::new(self.hostname.clone(), self.mysql_port)
    }
}

/// Per-instance primitives the controller calls against one mysqld.
///
/// All `*_locked` operations are expected to be serialised per-instance by
/// the implementation itself; the controller additionally holds the shard
/// lock so that no two operations overlap on the same shard.
#[async_trait]
pub trait Agent: Send + Sync {
    /// One gossip snapshot of the group as seen from `key`. Errors if `key`
    /// is invalid or the instance cannot be reached.
    async fn fetch_group_view(&self, alias: &str, key: &InstanceKey) -> Result<GroupView, VtgrError>;

    /// The durable applier GTID position of `key`.
    async fn fetch_applier_gtid_set(&self, key: &InstanceKey) -> Result<GtidSet, VtgrError>;

    /// Starts a new single-member group on `key`. Precondition: the caller
    /// has verified `key` is uniquely GTID-maximal and the shard has no
    /// active group.
    async fn bootstrap_group_locked(&self, key: &InstanceKey) -> Result<(), VtgrError>;

    /// Removes `key` from its current group, leaving it `OFFLINE`.
    async fn stop_group_locked(&self, key: &InstanceKey) -> Result<(), VtgrError>;

    /// Adds `key` to the group currently hosted by `seed_key`.
    async fn join_group_locked(&self, key: &InstanceKey, seed_key: &InstanceKey) -> Result<(), VtgrError>;

    /// Causes the group to elect `key` as primary without interrupting it.
    async fn failover(&self, key: &InstanceKey) -> Result<(), VtgrError>;

    /// Sets `super_read_only` on `key`.
    async fn set_super_read_only(&self, key: &InstanceKey, read_only: bool) -> Result<(), VtgrError>;

    /// Liveness probe of the MySQL instance itself.
    async fn ping(&self, key: &InstanceKey) -> Result<(), VtgrError>;
}

/// RPCs issued to one tablet process, distinct from the MySQL instance it
/// fronts.
#[async_trait]
pub trait TmClient: Send + Sync {
    /// Liveness probe of the tablet process.
    async fn ping(&self, tablet: &TabletRecord) -> Result<(), VtgrError>;

    /// Mutates the topology-persisted tablet type.
    async fn change_type(&self, tablet: &TabletRecord, new_type: TabletType) -> Result<(), VtgrError>;
}

/// A held distributed shard lock, released on drop.
#[async_trait]
pub trait ShardUnlocker: Send + Sync {
    async fn unlock(self: Box<Self>);
}

/// The topology store: persisted shard/tablet records.
#[async_trait]
pub trait TopoServer: Send + Sync {
    /// All tablet records currently registered for `(keyspace, shard)`.
    async fn get_tablets_by_shard(
        &self,
        keyspace: &str,
        shard: &str,
    ) -> Result<Vec<TabletRecord>, VtgrError>;

    /// Acquires the shard-level distributed lock, held across diagnose and
    /// repair of a single tick.
    async fn lock_shard(
        &self,
        keyspace: &str,
        shard: &str,
    ) -> Result<Box<dyn ShardUnlocker>, VtgrError>;

    /// Enumerates all `(keyspace, shard)` pairs currently registered, used
    /// by the fleet supervisor to discover shards to watch. Polled on
    /// `shard_discovery_interval` rather than watched live.
    async fn get_srv_keyspace_names(&self) -> Result<Vec<(String, String)>, VtgrError>;
}
