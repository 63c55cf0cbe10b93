// tests/controller/mock.rs

//! In-memory fakes for `Agent`, `TmClient`, and `TopoServer`, used by the
//! scenario tests to drive the controller without a real MySQL group or
//! topology store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use vtgr::core::VtgrError;
use vtgr::core::controller::{
    Agent, GroupView, GtidSet, InstanceKey, ShardUnlocker, TabletRecord, TabletType, TmClient,
    TopoServer,
};

#[derive(Default)]
pub struct MockAgentInner {
    pub views: HashMap<InstanceKey, GroupView>,
    pub gtids: HashMap<InstanceKey, GtidSet>,
    pub reachable: HashMap<InstanceKey, bool>,
    pub bootstrap_calls: Vec<InstanceKey>,
    pub failover_calls: Vec<InstanceKey>,
    pub stop_calls: Vec<InstanceKey>,
    pub join_calls: Vec<(InstanceKey, InstanceKey)>,
    pub read_only_calls: Vec<(InstanceKey, bool)>,
}

/// A fully in-memory `Agent` whose per-instance state is set up by the test
/// before the controller runs, and whose call log is inspected afterward.
#[derive(Clone, Default)]
pub struct MockAgent {
    pub inner: Arc<Mutex<MockAgentInner>>,
}

impl MockAgent {
    pub fn set_view(&self, key: InstanceKey, view: GroupView) {
        self.inner.lock().views.insert(key, view);
    }

    pub fn set_gtid(&self, key: InstanceKey, gtid: GtidSet) {
        self.inner.lock().gtids.insert(key, gtid);
    }

    pub fn set_reachable(&self, key: InstanceKey, reachable: bool) {
        self.inner.lock().reachable.insert(key, reachable);
    }
}

#[async_trait]
impl Agent for MockAgent {
    async fn fetch_group_view(&self, _alias: &str, key: &InstanceKey) -> Result<GroupView, VtgrError> {
        let inner = self.inner.lock();
        if !inner.reachable.get(key).copied().unwrap_or(false) {
            return Err(VtgrError::Unreachable(key.to_string()));
        }
        inner
            .views
            .get(key)
            .cloned()
            .ok_or_else(|| VtgrError::Unreachable(key.to_string()))
    }

    async fn fetch_applier_gtid_set(&self, key: &InstanceKey) -> Result<GtidSet, VtgrError> {
        let inner = self.inner.lock();
        if !inner.reachable.get(key).copied().unwrap_or(false) {
            return Err(VtgrError::Unreachable(key.to_string()));
        }
        Ok(inner.gtids.get(key).cloned().unwrap_or_default())
    }

    async fn bootstrap_group_locked(&self, key: &InstanceKey) -> Result<(), VtgrError> {
        self.inner.lock().bootstrap_calls.push(key.clone());
        Ok(())
    }

    async fn stop_group_locked(&self, key: &InstanceKey) -> Result<(), VtgrError> {
        self.inner.lock().stop_calls.push(key.clone());
        Ok(())
    }

    async fn join_group_locked(&self, key: &InstanceKey, seed_key: &InstanceKey) -> Result<(), VtgrError> {
        self.inner.lock().join_calls.push((key.clone(), seed_key.clone()));
        Ok(())
    }

    async fn failover(&self, key: &InstanceKey) -> Result<(), VtgrError> {
        self.inner.lock().failover_calls.push(key.clone());
        Ok(())
    }

    async fn set_super_read_only(&self, key: &InstanceKey, read_only: bool) -> Result<(), VtgrError> {
        self.inner.lock().read_only_calls.push((key.clone(), read_only));
        Ok(())
    }

    async fn ping(&self, key: &InstanceKey) -> Result<(), VtgrError> {
        if self.inner.lock().reachable.get(key).copied().unwrap_or(false) {
            Ok(())
        } else {
            Err(VtgrError::Unreachable(key.to_string()))
        }
    }
}

#[derive(Default)]
struct MockTmClientInner {
    pub change_type_calls: Vec<(String, TabletType)>,
    pub unreachable_aliases: HashMap<String, bool>,
}

#[derive(Clone, Default)]
pub struct MockTmClient {
    inner: Arc<Mutex<MockTmClientInner>>,
}

impl MockTmClient {
    pub fn change_type_calls(&self) -> Vec<(String, TabletType)> {
        self.inner.lock().change_type_calls.clone()
    }

    /// Makes `TmClient::ping` fail for the tablet with this alias, simulating
    /// a tablet process that is down (distinct from its MySQL reachability).
    pub fn set_tablet_unreachable(&self, alias: &str) {
        self.inner.lock().unreachable_aliases.insert(alias.to_string(), true);
    }
}

#[async_trait]
impl TmClient for MockTmClient {
    async fn ping(&self, tablet: &TabletRecord) -> Result<(), VtgrError> {
        if self
            .inner
            .lock()
            .unreachable_aliases
            .get(&tablet.alias)
            .copied()
            .unwrap_or(false)
        {
            Err(VtgrError::Unreachable(tablet.alias.clone()))
        } else {
            Ok(())
        }
    }

    async fn change_type(&self, tablet: &TabletRecord, new_type: TabletType) -> Result<(), VtgrError> {
        self.inner
            .lock()
            .change_type_calls
            .push((tablet.alias.clone(), new_type));
        Ok(())
    }
}

struct NoopUnlocker;

#[async_trait]
impl ShardUnlocker for NoopUnlocker {
    async fn unlock(self: Box<Self>) {}
}

#[derive(Clone, Default)]
pub struct MockTopoServer {
    pub tablets: Arc<Mutex<Vec<TabletRecord>>>,
    pub shards: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl TopoServer for MockTopoServer {
    async fn get_tablets_by_shard(
        &self,
        keyspace: &str,
        shard: &str,
    ) -> Result<Vec<TabletRecord>, VtgrError> {
        Ok(self
            .tablets
            .lock()
            .iter()
            .filter(|t| t.keyspace == keyspace && t.shard == shard)
            .cloned()
            .collect())
    }

    async fn lock_shard(&self, _keyspace: &str, _shard: &str) -> Result<Box<dyn ShardUnlocker>, VtgrError> {
        Ok(Box::new(NoopUnlocker))
    }

    async fn get_srv_keyspace_names(&self) -> Result<Vec<(String, String)>, VtgrError> {
        Ok(self.shards.lock().clone())
    }
}
