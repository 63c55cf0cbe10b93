// tests/property/repair_test.rs

//! Property-based test for repair idempotency: re-running the same repair
//! action against the same snapshot must never fail differently the second
//! time around (every action is safe to retry within a tick, see
//! `SPEC_FULL.md` §7).

use crate::mock::MockAgent;
use proptest::prelude::*;
use std::sync::Arc;
use vtgr::core::controller::config::GroupPolicy;
use vtgr::core::controller::diagnose::DiagnoseType;
use vtgr::core::controller::gtid::GtidSet;
use vtgr::core::controller::repair::repair;
use vtgr::core::controller::snapshot::ShardSnapshot;
use vtgr::core::controller::{
    Agent, GroupView, InstanceKey, MemberRole, MemberState, MemberView, TabletRecord, TabletType,
    TmClient,
};

#[derive(Clone, Default)]
struct NoopTmClient;

#[async_trait::async_trait]
impl TmClient for NoopTmClient {
    async fn ping(&self, _tablet: &TabletRecord) -> Result<(), vtgr::core::VtgrError> {
        Ok(())
    }
    async fn change_type(
        &self,
        _tablet: &TabletRecord,
        _new_type: TabletType,
    ) -> Result<(), vtgr::core::VtgrError> {
        Ok(())
    }
}

fn policy() -> GroupPolicy {
    GroupPolicy {
        group_size: 1,
        min_num_replica: 0,
        backoff_error_wait: std::time::Duration::from_secs(5),
        bootstrap_wait: std::time::Duration::from_millis(1),
        anti_thrash_threshold: 3,
        anti_thrash_max_backoff: std::time::Duration::from_secs(60),
    }
}

fn read_only_shard_snapshot() -> ShardSnapshot {
    let t_master = TabletRecord {
        alias: "master".to_string(),
        hostname: "h1".to_string(),
        mysql_port: 3306,
        tablet_type: TabletType::Master,
        keyspace: "ks".to_string(),
        shard: "0".to_string(),
        master_term_start_time: None,
    };
    let key = t_master.instance_key();
    let members = vec![MemberView {
        key: key.clone(),
        state: MemberState::Online,
        role: MemberRole::Primary,
    }];
    let view = GroupView {
        reporter_alias: "master".to_string(),
        group_name: Some("g1".to_string()),
        self_key: key.clone(),
        read_only: true,
        members,
    };
    let mut tablets = std::collections::HashMap::new();
    tablets.insert("master".to_string(), t_master);
    let mut views = std::collections::HashMap::new();
    views.insert("master".to_string(), Ok(view));
    let mut gtid = std::collections::HashMap::new();
    gtid.insert("master".to_string(), Ok(GtidSet::parse("sid:1-5").unwrap()));
    let mut ping_ok = std::collections::HashMap::new();
    ping_ok.insert("master".to_string(), true);
    let mut tablet_ping_ok = std::collections::HashMap::new();
    tablet_ping_ok.insert("master".to_string(), true);
    ShardSnapshot {
        tablets,
        views,
        gtid,
        ping_ok,
        tablet_ping_ok,
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 20,
        ..ProptestConfig::default()
    })]

    #[test]
    fn clear_read_only_is_idempotent(repeat_count in 1usize..5) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let agent = MockAgent::default();
            let key = InstanceKey::new("h1", 3306);
            agent.set_reachable(key.clone(), true);
            agent.set_gtid(key.clone(), GtidSet::parse("sid:1-5").unwrap());

            let snapshot = read_only_shard_snapshot();
            let policy = policy();
            let agent_dyn: Arc<dyn Agent> = Arc::new(agent.clone());
            let tm_client: Arc<dyn TmClient> = Arc::new(NoopTmClient);

            for _ in 0..repeat_count {
                let outcome = repair(
                    &DiagnoseType::ReadOnlyShard,
                    &snapshot,
                    &policy,
                    &agent_dyn,
                    &tm_client,
                )
                .await;
                prop_assert!(outcome.is_ok());
            }

            prop_assert_eq!(agent.inner.lock().read_only_calls.len(), repeat_count);
            prop_assert!(agent.inner.lock().read_only_calls.iter().all(|(_, ro)| !ro));
            Ok(())
        })?;
    }
}
