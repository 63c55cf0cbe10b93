// tests/property/diagnose_test.rs

//! Property-based tests for the diagnose engine: for any snapshot, `diagnose`
//! must be deterministic (a pure function of its inputs, never dependent on
//! `HashMap` iteration order) and must never panic.

use proptest::prelude::*;
use std::collections::HashMap;
use vtgr::core::VtgrError;
use vtgr::core::controller::config::GroupPolicy;
use vtgr::core::controller::diagnose::diagnose;
use vtgr::core::controller::gtid::GtidSet;
use vtgr::core::controller::snapshot::ShardSnapshot;
use vtgr::core::controller::{
    GroupView, InstanceKey, MemberRole, MemberState, MemberView, TabletRecord, TabletType,
};

fn arb_member_state() -> impl Strategy<Value = MemberState> {
    prop_oneof![
        Just(MemberState::Online),
        Just(MemberState::Recovering),
        Just(MemberState::Offline),
        Just(MemberState::Error),
        Just(MemberState::Unreachable),
    ]
}

fn arb_member_role() -> impl Strategy<Value = MemberRole> {
    prop_oneof![
        Just(MemberRole::Primary),
        Just(MemberRole::Secondary),
        Just(MemberRole::None),
    ]
}

fn arb_tablet_type() -> impl Strategy<Value = TabletType> {
    prop_oneof![
        Just(TabletType::Master),
        Just(TabletType::Replica),
        Just(TabletType::Rdonly),
    ]
}

/// A snapshot over a fixed 3-tablet shard with randomized per-tablet state.
/// Small and fixed-shape so the strategy stays fast while still exercising
/// every branch `diagnose` can take.
fn arb_snapshot() -> impl Strategy<Value = (ShardSnapshot, GroupPolicy)> {
    let aliases = ["t0", "t1", "t2"];
    (
        prop::collection::vec(arb_tablet_type(), 3),
        prop::collection::vec(arb_member_state(), 3),
        prop::collection::vec(arb_member_role(), 3),
        prop::collection::vec(any::<bool>(), 3),
        prop::collection::vec(1u64..20, 3),
        any::<bool>(),
    )
        .prop_map(
            move |(types, states, roles, reachable, gtid_hi, has_group)| {
                let mut tablets = HashMap::new();
                let mut views = HashMap::new();
                let mut gtid = HashMap::new();
                let mut ping_ok = HashMap::new();
                let mut tablet_ping_ok = HashMap::new();

                let keys: Vec<InstanceKey> = aliases
                    .iter()
                    .enumerate()
                    .map(|(i, a)| InstanceKey::new(format!("h{a}"), 3306 + i as u16))
                    .collect();

                let members: Vec<MemberView> = keys
                    .iter()
                    .zip(states.iter())
                    .zip(roles.iter())
                    .map(|((key, &state), &role)| MemberView {
                        key: key.clone(),
                        state,
                        role,
                    })
                    .collect();

                for (i, alias) in aliases.iter().enumerate() {
                    tablets.insert(
                        alias.to_string(),
                        TabletRecord {
                            alias: alias.to_string(),
                            hostname: keys[i].hostname.clone(),
                            mysql_port: keys[i].port,
                            tablet_type: types[i],
                            keyspace: "ks".to_string(),
                            shard: "0".to_string(),
                            master_term_start_time: None,
                        },
                    );
                    views.insert(
                        alias.to_string(),
                        Ok(GroupView {
                            reporter_alias: alias.to_string(),
                            group_name: if has_group { Some("g1".to_string()) } else { None },
                            self_key: keys[i].clone(),
                            read_only: false,
                            members: members.clone(),
                        }),
                    );
                    gtid.insert(
                        alias.to_string(),
                        Ok(GtidSet::parse(&format!("sid:1-{}", gtid_hi[i])).unwrap()),
                    );
                    ping_ok.insert(alias.to_string(), reachable[i]);
                    tablet_ping_ok.insert(alias.to_string(), reachable[i]);
                }

                let snapshot = ShardSnapshot {
                    tablets,
                    views,
                    gtid,
                    ping_ok,
                    tablet_ping_ok,
                };
                let policy = GroupPolicy {
                    group_size: 3,
                    min_num_replica: 2,
                    backoff_error_wait: std::time::Duration::from_secs(5),
                    bootstrap_wait: std::time::Duration::from_millis(1),
                    anti_thrash_threshold: 3,
                    anti_thrash_max_backoff: std::time::Duration::from_secs(60),
                };
                (snapshot, policy)
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn diagnose_is_deterministic((snapshot, policy) in arb_snapshot()) {
        let first = diagnose(&snapshot, &policy);
        let second = diagnose(&snapshot, &policy);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn diagnose_never_panics_on_all_errored_views(
        types in prop::collection::vec(arb_tablet_type(), 3),
        reachable in prop::collection::vec(any::<bool>(), 3),
    ) {
        let aliases = ["t0", "t1", "t2"];
        let mut tablets = HashMap::new();
        let mut views = HashMap::new();
        let mut gtid = HashMap::new();
        let mut ping_ok = HashMap::new();
        let mut tablet_ping_ok = HashMap::new();
        for (i, alias) in aliases.iter().enumerate() {
            tablets.insert(
                alias.to_string(),
                TabletRecord {
                    alias: alias.to_string(),
                    hostname: format!("h{i}"),
                    mysql_port: 3306,
                    tablet_type: types[i],
                    keyspace: "ks".to_string(),
                    shard: "0".to_string(),
                    master_term_start_time: None,
                },
            );
            views.insert(alias.to_string(), Err(VtgrError::Unreachable(alias.to_string())));
            gtid.insert(alias.to_string(), Err(VtgrError::Unreachable(alias.to_string())));
            ping_ok.insert(alias.to_string(), reachable[i]);
            tablet_ping_ok.insert(alias.to_string(), reachable[i]);
        }
        let snapshot = ShardSnapshot { tablets, views, gtid, ping_ok, tablet_ping_ok };
        let policy = GroupPolicy {
            group_size: 3,
            min_num_replica: 2,
            backoff_error_wait: std::time::Duration::from_secs(5),
            bootstrap_wait: std::time::Duration::from_millis(1),
            anti_thrash_threshold: 3,
            anti_thrash_max_backoff: std::time::Duration::from_secs(60),
        };
        let _ = diagnose(&snapshot, &policy);
    }
}
