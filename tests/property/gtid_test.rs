// tests/property/gtid_test.rs

//! Property-based tests for the GTID arbiter: `compare` must be a partial
//! order consistent with `contains_all`, and `select_best_candidate` must
//! never crash and must only ever name a candidate that was actually passed
//! in.

use proptest::prelude::*;
use vtgr::core::controller::gtid::{GtidOrdering, GtidSet};
use vtgr::core::controller::types::InstanceKey;

fn arb_gtid_set() -> impl Strategy<Value = GtidSet> {
    prop::collection::vec(
        ("[a-c]", prop::collection::vec(1u64..20, 0..4)),
        0..3,
    )
    .prop_map(|sources| {
        let raw = sources
            .into_iter()
            .filter(|(_, points)| !points.is_empty())
            .map(|(source, mut points)| {
                points.sort_unstable();
                points.dedup();
                let ranges: Vec<String> = points.iter().map(|p| p.to_string()).collect();
                format!("{source}:{}", ranges.join(":"))
            })
            .collect::<Vec<_>>()
            .join(",");
        GtidSet::parse(&raw).unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn compare_is_reflexive(set in arb_gtid_set()) {
        prop_assert_eq!(set.compare(&set), GtidOrdering::Equal);
    }

    #[test]
    fn compare_is_antisymmetric(a in arb_gtid_set(), b in arb_gtid_set()) {
        let ordering = a.compare(&b);
        let reverse = b.compare(&a);
        let expected_reverse = match ordering {
            GtidOrdering::Less => GtidOrdering::Greater,
            GtidOrdering::Greater => GtidOrdering::Less,
            GtidOrdering::Equal => GtidOrdering::Equal,
            GtidOrdering::Incomparable => GtidOrdering::Incomparable,
        };
        prop_assert_eq!(reverse, expected_reverse);
    }

    #[test]
    fn equal_implies_mutual_containment(a in arb_gtid_set(), b in arb_gtid_set()) {
        if a.compare(&b) == GtidOrdering::Equal {
            prop_assert!(a.contains_all(&b));
            prop_assert!(b.contains_all(&a));
        }
    }

    #[test]
    fn select_best_candidate_always_names_an_input(
        sets in prop::collection::vec(arb_gtid_set(), 1..5)
    ) {
        let candidates: Vec<(InstanceKey, GtidSet)> = sets
            .into_iter()
            .enumerate()
            .map(|(i, set)| (InstanceKey::new(format!("h{i}"), 3306), set))
            .collect();
        if let Ok(winner) = vtgr::core::controller::gtid::select_best_candidate(&candidates) {
            prop_assert!(candidates.iter().any(|(k, _)| k == &winner));
        }
    }
}
