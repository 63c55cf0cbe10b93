// src/core/controller/gtid.rs

//! A MySQL GTID set and the failover-candidate arbiter built on top of it.
//!
//! A GTID set is a map from source UUID to a list of disjoint, merged,
//! inclusive transaction-number intervals, e.g. `uuid:1-5:8` parses to
//! `{uuid: [(1,5), (8,8)]}`. Comparing two sets by pure subset inclusion is
//! enough to answer "did A apply everything B applied", which is all the
//! repair engine needs to pick a failover candidate.

use crate::core::VtgrError;
use crate::core::controller::types::InstanceKey;
use std::collections::HashMap;

/// The outcome of comparing two GTID sets for applied-transaction coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GtidOrdering {
    /// `self` is a strict subset of `other`.
    Less,
    /// `self` and `other` contain exactly the same transactions.
    Equal,
    /// `self` is a strict superset of `other`.
    Greater,
    /// Neither set contains the other; their histories diverged.
    Incomparable,
}

/// A parsed MySQL GTID set: `source-uuid:interval[:interval...]` pairs
/// separated by commas, e.g. `3E11FA47-71CA-11E1-9E33-C80AA9429562:1-5:8`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GtidSet {
    intervals: HashMap<String, Vec<(u64, u64)>>,
}

impl GtidSet {
    pub fn parse(raw: &str) -> Result<Self, VtgrError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::default());
        }

        let mut intervals: HashMap<String, Vec<(u64, u64)>> = HashMap::new();
        for source_clause in raw.split(',') {
            let source_clause = source_clause.trim();
            if source_clause.is_empty() {
                continue;
            }
            let mut parts = source_clause.split(':');
            let source_id = parts
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| VtgrError::InvalidGtidSet(raw.to_string()))?
                .to_string();

            let mut ranges = Vec::new();
            for range_str in parts {
                let (lo, hi) = match range_str.split_once('-') {
                    Some((lo, hi)) => (
                        lo.parse::<u64>()
                            .map_err(|_| VtgrError::InvalidGtidSet(raw.to_string()))?,
                        hi.parse::<u64>()
                            .map_err(|_| VtgrError::InvalidGtidSet(raw.to_string()))?,
                    ),
                    None => {
                        let n = range_str
                            .parse::<u64>()
                            .map_err(|_| VtgrError::InvalidGtidSet(raw.to_string()))?;
                        (n, n)
                    }
                };
                if lo > hi {
                    return Err(VtgrError::InvalidGtidSet(raw.to_string()));
                }
                ranges.push((lo, hi));
            }
            if ranges.is_empty() {
                return Err(VtgrError::InvalidGtidSet(raw.to_string()));
            }
            intervals
                .entry(source_id)
                .or_default()
                .extend(ranges);
        }

        for ranges in intervals.values_mut() {
            merge_intervals(ranges);
        }

        Ok(Self { intervals })
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.values().all(|r| r.is_empty())
    }

    /// Whether every transaction in `other` is also present in `self`.
    pub fn contains_all(&self, other: &GtidSet) -> bool {
        other.intervals.iter().all(|(source, other_ranges)| {
            match self.intervals.get(source) {
                Some(self_ranges) => other_ranges
                    .iter()
                    .all(|&r| range_contained(self_ranges, r)),
                None => other_ranges.is_empty(),
            }
        })
    }

    /// Compares `self` against `other` by applied-transaction coverage.
    pub fn compare(&self, other: &GtidSet) -> GtidOrdering {
        let self_covers_other = self.contains_all(other);
        let other_covers_self = other.contains_all(self);
        match (self_covers_other, other_covers_self) {
            (true, true) => GtidOrdering::Equal,
            (true, false) => GtidOrdering::Greater,
            (false, true) => GtidOrdering::Less,
            (false, false) => GtidOrdering::Incomparable,
        }
    }
}

fn merge_intervals(ranges: &mut Vec<(u64, u64)>) {
    ranges.sort_unstable();
    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(ranges.len());
    for &(lo, hi) in ranges.iter() {
        if let Some(last) = merged.last_mut() {
            if lo <= last.1.saturating_add(1) {
                last.1 = last.1.max(hi);
                continue;
            }
        }
        merged.push((lo, hi));
    }
    *ranges = merged;
}

fn range_contained(ranges: &[(u64, u64)], (lo, hi): (u64, u64)) -> bool {
    ranges.iter().any(|&(rlo, rhi)| rlo <= lo && hi <= rhi)
}

/// Selects the unique failover candidate among `candidates` by GTID
/// coverage: the candidate whose applied set is a superset of every other
/// reachable candidate's.
///
/// Returns `VtgrError::AmbiguousCandidates` when the maximal candidate is not
/// unique, whether because two or more diverged (incomparable) or because
/// two or more are genuinely GTID-equal — invariant 6 requires a *unique*
/// maximal node, so a tie is refused rather than broken arbitrarily.
/// Returns `VtgrError::UnsafeBootstrap` when `candidates` is empty.
pub fn select_best_candidate(
    candidates: &[(InstanceKey, GtidSet)],
) -> Result<InstanceKey, VtgrError> {
    if candidates.is_empty() {
        return Err(VtgrError::UnsafeBootstrap);
    }
    if candidates.len() == 1 {
        return Ok(candidates[0].0.clone());
    }

    let mut maximal: Vec<&(InstanceKey, GtidSet)> = Vec::new();
    for candidate in candidates {
        let mut is_maximal = true;
        for other in candidates {
            if candidate.0 == other.0 {
                continue;
            }
            if matches!(
                candidate.1.compare(&other.1),
                GtidOrdering::Less
            ) {
                is_maximal = false;
                break;
            }
        }
        if is_maximal {
            maximal.push(candidate);
        }
    }

    match maximal.len() {
        0 => Err(VtgrError::AmbiguousCandidates),
        1 => Ok(maximal[0].0.clone()),
        // Two or more maximal candidates: not unique, whether they're
        // pairwise Equal or genuinely diverged. Refuse either way.
        _ => Err(VtgrError::AmbiguousCandidates),
    }
}
