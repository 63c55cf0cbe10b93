// src/core/errors.rs

//! Defines the primary error type for the controller.

use thiserror::Error;

/// The error taxonomy from the controller's diagnose/repair loop.
///
/// Transient errors are retried within a tick; semantic refusals and
/// invariant violations are surfaced to the caller and never retried until
/// the next tick (see `SPEC_FULL.md` §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VtgrError {
    /// An RPC timed out or the peer was momentarily unreachable. Retried a
    /// small bounded number of times within a tick before the member is
    /// treated as unreachable for that tick.
    #[error("transient error: {0}")]
    Transient(String),

    /// `key` was the sentinel `(hostname: "", port: 0)` value.
    #[error("invalid instance key")]
    InvalidInstanceKey,

    /// Bootstrap was attempted with fewer than two reachable instances.
    #[error("unsafe to bootstrap group")]
    UnsafeBootstrap,

    /// The GTID arbiter found two or more incomparable maximal candidates.
    #[error("found more than one failover candidates by GTID set")]
    AmbiguousCandidates,

    /// Two or more reporters disagree on the group's name.
    #[error("group has split brain")]
    SplitBrain,

    /// A tablet failed to respond to `Ping`.
    #[error("{0} is unreachable")]
    Unreachable(String),

    /// Fewer than quorum tablets are reachable via `Ping`.
    #[error("shard network partition detected")]
    NetworkPartition,

    /// A post-repair invariant check failed (e.g. new primary still
    /// read-only). Triggers a single reconciliation retry before entering
    /// anti-thrash backoff.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The topology store was unreachable for longer than the tablet
    /// refresh interval.
    #[error("fatal: {0}")]
    Fatal(String),

    /// Propagated from an `Agent` RPC.
    #[error("agent error: {0}")]
    Agent(String),

    /// Propagated from a `TmClient` RPC.
    #[error("tablet manager error: {0}")]
    Tmc(String),

    /// Propagated from a `TopoServer` call.
    #[error("topology error: {0}")]
    Topo(String),

    /// A GTID set string could not be parsed.
    #[error("invalid GTID set: {0}")]
    InvalidGtidSet(String),
}

impl VtgrError {
    /// Semantic-refusal errors are never retried; they wait for the next
    /// tick's re-diagnosis instead.
    pub fn is_semantic_refusal(&self) -> bool {
        matches!(
            self,
            VtgrError::UnsafeBootstrap
                | VtgrError::AmbiguousCandidates
                | VtgrError::SplitBrain
                | VtgrError::Unreachable(_)
                | VtgrError::NetworkPartition
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, VtgrError::Transient(_))
    }
}
