//! # Superstep Driver
//!
//! Runs the whole computation as a fixed sequence of phases:
//!
//! ```text
//! BUILD_ADJACENCY → ROUND(0) → ROUND(1) → … → ROUND(N) → FINALIZE
//! ```
//!
//! Each round reads `round_r`, shuffles it into per-node inboxes, runs the
//! propagator for every node (partitions in parallel), waits for every
//! partition, and only then writes `round_{r+1}`. Nothing survives a failed
//! round: the error is returned and no later phase starts.
//!
//! The number of rounds depends only on N, never on the graph.

pub mod stats;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{HopConfig, RoundContext};
use crate::materialize::{group_into_sets, materialize};
use crate::model::*;
use crate::propagate::{self, Transition};
use crate::substrate::{Partition, Substrate};
use crate::{Error, Result};

pub use stats::{RoundStats, RunStats};

// ============================================================================
// Phases and cancellation
// ============================================================================

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    BuildAdjacency,
    Round(u32),
    Finalize,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::BuildAdjacency => f.write_str("BUILD_ADJACENCY"),
            Phase::Round(r) => write!(f, "ROUND({r})"),
            Phase::Finalize => f.write_str("FINALIZE"),
        }
    }
}

/// Cooperative cancellation shared between a caller and a running driver.
///
/// Checked before every round and between node transitions; an aborted
/// run stops with `Error::Aborted` and starts no further round.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Result
// ============================================================================

/// Final answer: for each origin, the nodes it reaches in exactly N hops.
///
/// Origins with nothing reachable are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Reachability {
    pub origins: BTreeMap<NodeId, AdjacencySet>,
    pub stats: RunStats,
}

impl Reachability {
    pub fn reachable_from(&self, origin: &str) -> Option<&AdjacencySet> {
        self.origins.get(origin)
    }

    /// True if `origin` reaches `target` in exactly N hops.
    pub fn reaches(&self, origin: &str, target: &str) -> bool {
        self.reachable_from(origin).is_some_and(|set| set.contains(target))
    }

    /// All (origin, reached) pairs in order.
    pub fn pairs(&self) -> impl Iterator<Item = (&NodeId, &NodeId)> {
        self.origins
            .iter()
            .flat_map(|(origin, set)| set.iter().map(move |reached| (origin, reached)))
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Merged output of every node transition in one round.
#[derive(Debug, Default)]
struct RoundOutput {
    outbox: Vec<Record>,
    hits: Vec<HitRecord>,
    nodes: usize,
    seeded: usize,
}

impl RoundOutput {
    fn absorb(&mut self, transition: Transition) {
        self.outbox.extend(transition.outbox);
        self.hits.extend(transition.hits);
        self.nodes += 1;
        self.seeded += usize::from(transition.seeded);
    }

    fn merge(&mut self, other: RoundOutput) {
        self.outbox.extend(other.outbox);
        self.hits.extend(other.hits);
        self.nodes += other.nodes;
        self.seeded += other.seeded;
    }
}

/// Orchestrates one run against a substrate.
pub struct Driver<'s, S: Substrate> {
    substrate: &'s S,
    config: HopConfig,
    abort: AbortHandle,
}

impl<'s, S: Substrate> Driver<'s, S> {
    pub fn new(substrate: &'s S, config: HopConfig) -> Self {
        Self { substrate, config, abort: AbortHandle::new() }
    }

    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Run every phase over the given raw edge lines.
    pub async fn run<I, L>(&self, edges: I) -> Result<Reachability>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<str>,
    {
        self.config.validate()?;
        let max_hop = self.config.max_hop;
        let mut stats = RunStats::start(max_hop);

        // BUILD_ADJACENCY
        info!(phase = %Phase::BuildAdjacency, max_hop, workers = self.config.workers, "starting");
        self.substrate.clear().await?;
        let materialized = materialize(edges);
        stats.malformed_skipped += materialized.malformed;
        self.substrate.write_round(0, materialized.records).await?;

        // ROUND(0) ..= ROUND(N)
        let mut hits: Vec<Record> = Vec::new();
        for round in 0..self.config.round_count() {
            let ctx = self.config.round(round);
            let (round_stats, malformed) = self.superstep(ctx, &mut hits).await?;
            stats.malformed_skipped += malformed;
            stats.rounds.push(round_stats);
        }

        // FINALIZE
        info!(phase = %Phase::Finalize, "grouping hits");
        let terminal_output = self
            .substrate
            .read_round(max_hop + 1)
            .await
            .map_err(|e| round_failure(max_hop, e))?;
        stats.malformed_skipped += terminal_output.malformed;
        let origins = finalize(terminal_output.records)?;

        stats.origins = origins.len();
        stats.pairs = origins.values().map(AdjacencySet::len).sum();
        stats.finish();
        info!(origins = stats.origins, pairs = stats.pairs, "reachability complete");

        Ok(Reachability { origins, stats })
    }

    /// One barrier-synchronized round. Returns its counters and the number
    /// of malformed input records skipped.
    async fn superstep(&self, ctx: RoundContext, hits: &mut Vec<Record>) -> Result<(RoundStats, usize)> {
        let round = ctx.round;
        if self.abort.is_aborted() {
            warn!(round, "abort requested, not starting round");
            return Err(Error::Aborted { round });
        }

        let input = self
            .substrate
            .read_round(round)
            .await
            .map_err(|e| round_failure(round, e))?;
        let input_records = input.records.len();
        info!(phase = %Phase::Round(round), records = input_records, terminal = ctx.is_terminal(), "superstep");

        // Zero hops: the empty walk takes every node to itself.
        if ctx.max_hop == 0 {
            hits.extend(identity_hits(&input.records));
        }

        let output = self.execute(ctx, input.records).await?;
        let round_hits = output.hits.len();
        hits.extend(output.hits.into_iter().map(Record::hit));

        let mut next = output.outbox;
        if ctx.is_terminal() {
            next.append(hits);
        }
        let output_records = next.len();
        self.substrate
            .write_round(round + 1, next)
            .await
            .map_err(|e| round_failure(round, e))?;

        let stats = RoundStats {
            round,
            input_records,
            nodes: output.nodes,
            output_records,
            hits: round_hits,
            seeded: output.seeded,
        };
        debug!(?stats, "round complete");
        Ok((stats, input.malformed))
    }

    /// Shuffle, run every partition concurrently, and wait for all of them.
    async fn execute(&self, ctx: RoundContext, records: Vec<Record>) -> Result<RoundOutput> {
        let partitions = self.substrate.group_by_key(records, self.config.workers);

        let mut tasks = JoinSet::new();
        for (index, partition) in partitions.into_iter().enumerate() {
            if partition.is_empty() {
                continue;
            }
            let abort = self.abort.clone();
            tasks.spawn_blocking(move || run_partition(ctx, index, partition, &abort));
        }

        let mut merged = RoundOutput::default();
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => Err(round_failure(ctx.round, e)),
            };
            match outcome {
                Ok(output) => merged.merge(output),
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }
        Ok(merged)
    }
}

fn run_partition(
    ctx: RoundContext,
    index: usize,
    partition: Partition,
    abort: &AbortHandle,
) -> Result<RoundOutput> {
    let mut output = RoundOutput::default();
    for (node, inbox) in partition {
        if abort.is_aborted() {
            return Err(Error::Aborted { round: ctx.round });
        }
        output.absorb(propagate::step(ctx, &node, inbox)?);
    }
    debug!(round = ctx.round, partition = index, nodes = output.nodes, "partition done");
    Ok(output)
}

fn round_failure(round: u32, cause: impl std::fmt::Display) -> Error {
    Error::RoundFailure { round, reason: cause.to_string() }
}

/// `(v, v)` for every node named in the adjacency records.
fn identity_hits(records: &[Record]) -> Vec<Record> {
    let mut nodes: BTreeSet<&NodeId> = BTreeSet::new();
    for record in records {
        nodes.insert(&record.key);
        if let Message::Adjacency(set) = &record.message {
            nodes.extend(set.iter());
        }
    }
    nodes
        .into_iter()
        .map(|node| Record::hit(HitRecord { origin: node.clone(), reached: node.clone() }))
        .collect()
}

/// Group the terminal round's hits by origin into deduplicated sets.
///
/// Accepts hits in either shape a substrate may return them: typed, or
/// read back from the wire as single-member adjacency values.
pub fn finalize(records: Vec<Record>) -> Result<BTreeMap<NodeId, AdjacencySet>> {
    let mut pairs = Vec::with_capacity(records.len());
    for Record { key, message } in records {
        match message {
            Message::Hit(reached) => pairs.push((key, AdjacencySet::from_iter([reached]))),
            Message::Adjacency(set) => pairs.push((key, set)),
            other @ Message::Hop(_) => {
                return Err(Error::ProtocolViolation(format!(
                    "{} record {other:?} addressed to {key} survived the terminal round",
                    other.kind(),
                )));
            }
        }
    }

    let mut origins = group_into_sets(pairs);
    origins.retain(|_, reached| !reached.is_empty());
    Ok(origins)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::MemorySubstrate;

    fn set(nodes: &[&str]) -> AdjacencySet {
        nodes.iter().copied().collect()
    }

    #[tokio::test]
    async fn test_writes_every_round_artifact() {
        let substrate = MemorySubstrate::new();
        let config = HopConfig::new(2).with_workers(2);
        let result = Driver::new(&substrate, config).run(["A\tB", "B\tC", "C\tA"]).await.unwrap();

        assert_eq!(result.stats.rounds_executed(), 3);
        let names = substrate.round_names().await.unwrap();
        assert_eq!(names, vec!["round_0", "round_1", "round_2", "round_3"]);
        // round_3 holds only the terminal hits
        assert_eq!(substrate.round_len(3), Some(3));
    }

    #[tokio::test]
    async fn test_abort_before_first_round() {
        let substrate = MemorySubstrate::new();
        let abort = AbortHandle::new();
        abort.abort();

        let err = Driver::new(&substrate, HopConfig::new(2))
            .with_abort(abort)
            .run(["A\tB"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Aborted { round: 0 }));
        assert_eq!(substrate.round_len(1), None);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_any_work() {
        let substrate = MemorySubstrate::new();
        let err = Driver::new(&substrate, HopConfig::new(1).with_workers(0))
            .run(["A\tB"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(substrate.round_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_hop_count_is_rejected() {
        let substrate = MemorySubstrate::new();
        let err = Driver::new(&substrate, HopConfig::new(u32::MAX))
            .run(["A\tB"])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(substrate.round_names().await.unwrap().is_empty());
    }

    #[test]
    fn test_finalize_groups_and_drops_empty() {
        let origins = finalize(vec![
            Record::hit(HitRecord { origin: "A".into(), reached: "D".into() }),
            Record::hit(HitRecord { origin: "A".into(), reached: "D".into() }),
            Record::adjacency("A".into(), set(&["E"])),
            Record::adjacency("B".into(), set(&[])),
        ])
        .unwrap();

        assert_eq!(origins.len(), 1);
        assert_eq!(origins[&NodeId::from("A")], set(&["D", "E"]));
    }

    #[test]
    fn test_finalize_rejects_surviving_hop() {
        let err = finalize(vec![Record::hop("B".into(), HopMessage::seed("A".into()))]).unwrap_err();
        assert!(matches!(&err, Error::ProtocolViolation(msg) if msg.starts_with("hop record")));
    }

    #[test]
    fn test_identity_hits_cover_sources_and_destinations() {
        let hits = identity_hits(&[Record::adjacency("A".into(), set(&["B"]))]);
        assert_eq!(hits, vec![
            Record::hit(HitRecord { origin: "A".into(), reached: "A".into() }),
            Record::hit(HitRecord { origin: "B".into(), reached: "B".into() }),
        ]);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::BuildAdjacency.to_string(), "BUILD_ADJACENCY");
        assert_eq!(Phase::Round(3).to_string(), "ROUND(3)");
        assert_eq!(Phase::Finalize.to_string(), "FINALIZE");
    }
}
