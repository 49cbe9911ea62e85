//! Frontier propagation: the per-node, per-round transition function.
//!
//! Given one node's inbox for one round, decide what the node persists
//! (its re-announced adjacency), what it sends (hop messages to every
//! neighbor) and which hits it records. The function is pure: its output
//! depends only on the context, the node id and the multiset of inbox
//! messages, never on their arrival order.
//!
//! ## Seeding
//!
//! A node seeds itself as an origin whenever it has nothing to forward in
//! a non-terminal round. Every node is idle at round 0, so every node
//! becomes an origin there. A node that is idle again later (no in-edges,
//! or traffic that has not reached it yet) seeds again; those later seeds
//! are still in flight at the terminal round and are dropped there, so
//! they never produce hits.

use std::collections::BTreeSet;

use smallvec::SmallVec;
use crate::config::RoundContext;
use crate::model::*;
use crate::{Error, Result};

/// Everything one node emits in one round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    /// Records for the next round: the adjacency re-announcement and hop
    /// messages addressed to neighbors.
    pub outbox: Vec<Record>,
    /// Origins that reached this node in exactly N hops, one per origin.
    pub hits: Vec<HitRecord>,
    /// True when this node broadcast a fresh self-seed this round.
    pub seeded: bool,
}

/// Run one node's transition for one round.
pub fn step<I>(ctx: RoundContext, node: &NodeId, inbox: I) -> Result<Transition>
where
    I: IntoIterator<Item = Message>,
{
    let terminal = ctx.is_terminal();

    let mut adjacency: Option<AdjacencySet> = None;
    let mut forward: SmallVec<[HopMessage; 4]> = SmallVec::new();
    let mut hit_origins: BTreeSet<NodeId> = BTreeSet::new();

    for message in inbox {
        match message {
            Message::Hop(hop) => {
                if hop.distance >= ctx.max_hop {
                    return Err(Error::ProtocolViolation(format!(
                        "node {node} received {}|{} in round {} but N is {}",
                        hop.origin, hop.distance, ctx.round, ctx.max_hop,
                    )));
                }
                let next = hop.forwarded();
                if next.distance == ctx.max_hop {
                    hit_origins.insert(next.origin);
                } else if !terminal {
                    forward.push(next);
                }
            }
            Message::Adjacency(neighbors) => {
                adjacency.get_or_insert_with(AdjacencySet::new).extend(neighbors);
            }
            other @ Message::Hit(_) => {
                return Err(Error::ProtocolViolation(format!(
                    "{} record {other:?} addressed to {node} delivered as input to round {}",
                    other.kind(),
                    ctx.round,
                )));
            }
        }
    }

    let hits = hit_origins
        .into_iter()
        .map(|origin| HitRecord { origin, reached: node.clone() })
        .collect();

    // No adjacency (sink) or drain round: in-flight traffic stops here.
    let Some(adjacency) = adjacency.filter(|_| !terminal) else {
        return Ok(Transition { outbox: Vec::new(), hits, seeded: false });
    };

    let seeded = forward.is_empty() && !adjacency.is_empty();
    if forward.is_empty() {
        forward.push(HopMessage::seed(node.clone()));
    }

    let mut outbox = Vec::with_capacity(1 + adjacency.len() * forward.len());
    for neighbor in adjacency.iter() {
        for hop in &forward {
            outbox.push(Record::hop(neighbor.clone(), hop.clone()));
        }
    }
    outbox.push(Record::adjacency(node.clone(), adjacency));

    Ok(Transition { outbox, hits, seeded })
}
