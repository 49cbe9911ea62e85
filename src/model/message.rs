//! The closed set of values that travel between supersteps.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use super::NodeId;

/// Out-neighbors of one node.
///
/// Ordered so that re-announcements and final output serialize the same
/// way on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdjacencySet(pub BTreeSet<NodeId>);

impl AdjacencySet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn insert(&mut self, node: NodeId) -> bool {
        self.0.insert(node)
    }

    pub fn extend(&mut self, other: AdjacencySet) {
        self.0.extend(other.0);
    }

    pub fn contains(&self, node: &str) -> bool {
        self.0.contains(node)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.0.iter()
    }
}

impl<T: Into<NodeId>> FromIterator<T> for AdjacencySet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for AdjacencySet {
    type Item = NodeId;
    type IntoIter = std::collections::btree_set::IntoIter<NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// "`origin` is `distance` hops from whoever forwarded this message."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HopMessage {
    pub origin: NodeId,
    pub distance: u32,
}

impl HopMessage {
    /// A fresh message announcing `origin` to its direct neighbors.
    pub fn seed(origin: NodeId) -> Self {
        Self { origin, distance: 0 }
    }

    /// The same message after walking one more edge.
    pub fn forwarded(&self) -> Self {
        Self { origin: self.origin.clone(), distance: self.distance + 1 }
    }
}

/// `origin` reaches `reached` by a walk of exactly N edges.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HitRecord {
    pub origin: NodeId,
    pub reached: NodeId,
}

/// Value side of a keyed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// The key node's adjacency, re-announced to itself every round.
    Adjacency(AdjacencySet),
    /// A frontier entry addressed to the key node.
    Hop(HopMessage),
    /// The key node (an origin) reached this node in exactly N hops.
    Hit(NodeId),
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Adjacency(_) => "adjacency",
            Message::Hop(_) => "hop",
            Message::Hit(_) => "hit",
        }
    }
}

/// A keyed record: the unit the execution substrate shuffles and persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: NodeId,
    pub message: Message,
}

impl Record {
    pub fn adjacency(key: NodeId, neighbors: AdjacencySet) -> Self {
        Self { key, message: Message::Adjacency(neighbors) }
    }

    pub fn hop(to: NodeId, hop: HopMessage) -> Self {
        Self { key: to, message: Message::Hop(hop) }
    }

    pub fn hit(hit: HitRecord) -> Self {
        Self { key: hit.origin, message: Message::Hit(hit.reached) }
    }
}
