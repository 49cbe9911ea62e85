//! Line codec for keyed records.
//!
//! ```text
//! edge input    A<TAB>B          (tab, comma or whitespace separated; B may be a list)
//! adjacency     A<TAB>B,C,D
//! hop message   D<TAB>A|2        (addressed to D: A is 2 hops from the forwarder)
//! hit           A<TAB>D          (A reaches D in exactly N hops)
//! ```
//!
//! A hit shares the adjacency layout, so a persisted hit reads back as a
//! single-member adjacency value keyed by its origin. Only the finalize pass
//! reads hits, and it unions both shapes the same way.

use super::{AdjacencySet, HopMessage, Message, NodeId, Record};
use crate::{Error, Result};

pub const KEY_SEPARATOR: char = '\t';
pub const LIST_SEPARATOR: char = ',';
pub const HOP_SEPARATOR: char = '|';

/// One raw edge-input line: a source and the destinations it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeLine {
    pub source: NodeId,
    /// Empty when the line only declares the source.
    pub destinations: Vec<NodeId>,
}

fn is_edge_separator(c: char) -> bool {
    c == KEY_SEPARATOR || c == LIST_SEPARATOR || c.is_whitespace()
}

fn malformed(what: &str, line: &str) -> Error {
    Error::MalformedRecord(format!("{what}: {line:?}"))
}

/// Split a raw edge token into its source and destination fields.
pub fn parse_edge_line(line: &str) -> Result<EdgeLine> {
    let line = line.trim_end_matches(['\r', '\n']);
    let split_at = line
        .find(is_edge_separator)
        .ok_or_else(|| malformed("edge has no separator", line))?;

    let source = &line[..split_at];
    if source.is_empty() {
        return Err(malformed("edge has no source", line));
    }

    let rest = line[split_at..].trim_start_matches(is_edge_separator);
    // `|` would be read back as a hop message from round storage.
    if line.contains(HOP_SEPARATOR) {
        return Err(malformed("node id contains the hop separator", line));
    }

    let destinations = rest
        .split(is_edge_separator)
        .filter(|d| !d.is_empty())
        .map(NodeId::from)
        .collect();

    Ok(EdgeLine { source: NodeId::from(source), destinations })
}

/// Parse the value side of a hop message: `<origin>|<distance>`.
pub fn parse_hop(value: &str) -> Result<HopMessage> {
    let mut parts = value.split(HOP_SEPARATOR);
    let (Some(origin), Some(distance), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed("hop message needs exactly two fields", value));
    };
    if origin.is_empty() {
        return Err(malformed("hop message has no origin", value));
    }
    let distance = distance
        .parse::<u32>()
        .map_err(|_| malformed("hop distance is not a non-negative integer", value))?;
    Ok(HopMessage { origin: NodeId::from(origin), distance })
}

/// Parse the value side of an adjacency announcement.
pub fn parse_adjacency(value: &str) -> AdjacencySet {
    value
        .split(LIST_SEPARATOR)
        .filter(|n| !n.is_empty())
        .map(NodeId::from)
        .collect()
}

/// Decode one persisted round line.
pub fn decode_line(line: &str) -> Result<Record> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (key, value) = line
        .split_once(KEY_SEPARATOR)
        .ok_or_else(|| malformed("record has no key separator", line))?;
    if key.is_empty() {
        return Err(malformed("record has no key", line));
    }

    let message = if value.contains(HOP_SEPARATOR) {
        Message::Hop(parse_hop(value)?)
    } else {
        Message::Adjacency(parse_adjacency(value))
    };
    Ok(Record { key: NodeId::from(key), message })
}

/// Encode one record as a round line (no trailing newline).
pub fn encode_line(record: &Record) -> String {
    let value = match &record.message {
        Message::Adjacency(set) => join_nodes(set.iter()),
        Message::Hop(hop) => format!("{}{HOP_SEPARATOR}{}", hop.origin, hop.distance),
        Message::Hit(reached) => reached.to_string(),
    };
    format!("{}{KEY_SEPARATOR}{value}", record.key)
}

/// Comma-join node ids in iteration order.
pub fn join_nodes<'a>(nodes: impl IntoIterator<Item = &'a NodeId>) -> String {
    nodes
        .into_iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
