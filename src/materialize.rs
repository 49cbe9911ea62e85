//! Adjacency materialization.
//!
//! Turns raw edge lines into one adjacency announcement per source. The
//! grouping step is shared with the driver's finalize pass: both are
//! "group values by key, union into a deduplicated set".

use std::collections::BTreeMap;

use tracing::{debug, warn};
use crate::model::*;

/// Output of [`materialize`].
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    /// One adjacency record per distinct source, in key order.
    pub records: Vec<Record>,
    /// Lines skipped because they did not split into source and destination.
    pub malformed: usize,
}

/// Group values by key and union them into a deduplicated set.
///
/// A key that arrives with no values still gets an (empty) entry.
pub fn group_into_sets<I, V>(pairs: I) -> BTreeMap<NodeId, AdjacencySet>
where
    I: IntoIterator<Item = (NodeId, V)>,
    V: IntoIterator<Item = NodeId>,
{
    let mut groups: BTreeMap<NodeId, AdjacencySet> = BTreeMap::new();
    for (key, values) in pairs {
        let set = groups.entry(key).or_default();
        for value in values {
            set.insert(value);
        }
    }
    groups
}

/// Build adjacency announcements from raw edge lines.
///
/// Malformed lines are skipped, never fatal.
pub fn materialize<I, L>(lines: I) -> Materialized
where
    I: IntoIterator<Item = L>,
    L: AsRef<str>,
{
    let mut malformed = 0usize;
    let edges = lines.into_iter().filter_map(|line| {
        match parse_edge_line(line.as_ref()) {
            Ok(edge) => Some((edge.source, edge.destinations)),
            Err(e) => {
                if !line.as_ref().trim().is_empty() {
                    warn!(error = %e, "skipping malformed edge");
                }
                malformed += 1;
                None
            }
        }
    });

    let records: Vec<Record> = group_into_sets(edges)
        .into_iter()
        .map(|(source, neighbors)| Record::adjacency(source, neighbors))
        .collect();

    debug!(sources = records.len(), malformed, "materialized adjacency");
    Materialized { records, malformed }
}
