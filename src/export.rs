//! Final sink export — write the reachability answer in the record format.
//!
//! ```text
//! Reachability → write_reachability() → <origin><TAB><r1>,<r2>,…  (one line per origin)
//! ```
//!
//! Origins and their reached nodes are written in sorted order, so two runs
//! over the same input produce byte-identical output.

use std::io::Write;

use crate::driver::Reachability;
use crate::model::{AdjacencySet, NodeId, record::{KEY_SEPARATOR, join_nodes}};
use crate::Result;

/// Write one line per origin with a non-empty reachable set.
pub fn write_reachability(result: &Reachability, writer: &mut dyn Write) -> Result<()> {
    for (origin, reached) in &result.origins {
        if reached.is_empty() {
            continue;
        }
        writeln!(writer, "{}", format_line(origin, reached))?;
    }
    writer.flush()?;
    Ok(())
}

/// Format a single output record.
pub fn format_line(origin: &NodeId, reached: &AdjacencySet) -> String {
    format!("{origin}{KEY_SEPARATOR}{}", join_nodes(reached.iter()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use crate::driver::RunStats;

    #[test]
    fn test_format_line() {
        let reached: AdjacencySet = ["D", "B"].into_iter().collect();
        assert_eq!(format_line(&"A".into(), &reached), "A\tB,D");
    }

    #[test]
    fn test_write_skips_empty_origins() {
        let mut origins = BTreeMap::new();
        origins.insert(NodeId::from("B"), AdjacencySet::new());
        origins.insert(NodeId::from("A"), ["C"].into_iter().collect());
        let result = Reachability { origins, stats: RunStats::start(2) };

        let mut buf = Vec::new();
        write_reachability(&result, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "A\tC\n");
    }
}
