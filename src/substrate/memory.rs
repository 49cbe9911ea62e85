//! In-memory execution substrate.
//!
//! This is the reference implementation of `Substrate`. Round artifacts
//! live in a map protected by an RwLock and keep their typed records, so a
//! hit reads back as a hit.
//!
//! ## Limitations
//!
//! - **No durability**: everything is gone when the substrate is dropped.
//! - **Whole-round writes only**: `write_round()` replaces the artifact in
//!   one step; there is no appending to a round.
//!
//! Use this substrate for:
//! - Testing the propagator and driver
//! - Embedding the computation in a process that keeps its own results

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use async_trait::async_trait;
use tracing::debug;

use crate::config::round_name;
use crate::model::Record;
use crate::{Error, Result};
use super::{RoundInput, Substrate, sort_round_names};

/// In-memory round storage.
#[derive(Clone, Default)]
pub struct MemorySubstrate {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    /// `round_<r>` → complete output of round r - 1
    rounds: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemorySubstrate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored under `round_<round>`, if written.
    pub fn round_len(&self, round: u32) -> Option<usize> {
        self.inner.rounds.read().get(&round_name(round)).map(Vec::len)
    }
}

#[async_trait]
impl Substrate for MemorySubstrate {
    async fn write_round(&self, round: u32, records: Vec<Record>) -> Result<()> {
        debug!(round, records = records.len(), "storing round in memory");
        self.inner.rounds.write().insert(round_name(round), records);
        Ok(())
    }

    async fn read_round(&self, round: u32) -> Result<RoundInput> {
        let name = round_name(round);
        let records = self.inner.rounds.read()
            .get(&name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name))?;
        Ok(RoundInput { records, malformed: 0 })
    }

    async fn clear(&self) -> Result<()> {
        self.inner.rounds.write().clear();
        Ok(())
    }

    async fn round_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.inner.rounds.read().keys().cloned().collect();
        sort_round_names(&mut names);
        Ok(names)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdjacencySet, HitRecord};

    #[tokio::test]
    async fn test_write_then_read_round() {
        let substrate = MemorySubstrate::new();
        let records = vec![
            Record::adjacency("A".into(), ["B"].into_iter().collect()),
            Record::hit(HitRecord { origin: "A".into(), reached: "C".into() }),
        ];
        substrate.write_round(0, records.clone()).await.unwrap();

        let input = substrate.read_round(0).await.unwrap();
        assert_eq!(input.records, records);
        assert_eq!(input.malformed, 0);
        assert_eq!(substrate.round_len(0), Some(2));
    }

    #[tokio::test]
    async fn test_missing_round_is_not_found() {
        let substrate = MemorySubstrate::new();
        let err = substrate.read_round(4).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(name) if name == "round_4"));
    }

    #[tokio::test]
    async fn test_write_replaces_round() {
        let substrate = MemorySubstrate::new();
        let a = Record::adjacency("A".into(), AdjacencySet::new());
        substrate.write_round(1, vec![a.clone(), a.clone()]).await.unwrap();
        substrate.write_round(1, vec![a]).await.unwrap();
        assert_eq!(substrate.round_len(1), Some(1));
    }

    #[tokio::test]
    async fn test_round_names_sorted_numerically() {
        let substrate = MemorySubstrate::new();
        for round in [10, 2, 0, 9] {
            substrate.write_round(round, Vec::new()).await.unwrap();
        }
        let names = substrate.round_names().await.unwrap();
        assert_eq!(names, vec!["round_0", "round_2", "round_9", "round_10"]);

        substrate.clear().await.unwrap();
        assert!(substrate.round_names().await.unwrap().is_empty());
    }
}
