//! Run statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Counters for one superstep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStats {
    pub round: u32,
    /// Records in the round's input artifact.
    pub input_records: usize,
    /// Distinct nodes that ran a transition.
    pub nodes: usize,
    /// Records written for the next round.
    pub output_records: usize,
    pub hits: usize,
    /// Nodes that broadcast a self-seed this round.
    pub seeded: usize,
}

/// Counters for a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub max_hop: u32,
    pub rounds: Vec<RoundStats>,
    /// Distinct (origin, reached) pairs in the final answer.
    pub pairs: usize,
    /// Origins with a non-empty reachable set.
    pub origins: usize,
    /// Edge lines and round records skipped as malformed.
    pub malformed_skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunStats {
    pub fn start(max_hop: u32) -> Self {
        Self {
            max_hop,
            rounds: Vec::new(),
            pairs: 0,
            origins: 0,
            malformed_skipped: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Supersteps completed. Equals `max_hop + 1` for a finished run.
    pub fn rounds_executed(&self) -> usize {
        self.rounds.len()
    }

    pub fn elapsed_ms(&self) -> Option<i64> {
        self.finished_at.map(|end| (end - self.started_at).num_milliseconds())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
