//! Run configuration.
//!
//! Everything a superstep needs to know arrives as a value: the driver
//! builds one [`RoundContext`] per round and hands it to every node
//! transition. Nothing here is process-global.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use crate::{Error, Result};

/// Hop count the original batch job fell back to when none was configured.
pub const DEFAULT_MAX_HOP: u32 = 3;

/// Immutable configuration for one reachability run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopConfig {
    /// N: the exact walk length to measure.
    pub max_hop: u32,
    /// Number of hash partitions processed concurrently within a round.
    pub workers: usize,
}

impl Default for HopConfig {
    fn default() -> Self {
        Self { max_hop: DEFAULT_MAX_HOP, workers: default_workers() }
    }
}

impl HopConfig {
    pub fn new(max_hop: u32) -> Self {
        Self { max_hop, ..Self::default() }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.max_hop == u32::MAX {
            return Err(Error::Config(format!("max_hop must be below {}", u32::MAX)));
        }
        Ok(())
    }

    /// Total supersteps a run performs: rounds `0..=max_hop`.
    pub fn round_count(&self) -> u32 {
        self.max_hop + 1
    }

    pub fn round(&self, round: u32) -> RoundContext {
        RoundContext { round, max_hop: self.max_hop }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Per-round view handed to the propagator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundContext {
    pub round: u32,
    pub max_hop: u32,
}

impl RoundContext {
    /// The drain round: hits are recorded, nothing is forwarded or re-announced.
    pub fn is_terminal(&self) -> bool {
        self.round == self.max_hop
    }
}

/// Name of the durable artifact round `r` reads (and round `r - 1` writes).
pub fn round_name(round: u32) -> String {
    format!("round_{round}")
}

/// Where round artifacts live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubstrateConfig {
    /// In-memory (nothing survives the process)
    Memory,
    /// One line-oriented file per round under `root`
    Directory { root: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_round() {
        let config = HopConfig::new(2);
        assert!(!config.round(0).is_terminal());
        assert!(!config.round(1).is_terminal());
        assert!(config.round(2).is_terminal());
        assert_eq!(config.round_count(), 3);
    }

    #[test]
    fn test_zero_hop_round_zero_is_terminal() {
        let config = HopConfig::new(0);
        assert!(config.round(0).is_terminal());
        assert_eq!(config.round_count(), 1);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        assert!(HopConfig::new(1).with_workers(0).validate().is_err());
        assert!(HopConfig::new(1).with_workers(4).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unbounded_hops() {
        assert!(matches!(HopConfig::new(u32::MAX).validate(), Err(Error::Config(_))));
        assert!(HopConfig::new(u32::MAX - 1).validate().is_ok());
    }

    #[test]
    fn test_config_json() {
        let config = HopConfig::new(5).with_workers(2);
        let json = serde_json::to_string(&config).unwrap();
        let back: HopConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
        assert_eq!(round_name(3), "round_3");
    }
}
