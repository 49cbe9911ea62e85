//! # nhop-rs — Exact-N-Hop Reachability
//!
//! For every node of a directed graph, compute the set of nodes reachable
//! from it by a walk of **exactly** N edges, for all sources at once.
//!
//! The computation is bulk-synchronous message passing: every node runs
//! the same local transition once per round, rounds are separated by a
//! group-by-key barrier, and exactly N + 1 rounds measure N hops.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `Substrate` is the contract between the driver and
//!    whatever stores and shuffles records between rounds
//! 2. **Closed message set**: adjacency, hop and hit values are one enum,
//!    dispatched by pattern matching inside a single transition function
//! 3. **Propagator owns nothing**: a node's round is a pure function of its
//!    inbox and an immutable `RoundContext`
//! 4. **Stateless rounds**: adjacency is re-announced every round rather
//!    than kept in memory across supersteps
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nhop_rs::{HopReach, HopConfig};
//!
//! # async fn example() -> nhop_rs::Result<()> {
//! let reach = HopReach::open_memory().await?;
//! let result = reach
//!     .compute(["A\tB", "B\tC", "C\tA"], HopConfig::new(2))
//!     .await?;
//!
//! assert!(result.reaches("A", "C"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Substrates
//!
//! | Substrate | Description |
//! |-----------|-------------|
//! | `MemorySubstrate` | In-memory rounds for testing/embedding |
//! | `DirectorySubstrate` | One `round_<r>` text file per round |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod config;
pub mod materialize;
pub mod propagate;
pub mod substrate;
pub mod driver;
pub mod export;

use std::io::{BufRead, Write};
use std::path::Path;

use tracing::warn;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    NodeId, AdjacencySet, HopMessage, HitRecord, Message, Record,
};

// ============================================================================
// Re-exports: Config, Substrate, Driver
// ============================================================================

pub use config::{HopConfig, RoundContext, SubstrateConfig};
pub use substrate::{
    Substrate, MemorySubstrate, DirectorySubstrate, ConfiguredSubstrate, RoundInput,
};
pub use driver::{AbortHandle, Driver, Phase, Reachability, RoundStats, RunStats};

// ============================================================================
// Top-level handle
// ============================================================================

/// The primary entry point. A `HopReach` wraps a substrate and runs
/// reachability computations against it.
pub struct HopReach<S: Substrate> {
    substrate: S,
    abort: AbortHandle,
}

impl<S: Substrate> HopReach<S> {
    /// Create a handle over the given substrate.
    pub fn with_substrate(substrate: S) -> Self {
        Self { substrate, abort: AbortHandle::new() }
    }

    /// Compute exact-N reachability over raw edge lines.
    pub async fn compute<I, L>(&self, edges: I, config: HopConfig) -> Result<Reachability>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<str>,
    {
        Driver::new(&self.substrate, config)
            .with_abort(self.abort.clone())
            .run(edges)
            .await
    }

    /// Read edges from `input`, compute reachability in exactly `max_hop`
    /// hops, and write one `<origin><TAB><reached,…>` line per origin.
    ///
    /// Nothing is written to `output` unless every round completed.
    pub async fn run<R: BufRead>(
        &self,
        input: R,
        output: &mut dyn Write,
        max_hop: u32,
    ) -> Result<RunStats> {
        let mut undecodable = 0usize;
        let mut lines = Vec::new();
        for raw in input.split(b'\n') {
            match String::from_utf8(raw?) {
                Ok(line) => lines.push(line),
                Err(e) => {
                    warn!(error = %e, "skipping edge line that is not valid UTF-8");
                    undecodable += 1;
                }
            }
        }

        let mut result = self.compute(lines, HopConfig::new(max_hop)).await?;
        result.stats.malformed_skipped += undecodable;
        export::write_reachability(&result, output)?;
        Ok(result.stats)
    }

    /// Handle that stops a running computation at the next checkpoint.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Access the underlying substrate (for inspecting round artifacts).
    pub fn substrate(&self) -> &S {
        &self.substrate
    }
}

/// In-memory rounds for testing and embedding.
impl HopReach<MemorySubstrate> {
    pub async fn open_memory() -> Result<Self> {
        Ok(Self::with_substrate(MemorySubstrate::new()))
    }
}

/// Round files under a directory.
impl HopReach<DirectorySubstrate> {
    pub async fn open_directory(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::with_substrate(DirectorySubstrate::open(root).await?))
    }
}

/// Substrate picked from configuration.
impl HopReach<ConfiguredSubstrate> {
    pub async fn open(config: &SubstrateConfig) -> Result<Self> {
        Ok(Self::with_substrate(config.open().await?))
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A record that does not split into the expected fields. Skipped
    /// wherever it is encountered during a run.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Round {round} failed: {reason}")]
    RoundFailure { round: u32, reason: String },

    #[error("Protocol invariant violated: {0}")]
    ProtocolViolation(String),

    #[error("Aborted before completing round {round}")]
    Aborted { round: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
