//! # Execution Substrate
//!
//! The contract between the superstep driver and whatever holds the
//! records between rounds. A substrate offers two things:
//!
//! 1. Durable round artifacts, addressed as `round_<r>`. Round `r` reads
//!    `round_r` and writes `round_{r+1}`; materialization writes `round_0`.
//! 2. The group-by-key shuffle: every message addressed to a node lands in
//!    that node's inbox, and inboxes are hash-partitioned so partitions can
//!    be processed concurrently.
//!
//! The barrier itself is the driver awaiting every partition before it
//! writes the round's output; substrates never hand out a partially
//! written round.
//!
//! ## Implementations
//!
//! | Substrate | Module | Description |
//! |-----------|--------|-------------|
//! | `MemorySubstrate` | `memory` | In-memory for testing/embedding |
//! | `DirectorySubstrate` | `directory` | One line-oriented file per round |

pub mod memory;
pub mod directory;
pub mod shuffle;

use async_trait::async_trait;
use crate::config::SubstrateConfig;
use crate::model::Record;
use crate::Result;

pub use memory::MemorySubstrate;
pub use directory::DirectorySubstrate;
pub use shuffle::{Partition, group_by_key};

/// Records read back for one round.
#[derive(Debug, Clone, Default)]
pub struct RoundInput {
    pub records: Vec<Record>,
    /// Lines that could not be decoded and were skipped.
    pub malformed: usize,
}

/// Round storage plus the group-by-key shuffle.
#[async_trait]
pub trait Substrate: Send + Sync + 'static {
    /// Persist the complete output of a round under `round_<round>`,
    /// replacing anything stored there before.
    async fn write_round(&self, round: u32, records: Vec<Record>) -> Result<()>;

    /// Read back `round_<round>`. Fails with `Error::NotFound` if it was
    /// never written.
    async fn read_round(&self, round: u32) -> Result<RoundInput>;

    /// Drop every stored round.
    async fn clear(&self) -> Result<()>;

    /// Names of the stored rounds, sorted by round index.
    async fn round_names(&self) -> Result<Vec<String>>;

    /// Group records by destination node into `partitions` hash partitions.
    fn group_by_key(&self, records: Vec<Record>, partitions: usize) -> Vec<Partition> {
        shuffle::group_by_key(records, partitions)
    }
}

// ============================================================================
// Configured substrate
// ============================================================================

/// A substrate chosen at runtime from a [`SubstrateConfig`].
pub enum ConfiguredSubstrate {
    Memory(MemorySubstrate),
    Directory(DirectorySubstrate),
}

impl SubstrateConfig {
    pub async fn open(&self) -> Result<ConfiguredSubstrate> {
        Ok(match self {
            SubstrateConfig::Memory => ConfiguredSubstrate::Memory(MemorySubstrate::new()),
            SubstrateConfig::Directory { root } => {
                ConfiguredSubstrate::Directory(DirectorySubstrate::open(root).await?)
            }
        })
    }
}

#[async_trait]
impl Substrate for ConfiguredSubstrate {
    async fn write_round(&self, round: u32, records: Vec<Record>) -> Result<()> {
        match self {
            Self::Memory(s) => s.write_round(round, records).await,
            Self::Directory(s) => s.write_round(round, records).await,
        }
    }

    async fn read_round(&self, round: u32) -> Result<RoundInput> {
        match self {
            Self::Memory(s) => s.read_round(round).await,
            Self::Directory(s) => s.read_round(round).await,
        }
    }

    async fn clear(&self) -> Result<()> {
        match self {
            Self::Memory(s) => s.clear().await,
            Self::Directory(s) => s.clear().await,
        }
    }

    async fn round_names(&self) -> Result<Vec<String>> {
        match self {
            Self::Memory(s) => s.round_names().await,
            Self::Directory(s) => s.round_names().await,
        }
    }
}

/// Parse the index out of a `round_<r>` name.
pub(crate) fn round_index(name: &str) -> Option<u32> {
    name.strip_prefix("round_")?.parse().ok()
}

/// Sort round names by their numeric index (`round_10` after `round_9`).
pub(crate) fn sort_round_names(names: &mut Vec<String>) {
    names.retain(|n| round_index(n).is_some());
    names.sort_by_key(|n| round_index(n));
}
