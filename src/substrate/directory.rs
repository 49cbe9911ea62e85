//! Directory-backed execution substrate.
//!
//! Each round is one line-oriented file, `<root>/round_<r>`, in the record
//! wire format. Files are written to a temporary name and renamed into
//! place, so a reader never sees half a round. Artifacts are left on disk
//! after a run (successful or not) for inspection.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::round_name;
use crate::model::{Record, decode_line, encode_line};
use crate::{Error, Result};
use super::{RoundInput, Substrate, round_index, sort_round_names};

/// Round storage in a directory of text files.
#[derive(Debug, Clone)]
pub struct DirectorySubstrate {
    root: PathBuf,
}

impl DirectorySubstrate {
    /// Use `root` for round files, creating it if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn round_path(&self, round: u32) -> PathBuf {
        self.root.join(round_name(round))
    }
}

#[async_trait]
impl Substrate for DirectorySubstrate {
    async fn write_round(&self, round: u32, records: Vec<Record>) -> Result<()> {
        let path = self.round_path(round);
        let staging = path.with_extension("tmp");

        let mut buf = String::new();
        for record in &records {
            buf.push_str(&encode_line(record));
            buf.push('\n');
        }

        let mut file = tokio::fs::File::create(&staging).await?;
        file.write_all(buf.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&staging, &path).await?;

        debug!(round, records = records.len(), path = %path.display(), "wrote round file");
        Ok(())
    }

    async fn read_round(&self, round: u32) -> Result<RoundInput> {
        let path = self.round_path(round);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(round_name(round)));
            }
            Err(e) => return Err(e.into()),
        };

        let mut input = RoundInput::default();
        for line in text.lines().filter(|l| !l.is_empty()) {
            match decode_line(line) {
                Ok(record) => input.records.push(record),
                Err(e) => {
                    warn!(round, error = %e, "skipping malformed round record");
                    input.malformed += 1;
                }
            }
        }
        Ok(input)
    }

    async fn clear(&self) -> Result<()> {
        for name in self.round_names().await? {
            tokio::fs::remove_file(self.root.join(&name)).await?;
        }
        Ok(())
    }

    async fn round_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if round_index(&name).is_some() && entry.file_type().await?.is_file() {
                names.push(name);
            }
        }
        sort_round_names(&mut names);
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HitRecord, HopMessage, Message};

    #[tokio::test]
    async fn test_round_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let substrate = DirectorySubstrate::open(dir.path()).await.unwrap();

        substrate.write_round(1, vec![
            Record::adjacency("A".into(), ["C", "B"].into_iter().collect()),
            Record::hop("B".into(), HopMessage { origin: "A".into(), distance: 0 }),
        ]).await.unwrap();

        let text = std::fs::read_to_string(dir.path().join("round_1")).unwrap();
        assert_eq!(text, "A\tB,C\nB\tA|0\n");
        assert!(!dir.path().join("round_1.tmp").exists());
    }

    #[tokio::test]
    async fn test_hits_read_back_as_single_member_sets() {
        let dir = tempfile::tempdir().unwrap();
        let substrate = DirectorySubstrate::open(dir.path()).await.unwrap();
        substrate.write_round(3, vec![
            Record::hit(HitRecord { origin: "A".into(), reached: "D".into() }),
        ]).await.unwrap();

        let input = substrate.read_round(3).await.unwrap();
        assert_eq!(input.records.len(), 1);
        assert_eq!(input.records[0].key.as_str(), "A");
        assert_eq!(input.records[0].message, Message::Adjacency(["D"].into_iter().collect()));
    }

    #[tokio::test]
    async fn test_malformed_lines_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let substrate = DirectorySubstrate::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("round_0"), "A\tB\nno-tab-here\nB\tA|x\n\n").unwrap();

        let input = substrate.read_round(0).await.unwrap();
        assert_eq!(input.records.len(), 1);
        assert_eq!(input.malformed, 2);
    }

    #[tokio::test]
    async fn test_missing_round_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let substrate = DirectorySubstrate::open(dir.path().join("nested")).await.unwrap();
        assert!(matches!(substrate.read_round(0).await, Err(Error::NotFound(_))));

        substrate.write_round(0, Vec::new()).await.unwrap();
        substrate.write_round(1, Vec::new()).await.unwrap();
        std::fs::write(substrate.root().join("notes.txt"), "keep me").unwrap();
        assert_eq!(substrate.round_names().await.unwrap(), vec!["round_0", "round_1"]);

        substrate.clear().await.unwrap();
        assert!(substrate.round_names().await.unwrap().is_empty());
        assert!(substrate.root().join("notes.txt").exists());
    }
}
