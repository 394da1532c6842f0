//! JSON graph snapshots.
//!
//! A snapshot is a single JSON file holding a provider export:
//!
//! ```text
//! {
//!   "models": [ <DTDL interface documents> ],
//!   "twins": [ { "id": ..., "model_id": ..., "properties": {...} } ],
//!   "relationships": [ { "id": ..., "source_id": ..., "target_id": ..., "name": ... } ]
//! }
//! ```
//!
//! [`SnapshotSource`] serves a snapshot through the [`TwinSource`] interface.

use crate::model::{Relationship, Twin};
use crate::source::{SourceError, TwinSource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors reading a snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// In-memory form of a snapshot file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub models: Vec<serde_json::Value>,
    #[serde(default)]
    pub twins: Vec<Twin>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Snapshot {
    /// Read and parse a snapshot file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|source| SnapshotError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(
            "Read snapshot {}: {} models, {} twins, {} relationships",
            path.display(),
            snapshot.models.len(),
            snapshot.twins.len(),
            snapshot.relationships.len()
        );
        Ok(snapshot)
    }
}

/// A [`TwinSource`] backed by a snapshot held in memory.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    snapshot: Snapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Read a snapshot file and serve it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        Snapshot::load(path).map(Self::new)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    fn relationships_where<F>(&self, predicate: F) -> Vec<Relationship>
    where
        F: Fn(&Relationship) -> bool,
    {
        self.snapshot
            .relationships
            .iter()
            .filter(|r| predicate(r))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TwinSource for SnapshotSource {
    async fn fetch_models(&self) -> Result<Vec<serde_json::Value>, SourceError> {
        Ok(self.snapshot.models.clone())
    }

    async fn fetch_twins(&self) -> Result<Vec<Twin>, SourceError> {
        Ok(self.snapshot.twins.clone())
    }

    async fn fetch_outgoing_relationships(
        &self,
        twin_id: &str,
    ) -> Result<Vec<Relationship>, SourceError> {
        Ok(self.relationships_where(|r| r.source_id == twin_id))
    }

    async fn fetch_incoming_relationships(
        &self,
        twin_id: &str,
    ) -> Result<Vec<Relationship>, SourceError> {
        Ok(self.relationships_where(|r| r.target_id == twin_id))
    }

    async fn fetch_all_relationships(&self) -> Result<Vec<Relationship>, SourceError> {
        Ok(self.snapshot.relationships.clone())
    }
}
