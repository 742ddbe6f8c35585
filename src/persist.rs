/// versioned snapshots of the whole algorithm state. an explicit schema
/// (population genomes, counters, config) rather than an opaque object
/// graph, so old snapshots are either readable or cleanly rejected.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EvolveParams;
use crate::dna::Genome;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encode/decode failed: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion { found: u32 },
    #[error("snapshot does not match the active configuration: {0}")]
    Incompatible(String),
}

/// everything needed to resume a run: the population's genomes in rank
/// order plus the engine's bookkeeping
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub params: EvolveParams,
    pub generation: u64,
    pub time_spent_ms: u64,
    pub best_fitness: Option<u64>,
    pub generations_since_improvement: u64,
    pub genomes: Vec<Genome>,
}

pub trait StateStore {
    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError>;
    /// `Ok(None)` when no snapshot exists yet
    fn load(&self) -> Result<Option<Snapshot>, SnapshotError>;
}

/// snapshot file in JSON next to the working directory
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for JsonStateStore {
    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        profiling::scope!("JsonStateStore::save");
        let json = serde_json::to_string(snapshot)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: Snapshot = serde_json::from_str(&json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
            });
        }
        Ok(Some(snapshot))
    }
}
