//! File-backed cluster snapshots.
//!
//! A snapshot captures the contents of a [`MemoryStore`] together with a
//! short history of apply runs, so the CLI can converge the same simulated
//! control plane across invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Result, SnapshotError};
use crate::resource::ManagedResource;

use super::memory::MemoryStore;

/// Current version of the snapshot format.
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Default snapshot location, relative to the working directory.
pub const DEFAULT_SNAPSHOT_PATH: &str = ".halldyll/cluster.json";

/// Maximum number of apply records kept.
const MAX_HISTORY: usize = 50;

/// A persisted control-plane snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Snapshot format version.
    pub version: String,
    /// Resource version counter to continue from.
    pub resource_version: u64,
    /// Stored objects.
    pub resources: Vec<ManagedResource>,
    /// When the snapshot was last written.
    pub last_updated: DateTime<Utc>,
    /// Recent apply runs.
    #[serde(default)]
    pub history: Vec<ApplyRecord>,
}

/// A single apply run recorded in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRecord {
    /// When the run finished.
    pub timestamp: DateTime<Utc>,
    /// Tenant the run applied to.
    pub tenant_id: String,
    /// Application service id.
    pub service_id: String,
    /// Fingerprint of the applied manifest.
    pub manifest_hash: String,
    /// Number of objects written.
    pub changed: usize,
    /// Number of failed objects.
    pub failed: usize,
}

impl ClusterSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            resource_version: 0,
            resources: Vec::new(),
            last_updated: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Captures the current contents of a store, keeping this snapshot's history.
    pub async fn capture(mut self, store: &MemoryStore) -> Self {
        self.resources = store.objects(None).await;
        self.resource_version = store.resource_version().await;
        self.last_updated = Utc::now();
        self
    }

    /// Builds a store holding this snapshot's objects.
    #[must_use]
    pub fn restore(&self) -> MemoryStore {
        MemoryStore::with_objects(self.resources.clone(), self.resource_version)
    }

    /// Records an apply run, trimming old entries.
    pub fn add_history(&mut self, record: ApplyRecord) {
        self.history.push(record);
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
    }
}

impl Default for ClusterSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads and writes snapshots on the local filesystem.
#[derive(Debug)]
pub struct SnapshotStore {
    /// Path to the snapshot file.
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates a snapshot store for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the snapshot file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot.
    ///
    /// Returns `None` if no snapshot has been written yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or was written
    /// by an incompatible version.
    pub async fn load(&self) -> Result<Option<ClusterSnapshot>> {
        if !self.path.exists() {
            debug!("Snapshot does not exist: {}", self.path.display());
            return Ok(None);
        }

        info!("Loading cluster snapshot from: {}", self.path.display());

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| SnapshotError::corrupted(format!("Failed to read snapshot: {e}")))?;

        let snapshot: ClusterSnapshot = serde_json::from_str(&content)
            .map_err(|e| SnapshotError::corrupted(format!("Failed to parse snapshot: {e}")))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                expected: SNAPSHOT_VERSION.to_string(),
                found: snapshot.version,
            }
            .into());
        }

        Ok(Some(snapshot))
    }

    /// Saves the snapshot atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized or written.
    pub async fn save(&self, snapshot: &ClusterSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            debug!("Creating snapshot directory: {}", parent.display());
            fs::create_dir_all(parent).await.map_err(|e| {
                SnapshotError::write_failed(format!("Failed to create snapshot directory: {e}"))
            })?;
        }

        info!("Saving cluster snapshot to: {}", self.path.display());

        let content = serde_json::to_string_pretty(snapshot).map_err(|e| {
            SnapshotError::serialization(format!("Failed to serialize snapshot: {e}"))
        })?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            SnapshotError::write_failed(format!("Failed to create temp snapshot file: {e}"))
        })?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| SnapshotError::write_failed(format!("Failed to write snapshot: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| SnapshotError::write_failed(format!("Failed to sync snapshot: {e}")))?;

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| SnapshotError::write_failed(format!("Failed to rename snapshot: {e}")))?;

        debug!("Snapshot saved successfully");
        Ok(())
    }
}
