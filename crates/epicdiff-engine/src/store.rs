//! Snapshot and classification persistence.
//!
//! The pipeline touches storage only through the two traits below. The
//! directory-backed [`JsonDataStore`] is the production implementation, one
//! pretty-printed JSON document per iteration; [`MemoryStore`] backs tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use epicdiff_types::{ClassificationSet, EpicdiffError, Result, Snapshot};

use crate::governance::GovernancePolicy;
use crate::grouping::{GroupBy, OrderingPolicy};

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Supplies immutable snapshots by iteration number.
pub trait SnapshotSource {
    /// `Ok(None)` when no snapshot was recorded for the iteration.
    fn snapshot(&self, iteration: u32) -> Result<Option<Snapshot>>;
}

/// Persists derived classification sets, one per iteration.
///
/// Writes follow recompute-and-overwrite: a set replaces whatever was stored
/// for its iteration, and the last writer wins.
pub trait ClassificationStore {
    fn read(&self, iteration: u32) -> Result<Option<ClassificationSet>>;
    fn write(&self, set: &ClassificationSet) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Directory-backed store: `snapshot-<n>.json` and `classification-<n>.json`
/// under one root.
#[derive(Debug, Clone)]
pub struct JsonDataStore {
    root: PathBuf,
}

impl JsonDataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshot_path(&self, iteration: u32) -> PathBuf {
        self.root.join(format!("snapshot-{iteration}.json"))
    }

    fn classification_path(&self, iteration: u32) -> PathBuf {
        self.root.join(format!("classification-{iteration}.json"))
    }

    /// Write a snapshot document. The root directory is created if missing.
    pub fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.snapshot_path(snapshot.iteration);
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&path, json)?;
        tracing::debug!(path = %path.display(), "Snapshot saved");
        Ok(())
    }
}

impl SnapshotSource for JsonDataStore {
    fn snapshot(&self, iteration: u32) -> Result<Option<Snapshot>> {
        let path = self.snapshot_path(iteration);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }
}

impl ClassificationStore for JsonDataStore {
    fn read(&self, iteration: u32) -> Result<Option<ClassificationSet>> {
        let path = self.classification_path(iteration);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn write(&self, set: &ClassificationSet) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.classification_path(set.iteration);
        let json = serde_json::to_string_pretty(set)?;
        std::fs::write(&path, json)?;
        tracing::debug!(path = %path.display(), "Classification saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// HashMap-backed store for tests and ad hoc runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: RefCell<HashMap<u32, Snapshot>>,
    classifications: RefCell<HashMap<u32, ClassificationSet>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_snapshot(&self, snapshot: Snapshot) {
        self.snapshots
            .borrow_mut()
            .insert(snapshot.iteration, snapshot);
    }
}

impl SnapshotSource for MemoryStore {
    fn snapshot(&self, iteration: u32) -> Result<Option<Snapshot>> {
        Ok(self.snapshots.borrow().get(&iteration).cloned())
    }
}

impl ClassificationStore for MemoryStore {
    fn read(&self, iteration: u32) -> Result<Option<ClassificationSet>> {
        Ok(self.classifications.borrow().get(&iteration).cloned())
    }

    fn write(&self, set: &ClassificationSet) -> Result<()> {
        self.classifications
            .borrow_mut()
            .insert(set.iteration, set.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Policy document
// ---------------------------------------------------------------------------

/// Combined configuration document (`policy.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportPolicy {
    pub governance: GovernancePolicy,
    pub group_by: GroupBy,
    pub ordering: OrderingPolicy,
}

/// Read `policy.json` under the data root; `Ok(None)` when absent.
pub fn load_policy(root: &Path) -> Result<Option<ReportPolicy>> {
    let path = root.join("policy.json");
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(&path)?;
    let policy: ReportPolicy = serde_json::from_str(&json)
        .map_err(|e| EpicdiffError::Policy(format!("{}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), "Policy loaded");
    Ok(Some(policy))
}
