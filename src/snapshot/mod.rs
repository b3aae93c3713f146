//! Per-tick view of the node record, container table and connection table.

pub mod error;

pub use error::{Result, SnapshotError};

use crate::policy::{Connection, Container, Node};
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct Snapshot {
    /// Absent until this host has registered itself.
    #[serde(default)]
    pub node: Option<Node>,
    #[serde(default)]
    #[builder(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    #[builder(default)]
    pub connections: Vec<Connection>,
}

impl Snapshot {
    /// Containers that have been assigned an address.
    pub fn scheduled_containers(&self) -> Vec<Container> {
        self.containers
            .iter()
            .filter(|c| c.is_scheduled())
            .cloned()
            .collect()
    }
}

pub trait SnapshotSource: Send + Sync {
    fn load(&self) -> Result<Snapshot>;
}

/// Snapshot document on disk, re-read on every load.
///
/// The document is YAML; JSON is accepted too since it is a YAML subset.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotSource for FileSnapshot {
    fn load(&self) -> Result<Snapshot> {
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| SnapshotError::read(&self.path, e))?;

        let snapshot: Snapshot =
            serde_yaml::from_str(&contents).map_err(|e| SnapshotError::parse(&self.path, e))?;

        debug!(
            path = %self.path.display(),
            containers = snapshot.containers.len(),
            connections = snapshot.connections.len(),
            "Loaded snapshot"
        );
        Ok(snapshot)
    }
}

/// In-memory snapshot that can be swapped while the loop runs.
#[derive(Debug, Clone, Default)]
pub struct SharedSnapshot {
    inner: Arc<RwLock<Snapshot>>,
}

impl SharedSnapshot {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(snapshot)),
        }
    }

    pub fn replace(&self, snapshot: Snapshot) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    pub fn update(&self, f: impl FnOnce(&mut Snapshot)) {
        let mut snapshot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *snapshot);
    }
}

impl SnapshotSource for SharedSnapshot {
    fn load(&self) -> Result<Snapshot> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
