//! Persistence collaborator interface
//!
//! The engine treats storage as an opaque save/load pair keyed by take-off
//! id. File-backed storage lives in the `takeoff-storage` crate; the
//! in-memory store here backs tests and embedders without a disk.

use crate::measurement::TakeoffId;
use crate::record::TakeoffRecord;
use std::collections::BTreeMap;

/// Persistence failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unsupported record version {found}, expected at most {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("{0}")]
    Backend(String),
}

/// Save/load pair keyed by take-off id
pub trait TakeoffStore {
    /// Write a take-off, replacing any previous version
    fn save(&mut self, record: &TakeoffRecord) -> Result<(), StoreError>;

    /// Read a take-off, `None` when it was never saved
    fn load(&self, id: TakeoffId) -> Result<Option<TakeoffRecord>, StoreError>;

    /// Read every stored take-off
    fn load_all(&self) -> Result<Vec<TakeoffRecord>, StoreError>;

    /// Remove a take-off; removing a missing one is not an error
    fn delete(&mut self, id: TakeoffId) -> Result<(), StoreError>;
}

/// Store keeping records in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: BTreeMap<TakeoffId, TakeoffRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl TakeoffStore for MemoryStore {
    fn save(&mut self, record: &TakeoffRecord) -> Result<(), StoreError> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    fn load(&self, id: TakeoffId) -> Result<Option<TakeoffRecord>, StoreError> {
        Ok(self.records.get(&id).cloned())
    }

    fn load_all(&self) -> Result<Vec<TakeoffRecord>, StoreError> {
        Ok(self.records.values().cloned().collect())
    }

    fn delete(&mut self, id: TakeoffId) -> Result<(), StoreError> {
        self.records.remove(&id);
        Ok(())
    }
}
