//! Named saved records, one per dimension.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of one saved record: linearized anchor (decimal text) to state blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedRecord {
    entries: BTreeMap<String, Vec<u8>>,
}

impl SavedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, blob: Vec<u8>) {
        self.entries.insert(key.into(), blob);
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<u8>> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(key, blob)| (key.as_str(), blob.as_slice()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        bincode::serialize(self).map_err(StoreError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        bincode::deserialize(bytes).map_err(StoreError::Decode)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read saved record from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write saved record to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode saved record: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode saved record: {0}")]
    Decode(#[source] bincode::Error),
    #[error("failed to encode multiblock state: {0}")]
    State(#[from] crate::codec::CodecError),
}

/// Persistent home of saved records.
pub trait RecordStore {
    /// Returns `None` when no record with that name was ever written.
    fn read(&self, name: &str) -> Result<Option<SavedRecord>, StoreError>;

    fn write(&self, name: &str, record: &SavedRecord) -> Result<(), StoreError>;
}

/// Stores each record as `<root>/<name>.dat`.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.dat"))
    }
}

impl RecordStore for DirectoryStore {
    fn read(&self, name: &str) -> Result<Option<SavedRecord>, StoreError> {
        let path = self.path_for(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        SavedRecord::from_bytes(&bytes).map(Some)
    }

    fn write(&self, name: &str, record: &SavedRecord) -> Result<(), StoreError> {
        let path = self.path_for(name);
        let bytes = record.to_bytes()?;
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Write {
            path: self.root.clone(),
            source,
        })?;

        // Write beside the target and rename so a crash never leaves half a record.
        let staging = path.with_extension("dat.tmp");
        fs::write(&staging, &bytes).map_err(|source| StoreError::Write {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StoreError::Write { path, source })
    }
}

/// In-process store, used by headless hosts and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, SavedRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, record: SavedRecord) {
        self.records.lock().insert(name.into(), record);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl RecordStore for MemoryStore {
    fn read(&self, name: &str) -> Result<Option<SavedRecord>, StoreError> {
        Ok(self.records.lock().get(name).cloned())
    }

    fn write(&self, name: &str, record: &SavedRecord) -> Result<(), StoreError> {
        self.records.lock().insert(name.to_string(), record.clone());
        Ok(())
    }
}
