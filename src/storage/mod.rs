//! Single-slot storage for confirmation records
//!
//! Each key holds at most one record. Writing replaces the previous record
//! wholesale; nothing is appended and nothing expires.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use log::debug;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::models::ConfirmationRecord;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Stored record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Durable key/value slot for [`ConfirmationRecord`]s
pub trait ConfirmationStore: Send + Sync {
    /// Replace whatever is stored under `key` with `record`
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted
    fn write(&self, key: &str, record: &ConfirmationRecord) -> Result<(), StorageError>;

    /// Read the record stored under `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the stored record cannot be read back
    fn read(&self, key: &str) -> Result<Option<ConfirmationRecord>, StorageError>;
}

/// Stores each key as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileConfirmationStore {
    dir: PathBuf,
}

impl FileConfirmationStore {
    /// Open (creating if needed) a store rooted at `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl ConfirmationStore for FileConfirmationStore {
    fn write(&self, key: &str, record: &ConfirmationRecord) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let json = serde_json::to_vec_pretty(record)?;

        // Each write gets its own temp file beside the target so concurrent
        // writers never share a staging path; persist renames it into place
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        tmp.write_all(&json).map_err(|source| StorageError::Io {
            path: tmp.path().to_path_buf(),
            source,
        })?;
        tmp.persist(&path).map_err(|e| StorageError::Io {
            path: path.clone(),
            source: e.error,
        })?;

        debug!("Stored {key} at {}", path.display());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<ConfirmationRecord>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

/// In-process store, also used as a test double
#[derive(Debug, Default)]
pub struct MemoryConfirmationStore {
    records: Mutex<HashMap<String, ConfirmationRecord>>,
    writes: AtomicUsize,
}

impl MemoryConfirmationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of occupied slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConfirmationStore for MemoryConfirmationStore {
    fn write(&self, key: &str, record: &ConfirmationRecord) -> Result<(), StorageError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<ConfirmationRecord>, StorageError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }
}
