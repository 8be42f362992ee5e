//! In-process blob store.

use super::BlobStore;
use crate::error::{DataError, Result};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Blob store backed by a map, for tests and single-process pipelines.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> DataError {
    DataError::Store("memory store lock poisoned".to_string())
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let blobs = self.blobs.read().map_err(|_| poisoned())?;
        blobs.get(key).cloned().ok_or_else(|| DataError::NotFound {
            key: key.to_string(),
        })
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let mut blobs = self.blobs.write().map_err(|_| poisoned())?;
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut blobs = self.blobs.write().map_err(|_| poisoned())?;
        let bytes = blobs.remove(from).ok_or_else(|| DataError::NotFound {
            key: from.to_string(),
        })?;
        blobs.insert(to.to_string(), bytes);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let blobs = self.blobs.read().map_err(|_| poisoned())?;
        Ok(blobs.keys().cloned().collect())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        let blobs = self.blobs.read().map_err(|_| poisoned())?;
        Ok(blobs.contains_key(key))
    }
}
