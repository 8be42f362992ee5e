//! Blob storage for model artifacts and encoding mappings.
//!
//! The engine never owns a storage format: trained models and count-encoding
//! mappings are serialized by their owners and handed to a [`BlobStore`] as
//! opaque bytes under an opaque string key.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, StoreStats};

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Key-value storage of opaque artifacts.
pub trait BlobStore: Send + Sync {
    /// Fetch the bytes stored under `key`.
    ///
    /// # Errors
    /// Returns [`crate::DataError::NotFound`] when nothing is stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Store `bytes` under `key`, replacing any previous value.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Move the value stored under `from` to `to`.
    ///
    /// # Errors
    /// Returns [`crate::DataError::NotFound`] when `from` does not exist.
    fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// List all stored keys in ascending order.
    fn keys(&self) -> Result<Vec<String>>;

    /// Check whether a key exists.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.keys()?.iter().any(|k| k == key))
    }
}

/// JSON helpers available on every [`BlobStore`].
pub trait BlobStoreExt: BlobStore {
    /// Deserialize the JSON value stored under `key`.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let bytes = self.get(key)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Serialize `value` as JSON and store it under `key`.
    fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, &bytes)
    }
}

impl<S: BlobStore + ?Sized> BlobStoreExt for S {}

/// Key an artifact is archived under before being replaced.
///
/// The timestamp prefixes the last path segment, so `models/hourly` archived
/// at noon becomes `models/2024-01-01T12:00:00.000000-hourly`.
pub fn archive_key(key: &str, at: DateTime<Utc>) -> String {
    let stamp = at.format("%Y-%m-%dT%H:%M:%S%.6f");
    match key.rsplit_once('/') {
        Some((prefix, name)) => format!("{prefix}/{stamp}-{name}"),
        None => format!("{stamp}-{key}"),
    }
}
