//! Persistence of trained models.

use crate::artifact::TrainedModel;
use crate::error::{ModelError, Result};
use aircast_data::{BlobStore, BlobStoreExt, DataError, Frequency, StorageConfig, archive_key};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// Saves and loads model artifacts in a [`BlobStore`].
///
/// Saving never fails because of the previous artifact: it is archived under
/// a timestamped key first, and a failed archive is only logged.
#[derive(Clone)]
pub struct ModelRepository {
    store: Arc<dyn BlobStore>,
    config: StorageConfig,
}

impl std::fmt::Debug for ModelRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRepository")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ModelRepository {
    /// Create a repository over `store`.
    pub fn new(store: Arc<dyn BlobStore>, config: StorageConfig) -> Self {
        Self { store, config }
    }

    /// Key configuration.
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Store `artifact` under `key`, archiving whatever was there.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, artifact: &T) -> Result<()> {
        let archived = archive_key(key, Utc::now());
        match self.store.rename(key, &archived) {
            Ok(()) => debug!(%key, %archived, "archived previous artifact"),
            Err(DataError::NotFound { .. }) => {}
            Err(e) => warn!(%key, error = %e, "failed to archive previous artifact, overwriting"),
        }
        self.store.put_json(key, artifact)?;
        debug!(%key, "saved artifact");
        Ok(())
    }

    /// Load the artifact stored under `key`.
    ///
    /// # Errors
    /// Every failure, missing key or undecodable payload alike, is reported
    /// as [`ModelError::ArtifactUnavailable`].
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.store
            .get_json(key)
            .map_err(|e| ModelError::ArtifactUnavailable {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Save the point forecast model for `frequency`.
    pub fn save_forecast_model(&self, frequency: Frequency, model: &TrainedModel) -> Result<()> {
        let key = match model.quantile() {
            Some(q) => self.config.quantile_model_key(frequency, q),
            None => self.config.forecast_model_key(frequency),
        };
        self.save(&key, model)
    }

    /// Load the point forecast model for `frequency`.
    pub fn load_forecast_model(&self, frequency: Frequency) -> Result<TrainedModel> {
        self.load(&self.config.forecast_model_key(frequency))
    }

    /// Load the model of `quantile` for `frequency`.
    pub fn load_quantile_model(&self, frequency: Frequency, quantile: f64) -> Result<TrainedModel> {
        self.load(&self.config.quantile_model_key(frequency, quantile))
    }
}
