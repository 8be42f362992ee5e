//! Selection of a regressor pair by group key.
//!
//! One default pair plus optional per-group overrides (for instance one pair
//! per city). Keys are matched case-insensitively; an unmapped key, or a group
//! whose artifacts failed to load, resolves to the default pair.

use crate::artifact::TrainedModel;
use crate::error::Result;
use crate::regressor::Regressor;
use crate::repository::ModelRepository;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name the default pair is stored under.
pub const DEFAULT_GROUP: &str = "default";

/// Pollutants a pair predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pollutant {
    /// Fine particulate matter
    Pm2_5,
    /// Coarse particulate matter
    Pm10,
}

impl Pollutant {
    /// Column name of the pollutant.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pm2_5 => "pm2_5",
            Self::Pm10 => "pm10",
        }
    }
}

/// The two regressors applied to a row.
#[derive(Debug, Clone)]
pub struct RegressorPair {
    /// PM2.5 regressor
    pub pm2_5: Arc<dyn Regressor>,
    /// PM10 regressor
    pub pm10: Arc<dyn Regressor>,
}

impl RegressorPair {
    /// Create a pair.
    pub fn new(pm2_5: Arc<dyn Regressor>, pm10: Arc<dyn Regressor>) -> Self {
        Self { pm2_5, pm10 }
    }

    /// Regressor of one pollutant.
    pub fn get(&self, pollutant: Pollutant) -> &Arc<dyn Regressor> {
        match pollutant {
            Pollutant::Pm2_5 => &self.pm2_5,
            Pollutant::Pm10 => &self.pm10,
        }
    }

    fn load(repository: &ModelRepository, group: &str) -> Result<Self> {
        let load = |pollutant: Pollutant| -> Result<Arc<dyn Regressor>> {
            let key = repository.config().calibration_model_key(group, pollutant.name());
            let model: TrainedModel = repository.load(&key)?;
            Ok(Arc::new(model))
        };
        Ok(Self::new(load(Pollutant::Pm2_5)?, load(Pollutant::Pm10)?))
    }
}

/// Default pair plus per-group overrides.
#[derive(Debug, Clone)]
pub struct GroupModelRouter {
    default: RegressorPair,
    groups: HashMap<String, RegressorPair>,
}

impl GroupModelRouter {
    /// Router with only a default pair.
    pub fn new(default: RegressorPair) -> Self {
        Self {
            default,
            groups: HashMap::new(),
        }
    }

    /// Add (or replace) the pair of a group.
    pub fn with_group(mut self, group: &str, pair: RegressorPair) -> Self {
        self.groups.insert(group.to_lowercase(), pair);
        self
    }

    /// Load the default pair and the pairs of `groups` from `repository`.
    ///
    /// A group whose artifacts cannot be loaded is logged and left to the
    /// default pair.
    ///
    /// # Errors
    /// Returns [`crate::ModelError::ArtifactUnavailable`] when the default pair
    /// cannot be loaded.
    pub fn load(repository: &ModelRepository, groups: &[&str]) -> Result<Self> {
        let mut router = Self::new(RegressorPair::load(repository, DEFAULT_GROUP)?);
        for group in groups {
            match RegressorPair::load(repository, group) {
                Ok(pair) => {
                    debug!(%group, "loaded group models");
                    router = router.with_group(group, pair);
                }
                Err(e) => warn!(%group, error = %e, "group models unavailable, using default"),
            }
        }
        Ok(router)
    }

    /// Groups with their own pair.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Pair for `group`; the default for `None` or an unmapped key.
    pub fn resolve(&self, group: Option<&str>) -> &RegressorPair {
        group
            .and_then(|g| self.groups.get(&g.to_lowercase()))
            .unwrap_or(&self.default)
    }

    /// Predict one pollutant for one row of `group`.
    pub fn predict(&self, group: Option<&str>, pollutant: Pollutant, features: &[f64]) -> Result<f64> {
        self.resolve(group).get(pollutant).predict_row(features)
    }
}

impl From<RegressorPair> for GroupModelRouter {
    fn from(default: RegressorPair) -> Self {
        Self::new(default)
    }
}
