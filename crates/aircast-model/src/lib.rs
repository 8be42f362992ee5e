#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/aircast/aircast/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod artifact;
pub mod calibration;
pub mod error;
pub mod gbdt;
pub mod regressor;
pub mod repository;
pub mod router;
pub mod search;

pub use artifact::TrainedModel;
pub use calibration::{CALIBRATION_FEATURES, CalibratedReading, CalibrationInput, Calibrator};
pub use error::{ModelError, Result};
pub use gbdt::{EvalSet, FitReport, GbdtConfig, GbdtRegressor, Objective, StopReason};
pub use regressor::{ConstantRegressor, Regressor};
pub use repository::ModelRepository;
pub use router::{DEFAULT_GROUP, GroupModelRouter, Pollutant, RegressorPair};
pub use search::{
    HyperParams, HyperparameterSearch, NoPruner, Pruner, RandomSampler, Sampler, SearchConfig, SearchData,
    SearchOutcome, SearchSpace, Study, SuccessiveHalvingConfig, SuccessiveHalvingPruner, TpeSampler, Trial,
    TrialState,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
