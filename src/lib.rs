pub mod config;
pub mod domain_age;
pub mod domain_utils;
pub mod error;
pub mod features;
pub mod fetcher;
pub mod model;
pub mod predictor;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use features::FeatureExtractor;
pub use model::{ModelArtifact, ModelTrainer};
pub use predictor::{EmailVerdict, Predictor, UrlVerdict};
pub use storage::{PersistenceSink, SqliteSink};
