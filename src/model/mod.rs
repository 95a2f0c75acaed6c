pub mod forest;
pub mod metrics;
pub mod scaler;
pub mod trainer;
pub mod tree;

pub use forest::{ForestParams, RandomForest};
pub use metrics::{ClassificationReport, ConfusionMatrix};
pub use scaler::StandardScaler;
pub use trainer::{FeatureTable, GridSearch, LabeledUrl, ModelTrainer, TrainingReport};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Immutable classifier-plus-scaler bundle produced by one training run.
/// Versionless: replacing the file on disk is the whole upgrade story, and
/// the write is atomic so an in-flight load never sees a partial artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub forest: RandomForest,
    pub scaler: StandardScaler,
}

impl ModelArtifact {
    /// Raw positive-class probability and the hard prediction for an
    /// unscaled canonical feature vector.
    pub fn predict(&self, vector: &[f64]) -> (bool, f64) {
        let scaled = self.scaler.transform(vector);
        let proba = self.forest.predict_proba(&scaled);
        (proba > 0.5, proba)
    }

    /// Serialize to `path` via write-then-rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let bytes = serde_json::to_vec(self)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        log::info!("model saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ModelNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let artifact = serde_json::from_str(&content)?;
        log::info!("model loaded from {}", path.display());
        Ok(artifact)
    }
}
