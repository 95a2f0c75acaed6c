use serde::{Deserialize, Serialize};

use crate::fetcher::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_USER_AGENT};

/// Runtime configuration. Every field has a default so a missing file is
/// never fatal and a generated file documents every knob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the trained model artifact lives.
    pub model_path: String,
    /// Labeled URL dataset used by training.
    pub dataset_path: String,
    /// Extracted-feature cache written after the first training pass.
    /// Delete the file to force re-extraction.
    pub feature_cache_path: String,
    /// SQLite database for check history and statistics.
    pub database_path: String,
    /// Timeout for fetching page content when content analysis is enabled.
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// How many records history commands show.
    pub history_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: "data/phishing_model.json".to_string(),
            dataset_path: "data/phishing_dataset.csv".to_string(),
            feature_cache_path: "data/extracted_features.json".to_string(),
            database_path: "data/phishscan.db".to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            history_limit: 10,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
