use std::path::PathBuf;

/// Errors surfaced by the training and serving pipeline.
///
/// Extraction-level failures (unreachable pages, malformed URLs) never show
/// up here: they are absorbed into degraded feature defaults close to where
/// they happen.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("dataset format error: {0}")]
    DatasetFormat(String),

    #[error("model file not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("model not trained or loaded yet")]
    ModelNotReady,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
