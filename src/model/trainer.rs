use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::forest::{ForestParams, RandomForest};
use super::metrics::{f1_phishing, ClassificationReport, ConfusionMatrix};
use super::scaler::StandardScaler;
use super::ModelArtifact;
use crate::error::{Error, Result};
use crate::features::{FeatureExtractor, FEATURE_NAMES};

/// Seed for the train/test shuffle and every fitted forest, fixed so a
/// training run is reproducible end to end.
const TRAINING_SEED: u64 = 42;

const TEST_FRACTION: f64 = 0.2;

/// One labeled training sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledUrl {
    pub url: String,
    pub is_phishing: bool,
}

/// Dense feature rows plus the label column, the unit of caching between
/// dataset extraction and training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTable {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

/// Hyperparameter grid for tuning runs, searched exhaustively with k-fold
/// cross-validation scored on phishing-class F1.
#[derive(Debug, Clone)]
pub struct GridSearch {
    pub n_estimators: Vec<usize>,
    pub max_depths: Vec<Option<usize>>,
    pub min_samples_splits: Vec<usize>,
    pub min_samples_leaves: Vec<usize>,
    pub folds: usize,
}

impl Default for GridSearch {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200, 300],
            max_depths: vec![None, Some(10), Some(20), Some(30)],
            min_samples_splits: vec![2, 5, 10],
            min_samples_leaves: vec![1, 2, 4],
            folds: 3,
        }
    }
}

/// Diagnostic output of a training run. Not part of the saved artifact.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub accuracy: f64,
    pub report: ClassificationReport,
    pub confusion: ConfusionMatrix,
    pub feature_importances: Vec<(String, f64)>,
    pub params: ForestParams,
}

/// Orchestrates dataset loading, batch feature extraction with optional
/// caching, classifier training and artifact persistence.
pub struct ModelTrainer {
    extractor: FeatureExtractor,
    artifact: Option<ModelArtifact>,
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelTrainer {
    pub fn new() -> Self {
        Self {
            // Content fetching stays disabled for training throughput; every
            // content feature trains on its documented default.
            extractor: FeatureExtractor::offline(),
            artifact: None,
        }
    }

    /// Load a two-column `url,is_phishing` dataset from disk.
    pub fn load_dataset(&self, path: &Path) -> Result<Vec<LabeledUrl>> {
        let content = fs::read_to_string(path)?;
        let dataset = parse_dataset(&content)?;
        log::info!("loaded dataset with {} samples", dataset.len());
        Ok(dataset)
    }

    /// Extract URL-only features for every sample.
    ///
    /// When `cache_path` holds a previously written table it is returned
    /// verbatim: the cache is trusted until manually deleted, even if the
    /// source dataset has changed since.
    pub fn extract_features_from_dataset(
        &self,
        dataset: &[LabeledUrl],
        cache_path: Option<&Path>,
    ) -> Result<FeatureTable> {
        if let Some(path) = cache_path {
            if path.exists() {
                log::info!("loading cached features from {}", path.display());
                let content = fs::read_to_string(path)?;
                return Ok(serde_json::from_str(&content)?);
            }
        }

        log::info!("extracting features for {} urls", dataset.len());
        let mut rows = Vec::with_capacity(dataset.len());
        let mut labels = Vec::with_capacity(dataset.len());
        for sample in dataset {
            if sample.url.trim().is_empty() {
                log::warn!("skipping sample with empty url");
                continue;
            }
            let extracted = self.extractor.extract(&sample.url, false);
            rows.push(extracted.vector);
            labels.push(u8::from(sample.is_phishing));
        }

        let table = FeatureTable {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            rows,
            labels,
        };

        if let Some(path) = cache_path {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(path, serde_json::to_vec(&table)?)?;
            log::info!("cached features to {}", path.display());
        }

        Ok(table)
    }

    /// Train on the feature table: seeded 80/20 split, scaler fit on the
    /// train partition only, then either default hyperparameters or a grid
    /// search. The fitted artifact is held in the trainer until saved.
    pub fn train(&mut self, table: &FeatureTable, hyperparameter_tuning: bool) -> Result<TrainingReport> {
        let n = table.rows.len();
        if n < 5 {
            return Err(Error::DatasetFormat(format!(
                "need at least 5 samples to train, got {}",
                n
            )));
        }
        if table.labels.len() != n {
            return Err(Error::DatasetFormat(
                "label column length does not match feature rows".to_string(),
            ));
        }
        let width = table.feature_names.len();
        if table.rows.iter().any(|r| r.len() != width) {
            return Err(Error::DatasetFormat(
                "feature row width does not match feature names".to_string(),
            ));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(TRAINING_SEED);
        indices.shuffle(&mut rng);
        let n_test = (((n as f64) * TEST_FRACTION).round() as usize).clamp(1, n - 1);
        let (test_idx, train_idx) = indices.split_at(n_test);

        let gather = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<u8>) {
            (
                idx.iter().map(|&i| table.rows[i].clone()).collect(),
                idx.iter().map(|&i| table.labels[i]).collect(),
            )
        };
        let (x_train, y_train) = gather(train_idx);
        let (x_test, y_test) = gather(test_idx);

        let scaler = StandardScaler::fit(&x_train);
        let x_train_scaled = scaler.transform_all(&x_train);
        let x_test_scaled = scaler.transform_all(&x_test);

        let params = if hyperparameter_tuning {
            log::info!("performing hyperparameter tuning");
            Self::grid_search(&x_train_scaled, &y_train, &GridSearch::default())
        } else {
            log::info!("training with default hyperparameters");
            ForestParams::default()
        };

        let forest = RandomForest::fit(&x_train_scaled, &y_train, params.clone());

        let y_pred: Vec<u8> = x_test_scaled
            .iter()
            .map(|sample| u8::from(forest.predict(sample)))
            .collect();
        let confusion = ConfusionMatrix::from_predictions(&y_test, &y_pred);
        let report = ClassificationReport::from_confusion(&confusion);
        let accuracy = confusion.accuracy();

        let mut feature_importances: Vec<(String, f64)> = table
            .feature_names
            .iter()
            .cloned()
            .zip(forest.feature_importances())
            .collect();
        feature_importances.sort_by(|a, b| b.1.total_cmp(&a.1));

        log::info!("model accuracy: {:.4}", accuracy);
        log::info!("classification report:\n{}", report);
        log::info!("confusion matrix:\n{}", confusion);
        for (name, importance) in feature_importances.iter().take(10) {
            log::info!("feature importance: {:<22} {:.4}", name, importance);
        }

        self.artifact = Some(ModelArtifact { forest, scaler });

        Ok(TrainingReport {
            accuracy,
            report,
            confusion,
            feature_importances,
            params,
        })
    }

    /// Exhaustive grid search with k-fold cross-validation, optimized for
    /// phishing-class F1. The first parameter set reaching the best score
    /// wins ties.
    pub fn grid_search(rows: &[Vec<f64>], labels: &[u8], grid: &GridSearch) -> ForestParams {
        let mut best_params = ForestParams::default();
        let mut best_score = f64::NEG_INFINITY;

        for &n_estimators in &grid.n_estimators {
            for &max_depth in &grid.max_depths {
                for &min_samples_split in &grid.min_samples_splits {
                    for &min_samples_leaf in &grid.min_samples_leaves {
                        let params = ForestParams {
                            n_estimators,
                            max_depth,
                            min_samples_split,
                            min_samples_leaf,
                            seed: TRAINING_SEED,
                        };
                        let score = Self::cross_validate(rows, labels, &params, grid.folds);
                        log::debug!("grid point {:?} -> f1 {:.4}", params, score);
                        if score > best_score {
                            best_score = score;
                            best_params = params;
                        }
                    }
                }
            }
        }

        log::info!(
            "best parameters: {:?} (cv f1 {:.4})",
            best_params,
            best_score
        );
        best_params
    }

    fn cross_validate(rows: &[Vec<f64>], labels: &[u8], params: &ForestParams, folds: usize) -> f64 {
        let n = rows.len();
        let folds = folds.clamp(2, n.max(2));
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(TRAINING_SEED);
        indices.shuffle(&mut rng);

        let fold_size = n.div_ceil(folds);
        let mut scores = Vec::with_capacity(folds);
        for chunk in indices.chunks(fold_size) {
            let holdout: Vec<usize> = chunk.to_vec();
            let training: Vec<usize> = indices
                .iter()
                .copied()
                .filter(|i| !holdout.contains(i))
                .collect();
            if training.is_empty() || holdout.is_empty() {
                continue;
            }

            let x_fold: Vec<Vec<f64>> = training.iter().map(|&i| rows[i].clone()).collect();
            let y_fold: Vec<u8> = training.iter().map(|&i| labels[i]).collect();
            let forest = RandomForest::fit(&x_fold, &y_fold, params.clone());

            let truth: Vec<u8> = holdout.iter().map(|&i| labels[i]).collect();
            let predicted: Vec<u8> = holdout
                .iter()
                .map(|&i| u8::from(forest.predict(&rows[i])))
                .collect();
            scores.push(f1_phishing(&truth, &predicted));
        }

        if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }

    /// Persist the fitted artifact. State error when called before `train`.
    pub fn save_model(&self, path: &Path) -> Result<()> {
        let artifact = self.artifact.as_ref().ok_or(Error::ModelNotReady)?;
        artifact.save(path)
    }

    pub fn load_model(&mut self, path: &Path) -> Result<()> {
        self.artifact = Some(ModelArtifact::load(path)?);
        Ok(())
    }

    pub fn artifact(&self) -> Option<&ModelArtifact> {
        self.artifact.as_ref()
    }

    pub fn into_artifact(self) -> Option<ModelArtifact> {
        self.artifact
    }
}

/// Parse CSV content with `url` and `is_phishing` columns. Column order is
/// free; extra columns are ignored; a missing required column is a dataset
/// format error.
pub fn parse_dataset(content: &str) -> Result<Vec<LabeledUrl>> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| Error::DatasetFormat("dataset is empty".to_string()))?;

    let columns: Vec<&str> = header.split(',').map(|c| c.trim()).collect();
    let url_col = columns
        .iter()
        .position(|c| *c == "url")
        .ok_or_else(|| Error::DatasetFormat("missing required column 'url'".to_string()))?;
    let label_col = columns.iter().position(|c| *c == "is_phishing").ok_or_else(|| {
        Error::DatasetFormat("missing required column 'is_phishing'".to_string())
    })?;

    let mut dataset = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
        let url = fields.get(url_col).copied().unwrap_or_default();
        let label = fields.get(label_col).copied().unwrap_or_default();
        let label: i64 = label.parse().map_err(|_| {
            Error::DatasetFormat(format!(
                "row {}: invalid is_phishing value '{}'",
                line_no + 2,
                label
            ))
        })?;
        dataset.push(LabeledUrl {
            url: url.to_string(),
            is_phishing: label != 0,
        });
    }
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DATASET: &str = include_str!("../../data/phishing_dataset.csv");

    fn sample_table() -> FeatureTable {
        let trainer = ModelTrainer::new();
        let dataset = parse_dataset(SAMPLE_DATASET).unwrap();
        trainer
            .extract_features_from_dataset(&dataset, None)
            .unwrap()
    }

    #[test]
    fn test_parse_dataset() {
        let dataset = parse_dataset("url,is_phishing\nhttp://a.com,1\nhttps://b.com,0\n").unwrap();
        assert_eq!(dataset.len(), 2);
        assert!(dataset[0].is_phishing);
        assert!(!dataset[1].is_phishing);
    }

    #[test]
    fn test_parse_dataset_missing_column() {
        let err = parse_dataset("url,label\nhttp://a.com,1\n").unwrap_err();
        assert!(matches!(err, Error::DatasetFormat(_)));

        let err = parse_dataset("address,is_phishing\nhttp://a.com,1\n").unwrap_err();
        assert!(matches!(err, Error::DatasetFormat(_)));
    }

    #[test]
    fn test_parse_dataset_bad_label() {
        let err = parse_dataset("url,is_phishing\nhttp://a.com,maybe\n").unwrap_err();
        assert!(matches!(err, Error::DatasetFormat(_)));
    }

    #[test]
    fn test_extraction_skips_empty_urls() {
        let trainer = ModelTrainer::new();
        let dataset = vec![
            LabeledUrl {
                url: "https://a.com".to_string(),
                is_phishing: false,
            },
            LabeledUrl {
                url: "   ".to_string(),
                is_phishing: true,
            },
        ];
        let table = trainer.extract_features_from_dataset(&dataset, None).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.labels, vec![0]);
    }

    #[test]
    fn test_feature_cache_is_trusted_verbatim() {
        let trainer = ModelTrainer::new();
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("features.json");

        let dataset = parse_dataset(SAMPLE_DATASET).unwrap();
        let first = trainer
            .extract_features_from_dataset(&dataset, Some(&cache))
            .unwrap();
        assert!(cache.exists());

        // A changed dataset must not invalidate the cache.
        let changed = vec![LabeledUrl {
            url: "https://completely-different.example".to_string(),
            is_phishing: true,
        }];
        let second = trainer
            .extract_features_from_dataset(&changed, Some(&cache))
            .unwrap();
        assert_eq!(first.rows, second.rows);
        assert_eq!(first.labels, second.labels);
    }

    #[test]
    fn test_train_on_sample_dataset() {
        let mut trainer = ModelTrainer::new();
        let report = trainer.train(&sample_table(), false).unwrap();

        assert!(report.accuracy >= 0.8, "accuracy {}", report.accuracy);
        assert!(trainer.artifact().is_some());
        // Importances are a distribution over the canonical features.
        let sum: f64 = report.feature_importances.iter().map(|(_, v)| v).sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_untuned_training_is_byte_deterministic() {
        let table = sample_table();
        let dir = tempfile::tempdir().unwrap();

        let path_a = dir.path().join("a.json");
        let mut trainer_a = ModelTrainer::new();
        trainer_a.train(&table, false).unwrap();
        trainer_a.save_model(&path_a).unwrap();

        let path_b = dir.path().join("b.json");
        let mut trainer_b = ModelTrainer::new();
        trainer_b.train(&table, false).unwrap();
        trainer_b.save_model(&path_b).unwrap();

        assert_eq!(fs::read(&path_a).unwrap(), fs::read(&path_b).unwrap());
    }

    #[test]
    fn test_save_before_train_is_state_error() {
        let trainer = ModelTrainer::new();
        let err = trainer.save_model(Path::new("ignored.json")).unwrap_err();
        assert!(matches!(err, Error::ModelNotReady));
    }

    #[test]
    fn test_save_load_round_trip_predictions_match() {
        let mut trainer = ModelTrainer::new();
        trainer.train(&sample_table(), false).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        trainer.save_model(&path).unwrap();

        let mut reloaded = ModelTrainer::new();
        reloaded.load_model(&path).unwrap();

        let extractor = FeatureExtractor::offline();
        for probe in [
            "https://www.google.com",
            "http://paypal-secure-login.com",
            "https://amaz0n-security-alert.com",
        ] {
            let vector = extractor.extract(probe, false).vector;
            assert_eq!(
                trainer.artifact().unwrap().predict(&vector),
                reloaded.artifact().unwrap().predict(&vector)
            );
        }
    }

    #[test]
    fn test_grid_search_prefers_separating_params() {
        let table = sample_table();
        let scaler = StandardScaler::fit(&table.rows);
        let scaled = scaler.transform_all(&table.rows);
        let grid = GridSearch {
            n_estimators: vec![25],
            max_depths: vec![Some(5), Some(20)],
            min_samples_splits: vec![2],
            min_samples_leaves: vec![1],
            folds: 3,
        };
        let params = ModelTrainer::grid_search(&scaled, &table.labels, &grid);
        assert_eq!(params.n_estimators, 25);
        assert_eq!(params.seed, TRAINING_SEED);
    }

    #[test]
    fn test_train_rejects_tiny_table() {
        let table = FeatureTable {
            feature_names: vec!["url_length".to_string()],
            rows: vec![vec![1.0]],
            labels: vec![1],
        };
        let mut trainer = ModelTrainer::new();
        assert!(matches!(
            trainer.train(&table, false),
            Err(Error::DatasetFormat(_))
        ));
    }
}
