use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, TreeParams};

/// Forest hyperparameters. The seed is part of the parameters on purpose:
/// two fits with identical data and parameters must produce identical trees,
/// and therefore identical serialized artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: Some(20),
            min_samples_split: 5,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

/// Bagged ensemble of gini decision trees. Each tree trains on a bootstrap
/// sample and considers sqrt(n_features) candidates per split; the predicted
/// probability is the mean of the leaf class fractions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(rows: &[Vec<f64>], labels: &[u8], params: ForestParams) -> Self {
        let n = rows.len();
        let n_features = rows.first().map_or(0, |r| r.len());
        let max_features = (n_features as f64).sqrt().round().max(1.0) as usize;
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features,
        };

        let mut trees = Vec::with_capacity(params.n_estimators);
        for tree_index in 0..params.n_estimators {
            // One rng per tree, derived from the forest seed, keeps the fit
            // reproducible regardless of how trees might later be built.
            let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(tree_index as u64));
            if n == 0 {
                break;
            }
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(DecisionTree::fit(
                rows,
                labels,
                &bootstrap,
                &tree_params,
                &mut rng,
            ));
        }

        Self {
            params,
            trees,
            n_features,
        }
    }

    /// Mean positive-class probability over all trees.
    pub fn predict_proba(&self, sample: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .trees
            .iter()
            .map(|tree| tree.predict_proba(sample))
            .sum();
        sum / self.trees.len() as f64
    }

    pub fn predict(&self, sample: &[f64]) -> bool {
        self.predict_proba(sample) > 0.5
    }

    /// Mean-decrease-in-impurity importances, normalized to sum to 1
    /// (all zeros when no split was ever made).
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            let mut per_tree = vec![0.0; self.n_features];
            tree.accumulate_importances(&mut per_tree);
            let sum: f64 = per_tree.iter().sum();
            if sum > 0.0 {
                for (t, v) in totals.iter_mut().zip(&per_tree) {
                    *t += v / sum;
                }
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            for t in &mut totals {
                *t /= sum;
            }
        }
        totals
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}
