use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// One CART node. Every node keeps its gini impurity and sample count so
/// feature importances can be computed after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        proba: f64,
        n_samples: usize,
        impurity: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        n_samples: usize,
        impurity: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn n_samples(&self) -> usize {
        match self {
            Node::Leaf { n_samples, .. } | Node::Split { n_samples, .. } => *n_samples,
        }
    }

    fn impurity(&self) -> f64 {
        match self {
            Node::Leaf { impurity, .. } | Node::Split { impurity, .. } => *impurity,
        }
    }
}

/// Per-tree growth limits, shared across the forest.
#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: usize,
}

/// Binary classification tree: gini splits on a random feature subset per
/// node, leaves store the positive-class fraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Node,
    n_features: usize,
}

impl DecisionTree {
    /// Grow a tree over `indices` into the shared dataset. The rng drives the
    /// per-node feature subsets, so an identically seeded rng reproduces the
    /// tree exactly.
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[u8],
        indices: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = rows.first().map_or(0, |r| r.len());
        let root = build_node(rows, labels, indices, 0, params, n_features, rng);
        Self { root, n_features }
    }

    /// Positive-class probability at the leaf this sample falls into.
    pub fn predict_proba(&self, sample: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { proba, .. } => return *proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if sample.get(*feature).copied().unwrap_or(0.0) <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Accumulate mean-decrease-in-impurity contributions into `out`
    /// (one slot per feature), weighted by the fraction of samples reaching
    /// each split.
    pub fn accumulate_importances(&self, out: &mut [f64]) {
        let total = self.root.n_samples().max(1) as f64;
        walk_importances(&self.root, total, out);
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

fn walk_importances(node: &Node, total: f64, out: &mut [f64]) {
    if let Node::Split {
        feature,
        n_samples,
        impurity,
        left,
        right,
        ..
    } = node
    {
        let n = *n_samples as f64;
        let nl = left.n_samples() as f64;
        let nr = right.n_samples() as f64;
        let decrease = impurity - (nl / n) * left.impurity() - (nr / n) * right.impurity();
        if let Some(slot) = out.get_mut(*feature) {
            *slot += (n / total) * decrease.max(0.0);
        }
        walk_importances(left, total, out);
        walk_importances(right, total, out);
    }
}

fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

#[allow(clippy::too_many_arguments)]
fn build_node(
    rows: &[Vec<f64>],
    labels: &[u8],
    indices: &[usize],
    depth: usize,
    params: &TreeParams,
    n_features: usize,
    rng: &mut StdRng,
) -> Node {
    let n = indices.len();
    let positives = indices.iter().filter(|&&i| labels[i] == 1).count();
    let proba = if n == 0 {
        0.0
    } else {
        positives as f64 / n as f64
    };
    let impurity = gini(positives, n);

    let depth_exhausted = params.max_depth.is_some_and(|d| depth >= d);
    let pure = positives == 0 || positives == n;
    if pure || n < params.min_samples_split || depth_exhausted || n_features == 0 {
        return Node::Leaf {
            proba,
            n_samples: n,
            impurity,
        };
    }

    // Random feature subset for this node.
    let mut candidates: Vec<usize> = (0..n_features).collect();
    candidates.shuffle(rng);
    candidates.truncate(params.max_features.max(1));

    let mut best: Option<(usize, f64, f64)> = None; // (feature, threshold, weighted gini)
    for &feature in &candidates {
        let mut values: Vec<f64> = indices.iter().map(|&i| rows[i][feature]).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup();

        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let mut left_n = 0;
            let mut left_pos = 0;
            for &i in indices {
                if rows[i][feature] <= threshold {
                    left_n += 1;
                    if labels[i] == 1 {
                        left_pos += 1;
                    }
                }
            }
            let right_n = n - left_n;
            if left_n < params.min_samples_leaf || right_n < params.min_samples_leaf {
                continue;
            }
            let right_pos = positives - left_pos;
            let weighted = (left_n as f64 * gini(left_pos, left_n)
                + right_n as f64 * gini(right_pos, right_n))
                / n as f64;
            if best.map_or(true, |(_, _, score)| weighted < score - 1e-12) {
                best = Some((feature, threshold, weighted));
            }
        }
    }

    let Some((feature, threshold, weighted)) = best else {
        return Node::Leaf {
            proba,
            n_samples: n,
            impurity,
        };
    };
    // A split that does not improve impurity is not worth the depth.
    if weighted >= impurity - 1e-12 {
        return Node::Leaf {
            proba,
            n_samples: n,
            impurity,
        };
    }

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| rows[i][feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        n_samples: n,
        impurity,
        left: Box::new(build_node(
            rows, labels, &left_idx, depth + 1, params, n_features, rng,
        )),
        right: Box::new(build_node(
            rows, labels, &right_idx, depth + 1, params, n_features, rng,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn separable_data() -> (Vec<Vec<f64>>, Vec<u8>) {
        let rows = vec![
            vec![1.0, 5.0],
            vec![2.0, 4.0],
            vec![1.5, 6.0],
            vec![8.0, 1.0],
            vec![9.0, 2.0],
            vec![8.5, 0.5],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        (rows, labels)
    }

    fn default_params() -> TreeParams {
        TreeParams {
            max_depth: Some(10),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 2,
        }
    }

    #[test]
    fn test_learns_separable_data() {
        let (rows, labels) = separable_data();
        let indices: Vec<usize> = (0..rows.len()).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let tree = DecisionTree::fit(&rows, &labels, &indices, &default_params(), &mut rng);

        assert!(tree.predict_proba(&[1.2, 5.5]) < 0.5);
        assert!(tree.predict_proba(&[8.8, 1.0]) > 0.5);
    }

    #[test]
    fn test_pure_node_becomes_leaf() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0]];
        let labels = vec![1, 1, 1];
        let indices = vec![0, 1, 2];
        let mut rng = StdRng::seed_from_u64(7);
        let tree = DecisionTree::fit(&rows, &labels, &indices, &default_params(), &mut rng);

        assert!(matches!(tree.root, Node::Leaf { proba, .. } if proba == 1.0));
    }

    #[test]
    fn test_identical_seed_identical_tree() {
        let (rows, labels) = separable_data();
        let indices: Vec<usize> = (0..rows.len()).collect();
        let params = default_params();

        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let tree_a = DecisionTree::fit(&rows, &labels, &indices, &params, &mut rng_a);
        let tree_b = DecisionTree::fit(&rows, &labels, &indices, &params, &mut rng_b);

        let json_a = serde_json::to_string(&tree_a).unwrap();
        let json_b = serde_json::to_string(&tree_b).unwrap();
        assert_eq!(json_a, json_b);
    }

    #[test]
    fn test_importances_favor_informative_feature() {
        // Feature 0 separates the classes; feature 1 is constant noise.
        let rows = vec![
            vec![1.0, 3.0],
            vec![2.0, 3.0],
            vec![8.0, 3.0],
            vec![9.0, 3.0],
        ];
        let labels = vec![0, 0, 1, 1];
        let indices = vec![0, 1, 2, 3];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&rows, &labels, &indices, &default_params(), &mut rng);

        let mut importances = vec![0.0; 2];
        tree.accumulate_importances(&mut importances);
        assert!(importances[0] > 0.0);
        assert_eq!(importances[1], 0.0);
    }
}
