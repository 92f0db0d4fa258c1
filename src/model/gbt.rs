//! Gradient-boosted regression trees
//!
//! Squared-error boosting with second-order (Newton) leaf weights and L2
//! regularization on leaf values. For squared error every hessian is 1, so
//! a node's hessian sum is just its sample count.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::{BodyError, Result};

/// Boosting hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GbtParams {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to each tree
    pub learning_rate: f64,
    /// Maximum depth of each tree (root has depth 0)
    pub max_depth: usize,
    /// L2 penalty on leaf weights
    pub lambda: f64,
    /// Minimum hessian sum (samples) in a child
    pub min_child_weight: f64,
}

impl Default for GbtParams {
    fn default() -> Self {
        GbtParams {
            n_estimators: 200,
            learning_rate: 0.05,
            max_depth: 4,
            lambda: 1.0,
            min_child_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single regression tree stored as a node arena; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Grow a tree on residuals `r = y - prediction` (negative gradients)
    fn fit(x: &Array2<f64>, residuals: &[f64], params: &GbtParams) -> Self {
        let mut tree = RegressionTree { nodes: Vec::new() };
        let indices: Vec<usize> = (0..x.nrows()).collect();
        tree.grow(x, residuals, indices, 0, params);
        tree
    }

    fn leaf_value(sum: f64, count: f64, lambda: f64) -> f64 {
        sum / (count + lambda)
    }

    fn score(sum: f64, count: f64, lambda: f64) -> f64 {
        sum * sum / (count + lambda)
    }

    fn grow(
        &mut self,
        x: &Array2<f64>,
        residuals: &[f64],
        indices: Vec<usize>,
        depth: usize,
        params: &GbtParams,
    ) -> usize {
        let id = self.nodes.len();
        let sum: f64 = indices.iter().map(|&i| residuals[i]).sum();
        let count = indices.len() as f64;
        self.nodes.push(Node::Leaf {
            value: Self::leaf_value(sum, count, params.lambda),
        });

        if depth >= params.max_depth || indices.len() < 2 {
            return id;
        }

        let Some(best) = Self::best_split(x, residuals, &indices, sum, params) else {
            return id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, best.feature]] < best.threshold);

        let left = self.grow(x, residuals, left_idx, depth + 1, params);
        let right = self.grow(x, residuals, right_idx, depth + 1, params);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    /// Exact greedy search over every feature and every distinct value boundary
    fn best_split(
        x: &Array2<f64>,
        residuals: &[f64],
        indices: &[usize],
        total: f64,
        params: &GbtParams,
    ) -> Option<BestSplit> {
        let count = indices.len() as f64;
        let parent_score = Self::score(total, count, params.lambda);
        let mut best: Option<BestSplit> = None;
        let mut sorted = indices.to_vec();

        for feature in 0..x.ncols() {
            sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let mut left_sum = 0.0;
            for pos in 0..sorted.len() - 1 {
                left_sum += residuals[sorted[pos]];
                let here = x[[sorted[pos], feature]];
                let next = x[[sorted[pos + 1], feature]];
                if here == next {
                    continue;
                }

                let left_count = (pos + 1) as f64;
                let right_count = count - left_count;
                if left_count < params.min_child_weight || right_count < params.min_child_weight {
                    continue;
                }

                let gain = Self::score(left_sum, left_count, params.lambda)
                    + Self::score(total - left_sum, right_count, params.lambda)
                    - parent_score;

                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (here + next) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] < *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Depth of the deepest leaf
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// A boosted ensemble for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    pub params: GbtParams,
    pub base_score: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    pub fn fit(x: &Array2<f64>, y: &Array1<f64>, params: GbtParams) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(BodyError::EmptyDataset("boosting with no rows".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(BodyError::Model(format!(
                "dimension mismatch: {} rows, {} targets",
                x.nrows(),
                y.len()
            )));
        }

        let base_score = y.mean().unwrap_or(0.0);
        let mut predictions = vec![base_score; y.len()];
        let mut residuals = vec![0.0; y.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            for (r, (t, p)) in residuals.iter_mut().zip(y.iter().zip(predictions.iter())) {
                *r = t - p;
            }

            let tree = RegressionTree::fit(x, &residuals, &params);
            for (i, p) in predictions.iter_mut().enumerate() {
                *p += params.learning_rate * tree.predict_row(x.row(i));
            }
            trees.push(tree);

            if log::log_enabled!(log::Level::Debug) && (round + 1) % 50 == 0 {
                let mse = residuals.iter().map(|r| r * r).sum::<f64>() / y.len() as f64;
                log::debug!("  round {}: train mse {:.4}", round + 1, mse);
            }
        }

        Ok(GradientBoostedTrees {
            params,
            base_score,
            trees,
        })
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.base_score
            + self.params.learning_rate
                * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}
