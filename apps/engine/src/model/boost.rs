//! Gradient-boosted shallow regression trees on the logistic loss.
//!
//! Each round fits a variance-reducing regression tree to the current
//! pseudo-residuals (y − σ(F)) and adds it to the additive model with a
//! fixed learning rate. Round count and tree depth are hard caps.

use ndarray::{Array1, ArrayView1, ArrayView2};

use super::{Classifier, FitError};

#[derive(Debug, Clone)]
pub struct GradientBoost {
    n_rounds: usize,
    learning_rate: f64,
    max_depth: usize,
    min_samples_leaf: usize,
    base_score: f64,
    trees: Vec<RegTree>,
    fitted: bool,
}

impl GradientBoost {
    pub fn new(n_rounds: usize, learning_rate: f64, max_depth: usize) -> Self {
        Self {
            n_rounds,
            learning_rate,
            max_depth,
            min_samples_leaf: 1,
            base_score: 0.0,
            trees: Vec::new(),
            fitted: false,
        }
    }
}

impl Classifier for GradientBoost {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize]) -> Result<(), FitError> {
        if self.n_rounds == 0 {
            return Err(FitError::InvalidParam("n_rounds"));
        }
        if self.learning_rate <= 0.0 {
            return Err(FitError::InvalidParam("learning_rate"));
        }
        let n = x.nrows();
        if n == 0 {
            return Err(FitError::EmptyTrainingSet);
        }

        // Start from the pool's log-odds.
        let positives = y.iter().filter(|&&l| l == 1).count() as f64;
        let p = (positives / n as f64).clamp(1e-6, 1.0 - 1e-6);
        self.base_score = (p / (1.0 - p)).ln();

        let mut scores = vec![self.base_score; n];
        self.trees = Vec::with_capacity(self.n_rounds);

        for _ in 0..self.n_rounds {
            let residuals: Vec<f64> = scores
                .iter()
                .zip(y)
                .map(|(&f, &label)| label as f64 - sigmoid(f))
                .collect();

            let indices: Vec<usize> = (0..n).collect();
            let tree = RegTree::grow(x, &residuals, &indices, self.max_depth, self.min_samples_leaf);

            for (i, score) in scores.iter_mut().enumerate() {
                *score += self.learning_rate * tree.predict_row(x.row(i));
            }
            self.trees.push(tree);
        }
        self.fitted = true;
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, FitError> {
        if !self.fitted {
            return Err(FitError::NotFitted);
        }
        let probs = x
            .rows()
            .into_iter()
            .map(|row| {
                let f = self.base_score
                    + self.learning_rate
                        * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>();
                sigmoid(f)
            })
            .collect();
        Ok(Array1::from_vec(probs))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// A depth-capped regression tree splitting on squared-error reduction.
#[derive(Debug, Clone)]
struct RegTree {
    nodes: Vec<RegNode>,
}

#[derive(Debug, Clone)]
enum RegNode {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

impl RegTree {
    fn grow(
        x: ArrayView2<'_, f64>,
        targets: &[f64],
        indices: &[usize],
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(x, targets, indices, 0, max_depth, min_samples_leaf);
        tree
    }

    fn grow_node(
        &mut self,
        x: ArrayView2<'_, f64>,
        targets: &[f64],
        indices: &[usize],
        depth: usize,
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> usize {
        let mean = indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64;

        if depth >= max_depth || indices.len() < 2 * min_samples_leaf.max(1) {
            self.nodes.push(RegNode::Leaf(mean));
            return self.nodes.len() - 1;
        }

        let Some((feature, threshold)) = best_split(x, targets, indices, min_samples_leaf) else {
            self.nodes.push(RegNode::Leaf(mean));
            return self.nodes.len() - 1;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| x[[i, feature]] <= threshold);

        self.nodes.push(RegNode::Leaf(mean));
        let slot = self.nodes.len() - 1;
        let left = self.grow_node(x, targets, &left_idx, depth + 1, max_depth, min_samples_leaf);
        let right = self.grow_node(x, targets, &right_idx, depth + 1, max_depth, min_samples_leaf);
        self.nodes[slot] = RegNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        slot
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut at = 0usize;
        loop {
            match self.nodes[at] {
                RegNode::Leaf(value) => return value,
                RegNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    at = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// Best split by squared-error reduction; `None` when no column separates
/// the node.
fn best_split(
    x: ArrayView2<'_, f64>,
    targets: &[f64],
    indices: &[usize],
    min_samples_leaf: usize,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64, f64)> = None;

    for c in 0..x.ncols() {
        let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, c]], targets[i])).collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let total = pairs.len();
        let total_sum: f64 = pairs.iter().map(|&(_, t)| t).sum();
        let mut left_sum = 0.0;

        for split_at in 1..total {
            left_sum += pairs[split_at - 1].1;
            if pairs[split_at].0 == pairs[split_at - 1].0 {
                continue;
            }
            let left_n = split_at;
            let right_n = total - split_at;
            if left_n < min_samples_leaf || right_n < min_samples_leaf {
                continue;
            }

            // Maximizing between-group variance == minimizing SSE.
            let right_sum = total_sum - left_sum;
            let gain = left_sum.powi(2) / left_n as f64 + right_sum.powi(2) / right_n as f64
                - total_sum.powi(2) / total as f64;
            let threshold = (pairs[split_at - 1].0 + pairs[split_at].0) / 2.0;

            if best.map_or(true, |(_, _, current)| gain > current) && gain > 1e-12 {
                best = Some((c, threshold, gain));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}
