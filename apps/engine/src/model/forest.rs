//! Bagged tree ensemble: CART-style trees with gini splits, bootstrap
//! sampling, and per-split feature subsampling.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;

use super::{Classifier, FitError};

#[derive(Debug, Clone)]
pub struct RandomForest {
    n_trees: usize,
    max_depth: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
    seed: u64,
    trees: Vec<Tree>,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
enum Node {
    /// Class-1 fraction of the training rows that reached this leaf.
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

impl RandomForest {
    pub fn new(
        n_trees: usize,
        max_depth: usize,
        min_samples_split: usize,
        min_samples_leaf: usize,
        seed: u64,
    ) -> Self {
        Self {
            n_trees,
            max_depth,
            min_samples_split,
            min_samples_leaf,
            seed,
            trees: Vec::new(),
        }
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize]) -> Result<(), FitError> {
        if self.n_trees == 0 {
            return Err(FitError::InvalidParam("n_trees"));
        }
        if self.min_samples_leaf == 0 {
            return Err(FitError::InvalidParam("min_samples_leaf"));
        }
        let n = x.nrows();
        if n == 0 {
            return Err(FitError::EmptyTrainingSet);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        // √d features per split, the usual bagging default.
        let m_features = (x.ncols() as f64).sqrt().ceil() as usize;

        self.trees = (0..self.n_trees)
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                let mut tree = Tree { nodes: Vec::new() };
                self.build_node(&mut tree, x, y, &sample, 0, m_features, &mut rng);
                tree
            })
            .collect();
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, FitError> {
        if self.trees.is_empty() {
            return Err(FitError::NotFitted);
        }
        let probs = x
            .rows()
            .into_iter()
            .map(|row| {
                let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
                sum / self.trees.len() as f64
            })
            .collect();
        Ok(Array1::from_vec(probs))
    }
}

impl RandomForest {
    /// Grows one node and its subtree; returns the node's arena index.
    fn build_node(
        &self,
        tree: &mut Tree,
        x: ArrayView2<'_, f64>,
        y: &[usize],
        indices: &[usize],
        depth: usize,
        m_features: usize,
        rng: &mut StdRng,
    ) -> usize {
        let positives = indices.iter().filter(|&&i| y[i] == 1).count();
        let p1 = positives as f64 / indices.len() as f64;

        let pure = positives == 0 || positives == indices.len();
        if pure || depth >= self.max_depth || indices.len() < self.min_samples_split {
            tree.nodes.push(Node::Leaf(p1));
            return tree.nodes.len() - 1;
        }

        let mut columns: Vec<usize> = (0..x.ncols()).collect();
        columns.shuffle(rng);
        columns.truncate(m_features.max(1));

        let Some((feature, threshold)) = self.best_split(x, y, indices, &columns) else {
            tree.nodes.push(Node::Leaf(p1));
            return tree.nodes.len() - 1;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| x[[i, feature]] <= threshold);

        // Reserve a slot so children can link back to a stable index.
        tree.nodes.push(Node::Leaf(p1));
        let slot = tree.nodes.len() - 1;
        let left = self.build_node(tree, x, y, &left_idx, depth + 1, m_features, rng);
        let right = self.build_node(tree, x, y, &right_idx, depth + 1, m_features, rng);
        tree.nodes[slot] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        slot
    }

    /// Best (feature, threshold) by gini impurity decrease over the sampled
    /// columns, honoring `min_samples_leaf` on both sides.
    fn best_split(
        &self,
        x: ArrayView2<'_, f64>,
        y: &[usize],
        indices: &[usize],
        columns: &[usize],
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64, f64)> = None;

        for &c in columns {
            let mut pairs: Vec<(f64, usize)> =
                indices.iter().map(|&i| (x[[i, c]], y[i])).collect();
            pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let total = pairs.len();
            let total_pos: usize = pairs.iter().map(|&(_, l)| l).sum();
            let mut left_pos = 0usize;

            for split_at in 1..total {
                left_pos += pairs[split_at - 1].1;
                if pairs[split_at].0 == pairs[split_at - 1].0 {
                    continue;
                }
                let left_n = split_at;
                let right_n = total - split_at;
                if left_n < self.min_samples_leaf || right_n < self.min_samples_leaf {
                    continue;
                }

                let right_pos = total_pos - left_pos;
                let impurity = left_n as f64 * gini(left_pos, left_n)
                    + right_n as f64 * gini(right_pos, right_n);
                let threshold = (pairs[split_at - 1].0 + pairs[split_at].0) / 2.0;

                if best.map_or(true, |(_, _, current)| impurity < current) {
                    best = Some((c, threshold, impurity));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

fn gini(positives: usize, total: usize) -> f64 {
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

impl Tree {
    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut at = 0usize;
        loop {
            match self.nodes[at] {
                Node::Leaf(p1) => return p1,
                Node::Split {
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

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (ndarray::Array2<f64>, Vec<usize>) {
        let x = array![
            [0.0, 1.0],
            [0.1, 0.8],
            [0.2, 1.1],
            [0.9, 0.2],
            [1.0, 0.1],
            [1.1, 0.0],
        ];
        (x, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn test_forest_learns_separable_data() {
        let (x, y) = separable();
        let mut forest = RandomForest::new(50, 5, 2, 1, 42);
        forest.fit(x.view(), &y).unwrap();
        let probs = forest.predict_proba(x.view()).unwrap();
        assert!(probs[0] < 0.5, "negative sample scored {}", probs[0]);
        assert!(probs[5] > 0.5, "positive sample scored {}", probs[5]);
    }

    #[test]
    fn test_forest_is_deterministic_under_seed() {
        let (x, y) = separable();
        let mut a = RandomForest::new(20, 4, 2, 1, 7);
        let mut b = RandomForest::new(20, 4, 2, 1, 7);
        a.fit(x.view(), &y).unwrap();
        b.fit(x.view(), &y).unwrap();
        assert_eq!(
            a.predict_proba(x.view()).unwrap(),
            b.predict_proba(x.view()).unwrap()
        );
    }

    #[test]
    fn test_forest_rejects_zero_trees() {
        let (x, y) = separable();
        let mut forest = RandomForest::new(0, 4, 2, 1, 1);
        assert!(matches!(
            forest.fit(x.view(), &y),
            Err(FitError::InvalidParam("n_trees"))
        ));
    }

    #[test]
    fn test_forest_unfitted_predict_fails() {
        let (x, _) = separable();
        let forest = RandomForest::new(10, 4, 2, 1, 1);
        assert!(matches!(
            forest.predict_proba(x.view()),
            Err(FitError::NotFitted)
        ));
    }

    #[test]
    fn test_forest_single_class_predicts_that_class() {
        let (x, _) = separable();
        let y = vec![1; 6];
        let mut forest = RandomForest::new(10, 4, 2, 1, 1);
        forest.fit(x.view(), &y).unwrap();
        let probs = forest.predict_proba(x.view()).unwrap();
        assert!(probs.iter().all(|&p| p == 1.0));
    }
}
