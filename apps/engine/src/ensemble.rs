//! The scoring committee: a weighted set of classifiers trained per run.
//!
//! The committee is data, not a type hierarchy — each member is a named
//! `(classifier, weight)` pair. A member that fails to fit or predict is
//! neutralized (0.5 probabilities, 0.5 metrics) rather than aborting the
//! run, and a refit failure downgrades the whole run to the heuristic
//! fallback by leaving `trained` false.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};
use tracing::{debug, info, warn};

use crate::model::{
    evaluate, train_test_split, Classifier, GradientBoost, KnnClassifier, MarginClassifier,
    MlpClassifier, ModelMetrics, RandomForest,
};
use crate::pipeline::{KBestSelector, Pca};

/// Univariate selection keeps this many columns (advanced profile).
const SELECT_K: usize = 10;
/// PCA target dimensionality (advanced profile).
const PCA_COMPONENTS: usize = 8;

pub struct Member {
    pub name: String,
    pub weight: f64,
    pub classifier: Box<dyn Classifier>,
}

impl Member {
    pub fn new(name: &str, weight: f64, classifier: Box<dyn Classifier>) -> Self {
        Self {
            name: name.to_string(),
            weight,
            classifier,
        }
    }
}

/// Per-member class-1 probabilities over the scored pool.
pub struct MemberScores {
    pub name: String,
    pub weight: f64,
    pub probs: Array1<f64>,
}

pub struct EnsembleScorer {
    members: Vec<Member>,
    use_reduction: bool,
    selector: Option<KBestSelector>,
    reducer: Option<Pca>,
    trained: bool,
    seed: u64,
}

impl EnsembleScorer {
    pub fn new(members: Vec<Member>, use_reduction: bool, seed: u64) -> Self {
        Self {
            members,
            use_reduction,
            selector: None,
            reducer: None,
            trained: false,
            seed,
        }
    }

    pub fn trained(&self) -> bool {
        self.trained
    }

    pub fn weights(&self) -> BTreeMap<String, f64> {
        self.members
            .iter()
            .map(|m| (m.name.clone(), m.weight))
            .collect()
    }

    /// Trains and evaluates every member on a pool of at least two
    /// candidates, then refits on the full pool so scoring uses all data.
    ///
    /// Pools of 2–3 train and evaluate on the full pool; larger pools get a
    /// held-out test slice whose fraction shrinks from 0.2 towards 0.1 as
    /// the pool grows. Model weights stay fixed: re-weighting members by
    /// their evaluation metrics is deliberately not done.
    pub fn train(&mut self, x: &Array2<f64>, y: &[usize]) -> BTreeMap<String, ModelMetrics> {
        let n = x.nrows();
        debug_assert!(n >= 2, "ensemble training needs at least two candidates");

        let test_fraction = (1.0 / n as f64).clamp(0.1, 0.2);
        let (train_idx, test_idx) = if n >= 4 {
            train_test_split(y, test_fraction, self.seed)
        } else {
            ((0..n).collect(), (0..n).collect())
        };

        let x_train = x.select(Axis(0), &train_idx);
        let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
        let y_test: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();

        if self.use_reduction {
            self.fit_reduction(&x_train, &y_train);
        }
        let xt_train = self.reduce(&x_train);
        let xt_test = self.reduce(&x.select(Axis(0), &test_idx));

        let mut metrics = BTreeMap::new();
        for member in &mut self.members {
            let m = match member.classifier.fit(xt_train.view(), &y_train) {
                Ok(()) => match member.classifier.predict(xt_test.view()) {
                    Ok(pred) => evaluate(&y_test, &pred),
                    Err(e) => {
                        warn!(model = %member.name, error = %e, "evaluation predict failed");
                        ModelMetrics::neutral()
                    }
                },
                Err(e) => {
                    warn!(model = %member.name, error = %e, "training failed");
                    ModelMetrics::neutral()
                }
            };
            metrics.insert(member.name.clone(), m);
        }

        info!(
            weights = ?self.weights(),
            "committee evaluated; combination weights are fixed"
        );

        // Refit on the whole pool so scoring sees all available data. Any
        // failure here leaves the run on the heuristic path.
        let xt_full = self.reduce(x);
        let mut all_refitted = true;
        for member in &mut self.members {
            if let Err(e) = member.classifier.fit(xt_full.view(), y) {
                warn!(model = %member.name, error = %e, "full-pool refit failed");
                all_refitted = false;
            }
        }
        self.trained = all_refitted;

        metrics
    }

    /// Scores the pool with every member. A member that cannot predict
    /// contributes a flat 0.5.
    pub fn score(&self, x: &Array2<f64>) -> Vec<MemberScores> {
        let xt = self.reduce(x);
        self.members
            .iter()
            .map(|member| {
                let probs = match member.classifier.predict_proba(xt.view()) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(model = %member.name, error = %e, "scoring failed, using neutral probabilities");
                        Array1::from_elem(x.nrows(), 0.5)
                    }
                };
                MemberScores {
                    name: member.name.clone(),
                    weight: member.weight,
                    probs,
                }
            })
            .collect()
    }

    fn fit_reduction(&mut self, x_train: &Array2<f64>, y_train: &[usize]) {
        self.selector = match KBestSelector::fit(x_train.view(), y_train, SELECT_K) {
            Ok(s) => Some(s),
            Err(e) => {
                debug!(error = %e, "feature selection skipped");
                None
            }
        };
        let selected = match &self.selector {
            Some(s) => s.transform(x_train),
            None => x_train.clone(),
        };
        self.reducer = match Pca::fit(selected.view(), PCA_COMPONENTS) {
            Ok(p) => Some(p),
            Err(e) => {
                debug!(error = %e, "dimensionality reduction skipped");
                None
            }
        };
    }

    fn reduce(&self, x: &Array2<f64>) -> Array2<f64> {
        let selected = match &self.selector {
            Some(s) => s.transform(x),
            None => x.clone(),
        };
        match &self.reducer {
            Some(p) => p.transform(&selected),
            None => selected,
        }
    }
}

/// Basic committee: tree ensemble, distance-weighted KNN, and a small MLP
/// with near-equal weights.
pub fn basic_committee(seed: u64) -> Vec<Member> {
    vec![
        Member::new(
            "random_forest",
            0.33,
            Box::new(RandomForest::new(200, 10, 5, 2, seed.wrapping_add(1))),
        ),
        Member::new("knn", 0.33, Box::new(KnnClassifier::new(5))),
        Member::new(
            "neural_net",
            0.34,
            Box::new(MlpClassifier::new(vec![64, 32, 16], 500, seed.wrapping_add(2))),
        ),
    ]
}

/// Advanced committee: forest, gradient boosting, margin classifier, and a
/// larger MLP combined by weighted soft vote.
pub fn advanced_committee(seed: u64) -> Vec<Member> {
    vec![
        Member::new(
            "random_forest",
            0.30,
            Box::new(RandomForest::new(200, 12, 4, 2, seed.wrapping_add(1))),
        ),
        Member::new(
            "gradient_boost",
            0.25,
            Box::new(GradientBoost::new(150, 0.1, 8)),
        ),
        Member::new(
            "margin",
            0.20,
            Box::new(MarginClassifier::new(0.01, 2000, seed.wrapping_add(3))),
        ),
        Member::new(
            "neural_net",
            0.25,
            Box::new(MlpClassifier::new(vec![128, 64, 32], 1000, seed.wrapping_add(2))),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn make_pool(n: usize) -> (Array2<f64>, Vec<usize>) {
        // Two clusters along every feature.
        let x = Array2::from_shape_fn((n, 4), |(i, j)| {
            let base = if i < n / 2 { 0.0 } else { 1.0 };
            base + 0.01 * (i as f64) + 0.001 * (j as f64)
        });
        let y = (0..n).map(|i| usize::from(i >= n / 2)).collect();
        (x, y)
    }

    #[test]
    fn test_train_reports_metrics_for_every_member() {
        let (x, y) = make_pool(10);
        let mut scorer = EnsembleScorer::new(basic_committee(42), false, 42);
        let metrics = scorer.train(&x, &y);
        assert_eq!(metrics.len(), 3);
        assert!(metrics.contains_key("random_forest"));
        assert!(metrics.contains_key("knn"));
        assert!(metrics.contains_key("neural_net"));
        assert!(scorer.trained());
    }

    #[test]
    fn test_tiny_pool_trains_on_full_pool() {
        let (x, y) = make_pool(2);
        let mut scorer = EnsembleScorer::new(basic_committee(1), false, 1);
        scorer.train(&x, &y);
        assert!(scorer.trained());
        let scores = scorer.score(&x);
        assert_eq!(scores.len(), 3);
        for s in &scores {
            assert_eq!(s.probs.len(), 2);
            assert!(s.probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_failing_member_is_neutralized() {
        let (x, y) = make_pool(4);
        // max_iter = 0 makes the margin classifier unfittable.
        let members = vec![
            Member::new("knn", 0.5, Box::new(KnnClassifier::new(3))),
            Member::new("margin", 0.5, Box::new(MarginClassifier::new(0.01, 0, 1))),
        ];
        let mut scorer = EnsembleScorer::new(members, false, 5);
        let metrics = scorer.train(&x, &y);
        assert_eq!(metrics["margin"], ModelMetrics::neutral());
        // the refit also fails, so the run drops to the fallback path
        assert!(!scorer.trained());
        let scores = scorer.score(&x);
        let margin = scores.iter().find(|s| s.name == "margin").unwrap();
        assert!(margin.probs.iter().all(|&p| p == 0.5));
    }

    #[test]
    fn test_reduction_failure_passes_matrix_through() {
        // Single-class labels make selection unfittable; PCA still fits.
        let x = Array2::from_shape_fn((4, 6), |(i, j)| (i * j) as f64);
        let y = vec![1, 1, 1, 1];
        let mut scorer = EnsembleScorer::new(
            vec![Member::new("knn", 1.0, Box::new(KnnClassifier::new(2)))],
            true,
            9,
        );
        scorer.train(&x, &y);
        // scoring still produces one probability per row
        let scores = scorer.score(&x);
        assert_eq!(scores[0].probs.len(), 4);
    }

    #[test]
    fn test_committee_weights_sum_to_one() {
        for committee in [basic_committee(0), advanced_committee(0)] {
            let total: f64 = committee.iter().map(|m| m.weight).sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
    }
}
