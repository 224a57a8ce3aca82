//! The classifier capability and its committee members.
//!
//! Committee composition is configuration, not inheritance: anything that
//! can `fit` on a labeled matrix and emit class-1 probabilities can sit in
//! the ensemble. All members are deterministic under a fixed seed and every
//! iterative learner carries a hard iteration cap, so a run always
//! terminates.

mod boost;
mod forest;
mod knn;
mod margin;
mod mlp;

pub use boost::GradientBoost;
pub use forest::RandomForest;
pub use knn::KnnClassifier;
pub use margin::MarginClassifier;
pub use mlp::MlpClassifier;

use ndarray::{Array1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single committee member. The ensemble catches these and
/// substitutes neutral scores; they never abort a run.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("invalid hyperparameter: {0}")]
    InvalidParam(&'static str),
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("training labels contain a single class")]
    SingleClass,
    #[error("model has not been fitted")]
    NotFitted,
}

/// A binary classifier usable as a committee member.
pub trait Classifier: Send {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize]) -> Result<(), FitError>;

    /// Class-1 probability per row.
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, FitError>;

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<usize>, FitError> {
        Ok(self
            .predict_proba(x)?
            .iter()
            .map(|&p| usize::from(p >= 0.5))
            .collect())
    }
}

/// Evaluation metrics of one committee member.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ModelMetrics {
    /// The stand-in reported for a member whose fit or predict failed.
    pub fn neutral() -> Self {
        Self::uniform(0.5)
    }

    /// All four metrics set to the same value, as the heuristic-only paths do.
    pub fn uniform(value: f64) -> Self {
        Self {
            accuracy: value,
            precision: value,
            recall: value,
            f1: value,
        }
    }
}

/// Computes accuracy plus support-weighted precision/recall/F1.
///
/// Safe by construction: when either the true or the predicted label set is
/// single-class, precision/recall/F1 are ill-defined, so accuracy is
/// reported for all four instead. Zero-denominator per-class ratios count
/// as 0.
pub fn evaluate(y_true: &[usize], y_pred: &[usize]) -> ModelMetrics {
    assert_eq!(y_true.len(), y_pred.len());
    let n = y_true.len();
    if n == 0 {
        return ModelMetrics::neutral();
    }

    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    let accuracy = correct as f64 / n as f64;

    let single_truth = y_true.iter().all(|&l| l == y_true[0]);
    let single_pred = y_pred.iter().all(|&l| l == y_pred[0]);
    if single_truth || single_pred {
        return ModelMetrics::uniform(accuracy);
    }

    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;
    for class in [0usize, 1] {
        let tp = y_true
            .iter()
            .zip(y_pred)
            .filter(|&(&t, &p)| t == class && p == class)
            .count() as f64;
        let fp = y_true
            .iter()
            .zip(y_pred)
            .filter(|&(&t, &p)| t != class && p == class)
            .count() as f64;
        let fne = y_true
            .iter()
            .zip(y_pred)
            .filter(|&(&t, &p)| t == class && p != class)
            .count() as f64;
        let support = y_true.iter().filter(|&&t| t == class).count() as f64;

        let p = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let r = if tp + fne > 0.0 { tp / (tp + fne) } else { 0.0 };
        let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };

        let weight = support / n as f64;
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }

    ModelMetrics {
        accuracy,
        precision,
        recall,
        f1,
    }
}

/// Train/test index split. Stratifies by label when every class has at least
/// two members; otherwise falls back to a plain shuffled split. Both halves
/// are always non-empty.
pub fn train_test_split(
    y: &[usize],
    test_fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let n = y.len();
    debug_assert!(n >= 2, "split needs at least two samples");
    let mut rng = StdRng::seed_from_u64(seed);

    let count0 = y.iter().filter(|&&l| l == 0).count();
    let count1 = n - count0;

    if count0 >= 2 && count1 >= 2 {
        let mut train = Vec::new();
        let mut test = Vec::new();
        for class in [0usize, 1] {
            let mut members: Vec<usize> = (0..n).filter(|&i| y[i] == class).collect();
            members.shuffle(&mut rng);
            let take = ((members.len() as f64 * test_fraction).round() as usize)
                .clamp(1, members.len() - 1);
            test.extend_from_slice(&members[..take]);
            train.extend_from_slice(&members[take..]);
        }
        train.sort_unstable();
        test.sort_unstable();
        (train, test)
    } else {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);
        let take = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);
        let (test, train) = indices.split_at(take);
        let mut train = train.to_vec();
        let mut test = test.to_vec();
        train.sort_unstable();
        test.sort_unstable();
        (train, test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_perfect_predictions() {
        let m = evaluate(&[0, 1, 0, 1], &[0, 1, 0, 1]);
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1, 1.0);
    }

    #[test]
    fn test_evaluate_single_class_truth_uses_accuracy_proxy() {
        let m = evaluate(&[1, 1, 1], &[1, 0, 1]);
        let expected = 2.0 / 3.0;
        assert!((m.accuracy - expected).abs() < 1e-12);
        assert_eq!(m.precision, m.accuracy);
        assert_eq!(m.recall, m.accuracy);
        assert_eq!(m.f1, m.accuracy);
    }

    #[test]
    fn test_evaluate_single_class_prediction_uses_accuracy_proxy() {
        let m = evaluate(&[0, 1, 0, 1], &[1, 1, 1, 1]);
        assert_eq!(m.precision, 0.5);
        assert_eq!(m.f1, 0.5);
    }

    #[test]
    fn test_evaluate_weighted_metrics() {
        // truth: three 0s, one 1; prediction flips one 0.
        let m = evaluate(&[0, 0, 0, 1], &[0, 0, 1, 1]);
        assert!((m.accuracy - 0.75).abs() < 1e-12);
        // class 0: p=1, r=2/3; class 1: p=0.5, r=1
        let precision = 0.75 * 1.0 + 0.25 * 0.5;
        let recall = 0.75 * (2.0 / 3.0) + 0.25 * 1.0;
        assert!((m.precision - precision).abs() < 1e-12);
        assert!((m.recall - recall).abs() < 1e-12);
    }

    #[test]
    fn test_split_is_deterministic_and_disjoint() {
        let y = vec![0, 0, 0, 1, 1, 1, 0, 1];
        let (train_a, test_a) = train_test_split(&y, 0.2, 42);
        let (train_b, test_b) = train_test_split(&y, 0.2, 42);
        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        for i in &test_a {
            assert!(!train_a.contains(i));
        }
        assert_eq!(train_a.len() + test_a.len(), y.len());
    }

    #[test]
    fn test_stratified_split_keeps_both_classes_in_train() {
        let y = vec![0, 0, 1, 1, 0, 1, 0, 1, 0, 1];
        let (train, test) = train_test_split(&y, 0.2, 7);
        assert!(train.iter().any(|&i| y[i] == 0));
        assert!(train.iter().any(|&i| y[i] == 1));
        assert!(!test.is_empty());
    }

    #[test]
    fn test_unstratified_fallback_when_class_too_small() {
        // one positive only → stratification impossible
        let y = vec![0, 0, 0, 1];
        let (train, test) = train_test_split(&y, 0.25, 3);
        assert!(!train.is_empty());
        assert!(!test.is_empty());
        assert_eq!(train.len() + test.len(), 4);
    }
}
