//! Distance-weighted k-nearest-neighbor classifier (euclidean metric).

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use super::{Classifier, FitError};

#[derive(Debug, Clone)]
pub struct KnnClassifier {
    k: usize,
    x_train: Option<Array2<f64>>,
    y_train: Vec<usize>,
}

impl KnnClassifier {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            x_train: None,
            y_train: Vec::new(),
        }
    }
}

impl Classifier for KnnClassifier {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize]) -> Result<(), FitError> {
        if self.k == 0 {
            return Err(FitError::InvalidParam("k"));
        }
        if x.nrows() == 0 {
            return Err(FitError::EmptyTrainingSet);
        }
        self.x_train = Some(x.to_owned());
        self.y_train = y.to_vec();
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, FitError> {
        let x_train = self.x_train.as_ref().ok_or(FitError::NotFitted)?;
        // k shrinks to the pool when the training set is small.
        let k = self.k.min(x_train.nrows());

        let probs = x
            .rows()
            .into_iter()
            .map(|row| self.prob_one(x_train, row, k))
            .collect();
        Ok(Array1::from_vec(probs))
    }
}

impl KnnClassifier {
    fn prob_one(&self, x_train: &Array2<f64>, row: ArrayView1<'_, f64>, k: usize) -> f64 {
        let mut distances: Vec<(f64, usize)> = x_train
            .rows()
            .into_iter()
            .zip(&self.y_train)
            .map(|(train_row, &label)| {
                let d = row
                    .iter()
                    .zip(train_row.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt();
                (d, label)
            })
            .collect();
        distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        distances.truncate(k);

        // An exact hit dominates: average the labels at distance zero.
        let exact: Vec<usize> = distances
            .iter()
            .filter(|(d, _)| *d == 0.0)
            .map(|&(_, l)| l)
            .collect();
        if !exact.is_empty() {
            return exact.iter().sum::<usize>() as f64 / exact.len() as f64;
        }

        let mut weight_sum = 0.0;
        let mut positive_weight = 0.0;
        for (d, label) in distances {
            let w = 1.0 / d;
            weight_sum += w;
            if label == 1 {
                positive_weight += w;
            }
        }
        if weight_sum == 0.0 {
            0.5
        } else {
            positive_weight / weight_sum
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_knn_classifies_near_neighbors() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [5.0, 5.0], [5.0, 6.0]];
        let y = vec![0, 0, 1, 1];
        let mut knn = KnnClassifier::new(2);
        knn.fit(x.view(), &y).unwrap();
        let queries = array![[0.2, 0.3], [5.2, 5.4]];
        let probs = knn.predict_proba(queries.view()).unwrap();
        assert!(probs[0] < 0.5);
        assert!(probs[1] > 0.5);
    }

    #[test]
    fn test_knn_exact_match_returns_its_label() {
        let x = array![[1.0, 1.0], [2.0, 2.0]];
        let y = vec![1, 0];
        let mut knn = KnnClassifier::new(2);
        knn.fit(x.view(), &y).unwrap();
        let probs = knn.predict_proba(array![[1.0, 1.0]].view()).unwrap();
        assert_eq!(probs[0], 1.0);
    }

    #[test]
    fn test_knn_caps_k_to_training_size() {
        let x = array![[0.0], [1.0]];
        let y = vec![0, 1];
        let mut knn = KnnClassifier::new(50);
        knn.fit(x.view(), &y).unwrap();
        let probs = knn.predict_proba(array![[0.25]].view()).unwrap();
        // closer to the negative sample → below one half
        assert!(probs[0] < 0.5);
    }

    #[test]
    fn test_knn_zero_k_is_invalid() {
        let x = array![[0.0], [1.0]];
        let mut knn = KnnClassifier::new(0);
        assert!(matches!(
            knn.fit(x.view(), &[0, 1]),
            Err(FitError::InvalidParam("k"))
        ));
    }
}
