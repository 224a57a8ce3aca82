//! Linear margin classifier (Pegasos-style hinge-loss SGD) with Platt-scaled
//! probabilities.

use ndarray::{Array1, ArrayView2};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use super::{Classifier, FitError};

const PLATT_ITER: usize = 500;
const PLATT_LR: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct MarginClassifier {
    lambda: f64,
    max_iter: usize,
    seed: u64,
    weights: Option<Array1<f64>>,
    bias: f64,
    /// Platt sigmoid parameters: P(y=1|f) = σ(−(a·f + b)).
    platt_a: f64,
    platt_b: f64,
}

impl MarginClassifier {
    pub fn new(lambda: f64, max_iter: usize, seed: u64) -> Self {
        Self {
            lambda,
            max_iter,
            seed,
            weights: None,
            bias: 0.0,
            platt_a: -1.0,
            platt_b: 0.0,
        }
    }

    fn decision(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, FitError> {
        let w = self.weights.as_ref().ok_or(FitError::NotFitted)?;
        Ok(x.dot(w) + self.bias)
    }
}

impl Classifier for MarginClassifier {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize]) -> Result<(), FitError> {
        if self.max_iter == 0 {
            return Err(FitError::InvalidParam("max_iter"));
        }
        if self.lambda <= 0.0 {
            return Err(FitError::InvalidParam("lambda"));
        }
        let n = x.nrows();
        if n == 0 {
            return Err(FitError::EmptyTrainingSet);
        }
        // A margin is undefined with one class.
        if y.iter().all(|&l| l == y[0]) {
            return Err(FitError::SingleClass);
        }

        let signed: Vec<f64> = y.iter().map(|&l| if l == 1 { 1.0 } else { -1.0 }).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut w = Array1::zeros(x.ncols());
        let mut b = 0.0;

        for t in 1..=self.max_iter {
            let i = rng.random_range(0..n);
            let eta = 1.0 / (self.lambda * t as f64);
            let margin = signed[i] * (x.row(i).dot(&w) + b);
            w *= 1.0 - eta * self.lambda;
            if margin < 1.0 {
                w.scaled_add(eta * signed[i], &x.row(i));
                b += eta * signed[i];
            }
        }
        self.weights = Some(w);
        self.bias = b;

        // Platt scaling on the training decision values.
        let decisions = self.decision(x)?;
        let mut a = -1.0;
        let mut c = 0.0;
        for _ in 0..PLATT_ITER {
            let mut grad_a = 0.0;
            let mut grad_c = 0.0;
            for (i, &f) in decisions.iter().enumerate() {
                let p = sigmoid(-(a * f + c));
                let t = f64::from(y[i] == 1);
                grad_a += (t - p) * f;
                grad_c += t - p;
            }
            a -= PLATT_LR * grad_a;
            c -= PLATT_LR * grad_c;
        }
        self.platt_a = a;
        self.platt_b = c;
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, FitError> {
        let decisions = self.decision(x)?;
        Ok(decisions.mapv(|f| sigmoid(-(self.platt_a * f + self.platt_b))))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
