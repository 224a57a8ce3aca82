//! Small multilayer perceptron: ReLU hidden layers, a single sigmoid output
//! unit, full-batch gradient descent with momentum and L2 penalty.
//!
//! Training is bounded by `max_iter` epochs and stops early once the loss
//! stalls, so a fit always terminates.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use super::{Classifier, FitError};

const LEARNING_RATE: f64 = 0.05;
const MOMENTUM: f64 = 0.9;
const L2_ALPHA: f64 = 0.001;
const LOSS_TOL: f64 = 1e-4;
const STALL_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct MlpClassifier {
    hidden_layers: Vec<usize>,
    max_iter: usize,
    seed: u64,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
}

impl MlpClassifier {
    pub fn new(hidden_layers: Vec<usize>, max_iter: usize, seed: u64) -> Self {
        Self {
            hidden_layers,
            max_iter,
            seed,
            weights: Vec::new(),
            biases: Vec::new(),
        }
    }

    fn layer_sizes(&self, inputs: usize) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.hidden_layers.len() + 2);
        sizes.push(inputs);
        sizes.extend_from_slice(&self.hidden_layers);
        sizes.push(1);
        sizes
    }
}

impl Classifier for MlpClassifier {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize]) -> Result<(), FitError> {
        if self.max_iter == 0 {
            return Err(FitError::InvalidParam("max_iter"));
        }
        if self.hidden_layers.iter().any(|&h| h == 0) {
            return Err(FitError::InvalidParam("hidden_layers"));
        }
        let n = x.nrows();
        if n == 0 {
            return Err(FitError::EmptyTrainingSet);
        }

        let sizes = self.layer_sizes(x.ncols());
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.weights = Vec::new();
        self.biases = Vec::new();
        for w in sizes.windows(2) {
            let (fan_in, fan_out) = (w[0], w[1]);
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            let weight = Array2::from_shape_fn((fan_in, fan_out), |_| {
                rng.random_range(-limit..limit)
            });
            self.weights.push(weight);
            self.biases.push(Array1::zeros(fan_out));
        }

        let targets = Array2::from_shape_fn((n, 1), |(i, _)| y[i] as f64);
        let mut velocity_w: Vec<Array2<f64>> =
            self.weights.iter().map(|w| Array2::zeros(w.dim())).collect();
        let mut velocity_b: Vec<Array1<f64>> =
            self.biases.iter().map(|b| Array1::zeros(b.len())).collect();

        let mut best_loss = f64::INFINITY;
        let mut stalled = 0usize;

        for _epoch in 0..self.max_iter {
            // Forward pass, keeping activations for backprop.
            let mut activations: Vec<Array2<f64>> = vec![x.to_owned()];
            for (l, weight) in self.weights.iter().enumerate() {
                let z = activations[l].dot(weight) + &self.biases[l];
                let a = if l + 1 == self.weights.len() {
                    z.mapv(sigmoid)
                } else {
                    z.mapv(|v| v.max(0.0))
                };
                activations.push(a);
            }
            let output = activations.last().expect("at least one layer");

            let loss = log_loss(output, &targets)
                + L2_ALPHA / 2.0
                    * self
                        .weights
                        .iter()
                        .map(|w| w.iter().map(|v| v * v).sum::<f64>())
                        .sum::<f64>();
            if loss + LOSS_TOL < best_loss {
                best_loss = loss;
                stalled = 0;
            } else {
                stalled += 1;
                if stalled >= STALL_LIMIT {
                    break;
                }
            }

            // Backward pass. With sigmoid + cross-entropy the output delta
            // reduces to (p - y) / n.
            let mut delta = (output - &targets) / n as f64;
            for l in (0..self.weights.len()).rev() {
                let grad_w = activations[l].t().dot(&delta) + L2_ALPHA * &self.weights[l];
                let grad_b = delta.sum_axis(Axis(0));

                if l > 0 {
                    let back = delta.dot(&self.weights[l].t());
                    // ReLU gate from the forward activation of layer l.
                    delta = back * activations[l].mapv(|a| if a > 0.0 { 1.0 } else { 0.0 });
                }

                velocity_w[l] = MOMENTUM * &velocity_w[l] - LEARNING_RATE * &grad_w;
                velocity_b[l] = MOMENTUM * &velocity_b[l] - LEARNING_RATE * &grad_b;
                self.weights[l] = &self.weights[l] + &velocity_w[l];
                self.biases[l] = &self.biases[l] + &velocity_b[l];
            }
        }
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, FitError> {
        if self.weights.is_empty() {
            return Err(FitError::NotFitted);
        }
        let mut a = x.to_owned();
        for (l, weight) in self.weights.iter().enumerate() {
            let z = a.dot(weight) + &self.biases[l];
            a = if l + 1 == self.weights.len() {
                z.mapv(sigmoid)
            } else {
                z.mapv(|v| v.max(0.0))
            };
        }
        Ok(a.column(0).to_owned())
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn log_loss(probs: &Array2<f64>, targets: &Array2<f64>) -> f64 {
    let eps = 1e-12;
    let n = probs.nrows() as f64;
    probs
        .iter()
        .zip(targets.iter())
        .map(|(&p, &t)| {
            let p = p.clamp(eps, 1.0 - eps);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum::<f64>()
        / n
}
