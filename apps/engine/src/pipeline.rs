//! Feature matrix transforms: standardization, univariate selection, PCA.
//!
//! Each transform is fitted once per scoring run and kept so the full pool
//! can be transformed consistently after training. Selection and reduction
//! return `Result`; the ensemble skips the stage and passes the unmodified
//! matrix forward when fitting fails, so a degenerate pool never aborts a
//! run here.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use thiserror::Error;

use crate::features::PRE_NORMALIZED;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("needs at least {needed} samples, got {got}")]
    TooFewSamples { needed: usize, got: usize },
    #[error("feature selection needs both label classes")]
    SingleClass,
    #[error("eigendecomposition did not converge")]
    NoConvergence,
}

// ────────────────────────────────────────────────────────────────────────────
// Standard scaler
// ────────────────────────────────────────────────────────────────────────────

/// Zero-mean/unit-variance standardization fitted on the current pool.
/// Columns listed in [`PRE_NORMALIZED`] pass through untouched, and constant
/// columns keep their values (unit divisor) instead of producing NaNs.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Array1<f64>,
    stds: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Self {
        let cols = x.ncols();
        let mut means = Array1::zeros(cols);
        let mut stds = Array1::ones(cols);
        if x.nrows() > 0 {
            for c in 0..cols {
                if PRE_NORMALIZED.contains(&c) {
                    continue;
                }
                let column = x.column(c);
                let mean = column.sum() / x.nrows() as f64;
                let var =
                    column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / x.nrows() as f64;
                means[c] = mean;
                stds[c] = if var > 0.0 { var.sqrt() } else { 1.0 };
            }
        }
        Self { means, stds }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.to_owned();
        for c in 0..out.ncols() {
            let mean = self.means[c];
            let std = self.stds[c];
            out.column_mut(c).mapv_inplace(|v| (v - mean) / std);
        }
        out
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Univariate selection (ANOVA F)
// ────────────────────────────────────────────────────────────────────────────

/// Keeps the top-k columns by one-way ANOVA F-statistic against the binary
/// labels, preserving original column order like the selector it mirrors.
#[derive(Debug, Clone)]
pub struct KBestSelector {
    keep: Vec<usize>,
}

impl KBestSelector {
    pub fn fit(x: ArrayView2<'_, f64>, y: &[usize], k: usize) -> Result<Self, PipelineError> {
        let n = x.nrows();
        if n < 2 {
            return Err(PipelineError::TooFewSamples { needed: 2, got: n });
        }
        let class1: Vec<usize> = (0..n).filter(|&i| y[i] == 1).collect();
        let class0: Vec<usize> = (0..n).filter(|&i| y[i] == 0).collect();
        if class0.is_empty() || class1.is_empty() {
            return Err(PipelineError::SingleClass);
        }

        let mut scores: Vec<(usize, f64)> = (0..x.ncols())
            .map(|c| (c, f_statistic(x, c, &class0, &class1)))
            .collect();
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut keep: Vec<usize> = scores
            .into_iter()
            .take(k.min(x.ncols()))
            .map(|(c, _)| c)
            .collect();
        keep.sort_unstable();
        Ok(Self { keep })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        x.select(Axis(1), &self.keep)
    }

    pub fn n_selected(&self) -> usize {
        self.keep.len()
    }
}

/// One-way F-statistic for a single column over two groups. Zero within-group
/// variance with separated means is reported as infinity, which simply sorts
/// the column first; an undefined ratio scores 0.
fn f_statistic(x: ArrayView2<'_, f64>, c: usize, class0: &[usize], class1: &[usize]) -> f64 {
    let col = x.column(c);
    let values0: Vec<f64> = class0.iter().map(|&i| col[i]).collect();
    let values1: Vec<f64> = class1.iter().map(|&i| col[i]).collect();
    let n = (values0.len() + values1.len()) as f64;

    let grand = (values0.iter().sum::<f64>() + values1.iter().sum::<f64>()) / n;
    let mean0 = values0.iter().sum::<f64>() / values0.len() as f64;
    let mean1 = values1.iter().sum::<f64>() / values1.len() as f64;

    let between = values0.len() as f64 * (mean0 - grand).powi(2)
        + values1.len() as f64 * (mean1 - grand).powi(2);
    let within: f64 = values0.iter().map(|v| (v - mean0).powi(2)).sum::<f64>()
        + values1.iter().map(|v| (v - mean1).powi(2)).sum::<f64>();

    let df_within = n - 2.0;
    if df_within <= 0.0 {
        return 0.0;
    }
    let msb = between; // df_between = 1 for two classes
    let msw = within / df_within;
    if msw == 0.0 {
        if msb == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        msb / msw
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PCA
// ────────────────────────────────────────────────────────────────────────────

/// Fixed-size linear reduction via eigendecomposition of the covariance
/// matrix (cyclic Jacobi, which is plenty for a 20-wide schema).
#[derive(Debug, Clone)]
pub struct Pca {
    mean: Array1<f64>,
    /// (n_features, n_components), columns are principal axes.
    components: Array2<f64>,
}

impl Pca {
    pub fn fit(x: ArrayView2<'_, f64>, n_components: usize) -> Result<Self, PipelineError> {
        let n = x.nrows();
        let d = x.ncols();
        if n < 2 {
            return Err(PipelineError::TooFewSamples { needed: 2, got: n });
        }
        let n_components = n_components.min(d);

        let mean = x.mean_axis(Axis(0)).expect("non-empty matrix");
        let mut centered = x.to_owned();
        for mut row in centered.rows_mut() {
            row -= &mean;
        }
        let cov = centered.t().dot(&centered) / (n as f64 - 1.0);

        let (eigenvalues, eigenvectors) = jacobi_eigen(&cov)?;

        // Sort axes by descending eigenvalue.
        let mut order: Vec<usize> = (0..d).collect();
        order.sort_by(|&a, &b| {
            eigenvalues[b]
                .partial_cmp(&eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut components = Array2::zeros((d, n_components));
        for (out_c, &src_c) in order.iter().take(n_components).enumerate() {
            components.column_mut(out_c).assign(&eigenvectors.column(src_c));
        }
        Ok(Self { mean, components })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut centered = x.to_owned();
        for mut row in centered.rows_mut() {
            row -= &self.mean;
        }
        centered.dot(&self.components)
    }

    pub fn n_components(&self) -> usize {
        self.components.ncols()
    }
}

/// Eigendecomposition of a symmetric matrix by cyclic Jacobi rotations.
/// Returns (eigenvalues, eigenvector columns).
fn jacobi_eigen(m: &Array2<f64>) -> Result<(Array1<f64>, Array2<f64>), PipelineError> {
    const MAX_SWEEPS: usize = 100;
    const TOL: f64 = 1e-12;

    let d = m.nrows();
    let mut a = m.to_owned();
    let mut v = Array2::eye(d);

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..d)
            .flat_map(|i| (0..d).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| a[[i, j]].powi(2))
            .sum();
        if off < TOL {
            let eigenvalues = Array1::from_iter((0..d).map(|i| a[[i, i]]));
            return Ok((eigenvalues, v));
        }

        for p in 0..d {
            for q in (p + 1)..d {
                if a[[p, q]].abs() < TOL {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta.powi(2) + 1.0).sqrt());
                let c = 1.0 / (t.powi(2) + 1.0).sqrt();
                let s = t * c;

                for k in 0..d {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..d {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..d {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }
    Err(PipelineError::NoConvergence)
}
