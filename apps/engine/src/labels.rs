//! Synthetic label construction.
//!
//! The engine has no ground-truth hiring outcomes, so it manufactures binary
//! training labels from a weighted heuristic composite of the raw feature
//! matrix: candidates above a pool percentile are class 1. The same composite
//! doubles as the fallback score whenever the ensemble cannot train.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::features::col;
use crate::stats;

/// Weights of the composite heuristic. The eight weights sum to 1.0; the
/// basic profile zeroes the four extended-feature weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeWeights {
    /// Mean of skill and knowledge match ratios.
    pub match_ratio: f64,
    /// Meets-minimum-experience flag.
    pub experience: f64,
    /// Education level divided by `education_scale`, clipped to [0, 1].
    pub education: f64,
    /// Relevant experience divided by `relevant_scale`, clipped to [0, 1].
    pub relevant_experience: f64,
    pub coherence: f64,
    pub progression: f64,
    pub specialization: f64,
    pub complexity: f64,
    pub education_scale: f64,
    pub relevant_scale: f64,
    /// Pool percentile used as the class-1 threshold.
    pub percentile: f64,
}

impl CompositeWeights {
    /// Weights of the basic engine: 0.4 match / 0.2 experience /
    /// 0.1 education / 0.3 relevant experience, top 40% labeled positive.
    pub fn basic() -> Self {
        Self {
            match_ratio: 0.4,
            experience: 0.2,
            education: 0.1,
            relevant_experience: 0.3,
            coherence: 0.0,
            progression: 0.0,
            specialization: 0.0,
            complexity: 0.0,
            education_scale: 5.0,
            relevant_scale: 10.0,
            percentile: 60.0,
        }
    }

    /// Weights of the advanced engine, spreading mass over the extended
    /// composite features; top 35% labeled positive.
    pub fn advanced() -> Self {
        Self {
            match_ratio: 0.20,
            experience: 0.10,
            education: 0.08,
            relevant_experience: 0.15,
            coherence: 0.08,
            progression: 0.08,
            specialization: 0.08,
            complexity: 0.13,
            education_scale: 6.0,
            relevant_scale: 15.0,
            percentile: 65.0,
        }
    }
}

/// Labeler output: one binary class and one composite score per candidate.
#[derive(Debug, Clone)]
pub struct LabelSet {
    pub labels: Vec<usize>,
    pub composite: Array1<f64>,
}

/// Composite heuristic score of a single raw feature row.
pub fn composite_score(row: ArrayView1<'_, f64>, w: &CompositeWeights) -> f64 {
    let match_score = (row[col::SKILL_MATCH] + row[col::KNOWLEDGE_MATCH]) / 2.0;
    let education = (row[col::EDUCATION_LEVEL] / w.education_scale).clamp(0.0, 1.0);
    let relevant = (row[col::RELEVANT_EXPERIENCE] / w.relevant_scale).clamp(0.0, 1.0);
    let progression = row[col::PROGRESSION].clamp(0.0, 1.0);

    match_score * w.match_ratio
        + row[col::MEETS_EXPERIENCE] * w.experience
        + education * w.education
        + relevant * w.relevant_experience
        + row[col::COHERENCE] * w.coherence
        + progression * w.progression
        + row[col::SPECIALIZATION] * w.specialization
        + row[col::PROFILE_COMPLEXITY] * w.complexity
}

/// Derives binary labels from the raw feature matrix.
///
/// Threshold is the configured pool percentile (fixed at 0.5 for a single
/// candidate). If thresholding leaves a single class on a pool larger than
/// one, the lower half by original order is forced to 0 and the upper half
/// to 1 so every downstream learner sees both classes.
pub fn label(x: &Array2<f64>, w: &CompositeWeights) -> LabelSet {
    let composite = Array1::from_iter(x.rows().into_iter().map(|row| composite_score(row, w)));
    if composite.is_empty() {
        return LabelSet { labels: Vec::new(), composite };
    }

    let threshold = if composite.len() > 1 {
        stats::percentile(composite.as_slice().expect("contiguous"), w.percentile)
    } else {
        0.5
    };

    let mut labels: Vec<usize> = composite
        .iter()
        .map(|&s| usize::from(s >= threshold))
        .collect();

    let n = labels.len();
    if n > 1 && labels.iter().all(|&l| l == labels[0]) {
        let half = n / 2;
        for (i, label) in labels.iter_mut().enumerate() {
            *label = usize::from(i >= half);
        }
    }

    LabelSet { labels, composite }
}
