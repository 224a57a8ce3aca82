//! Run orchestration: one call takes a candidate pool and raw role records
//! and returns the ranked report.
//!
//! Every call builds its own fitted state (scaler, selection, committee), so
//! two concurrent runs never share pool statistics. The run degrades instead
//! of failing: an empty pool yields an empty report, a single candidate or an
//! untrainable committee falls back to the heuristic composite, and only an
//! unusable candidate record is an error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ensemble::{advanced_committee, basic_committee, EnsembleScorer};
use crate::error::EngineError;
use crate::features;
use crate::labels::{self, CompositeWeights};
use crate::model::ModelMetrics;
use crate::pipeline::StandardScaler;
use crate::profile::CandidateProfile;
use crate::ranker::{self, RecommendationResult, SCORE_CUTOFF};
use crate::requirements::{RoleRequirementSet, RoleSpec};

/// Engine preset selecting committee composition and labeling weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Three-member committee, four-term composite.
    Basic,
    /// Four-member committee, eight-term composite, selection + reduction.
    Advanced,
}

/// Immutable per-run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub profile: Profile,
    /// Maximum shortlist length.
    pub top_n: usize,
    /// Seed for every stochastic component; fixed seed ⇒ identical reports.
    pub seed: u64,
    /// Scores at or below this never reach the shortlist.
    pub score_cutoff: f64,
}

impl EngineConfig {
    pub fn basic() -> Self {
        Self {
            profile: Profile::Basic,
            top_n: 5,
            seed: 42,
            score_cutoff: SCORE_CUTOFF,
        }
    }

    pub fn advanced() -> Self {
        Self {
            profile: Profile::Advanced,
            top_n: 10,
            seed: 42,
            score_cutoff: SCORE_CUTOFF,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::basic()
    }
}

/// The ranked report of one scoring run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendations {
    pub results: Vec<RecommendationResult>,
    /// Held-out evaluation metrics per committee member.
    pub model_metrics: BTreeMap<String, ModelMetrics>,
    /// Fixed combination weights per committee member.
    pub model_weights: BTreeMap<String, f64>,
    /// False when the run used the heuristic composite instead of the
    /// committee (empty pool, single candidate, or refit failure).
    pub trained: bool,
    pub generated_at: DateTime<Utc>,
}

impl Recommendations {
    /// One-line description of the committee and how the run resolved.
    pub fn summary(&self) -> String {
        let members = self
            .model_weights
            .iter()
            .map(|(name, weight)| format!("{name} ({weight:.2})"))
            .collect::<Vec<_>>()
            .join(", ");
        let mode = if self.trained { "trained" } else { "heuristic" };
        format!(
            "{mode} committee [{members}], {} candidate(s) recommended",
            self.results.len()
        )
    }
}

/// Scores and ranks the candidate pool against the aggregated role
/// requirements.
pub fn recommend(
    candidates: &[CandidateProfile],
    roles: &[RoleSpec],
    config: &EngineConfig,
) -> Result<Recommendations, EngineError> {
    let requirements = RoleRequirementSet::from_roles(roles);
    let feature_set = features::extract(candidates, &requirements)?;

    let committee = match config.profile {
        Profile::Basic => basic_committee(config.seed),
        Profile::Advanced => advanced_committee(config.seed),
    };
    let use_reduction = config.profile == Profile::Advanced;
    let mut scorer = EnsembleScorer::new(committee, use_reduction, config.seed);
    let model_weights = scorer.weights();

    if feature_set.is_empty() {
        debug!("empty candidate pool, returning empty report");
        return Ok(Recommendations {
            results: Vec::new(),
            model_metrics: BTreeMap::new(),
            model_weights,
            trained: false,
            generated_at: Utc::now(),
        });
    }

    let composite_weights = match config.profile {
        Profile::Basic => CompositeWeights::basic(),
        Profile::Advanced => CompositeWeights::advanced(),
    };
    let label_set = labels::label(&feature_set.matrix, &composite_weights);

    let member_names: Vec<String> = model_weights.keys().cloned().collect();

    if feature_set.len() == 1 {
        info!("single candidate, scoring on the composite heuristic");
        let score = label_set.composite[0];
        let results = ranker::rank_fallback(
            &feature_set.candidate_ids,
            &label_set.composite,
            &member_names,
            config.score_cutoff,
            config.top_n,
        );
        let model_metrics = model_weights
            .keys()
            .map(|name| (name.clone(), ModelMetrics::uniform(score)))
            .collect();
        return Ok(Recommendations {
            results,
            model_metrics,
            model_weights,
            trained: false,
            generated_at: Utc::now(),
        });
    }

    let scaler = StandardScaler::fit(&feature_set.matrix);
    let x = scaler.transform(&feature_set.matrix);

    let model_metrics = scorer.train(&x, &label_set.labels);

    let results = if scorer.trained() {
        let member_scores = scorer.score(&x);
        ranker::rank(
            &feature_set.candidate_ids,
            &member_scores,
            config.score_cutoff,
            config.top_n,
        )
    } else {
        warn!("committee unavailable, ranking on the composite heuristic");
        ranker::rank_fallback(
            &feature_set.candidate_ids,
            &label_set.composite,
            &member_names,
            config.score_cutoff,
            config.top_n,
        )
    };

    Ok(Recommendations {
        results,
        model_metrics,
        model_weights,
        trained: scorer.trained(),
        generated_at: Utc::now(),
    })
}
