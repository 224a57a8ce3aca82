//! Score combination and ranking.
//!
//! The ranker turns per-member probabilities into an ordered shortlist:
//! weighted soft vote, min-max normalization over the pool, a hard cutoff at
//! the low end, dense ranks from 1 and a confidence tier per row. The
//! heuristic fallback shares the same cutoff and tiering so callers see one
//! result shape on every path.

use std::collections::BTreeMap;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ensemble::MemberScores;

/// Scores at or below this value never reach the shortlist.
pub const SCORE_CUTOFF: f64 = 0.3;

/// Confidence tier of a normalized score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn for_score(score: f64) -> Self {
        if score > 0.7 {
            Self::High
        } else if score > 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// One shortlist row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub candidate_id: Uuid,
    /// Combined, pool-normalized score in [0, 1].
    pub score: f64,
    /// Per-member probability for this candidate. On fallback paths the
    /// composite heuristic fills in for every member.
    pub model_scores: BTreeMap<String, f64>,
    pub confidence: Confidence,
    /// Dense rank starting at 1; equal scores share a rank.
    pub rank: usize,
}

/// Ranks a trained pool: weighted soft vote over the members, min-max
/// normalization, cutoff, order, truncate.
pub fn rank(
    candidate_ids: &[Uuid],
    member_scores: &[MemberScores],
    cutoff: f64,
    top_n: usize,
) -> Vec<RecommendationResult> {
    let n = candidate_ids.len();
    let mut combined = Array1::<f64>::zeros(n);
    for member in member_scores {
        combined.scaled_add(member.weight, &member.probs);
    }
    let normalized = minmax(&combined);

    let per_candidate_models = |i: usize| {
        member_scores
            .iter()
            .map(|m| (m.name.clone(), m.probs[i]))
            .collect::<BTreeMap<String, f64>>()
    };

    shortlist(candidate_ids, &normalized, cutoff, top_n, per_candidate_models)
}

/// Ranks from raw composite scores when the ensemble is unavailable (single
/// candidate, or training/refit failed). The composite stands in for every
/// member's probability, so result rows keep one sub-score per member.
pub fn rank_fallback(
    candidate_ids: &[Uuid],
    composite: &Array1<f64>,
    member_names: &[String],
    cutoff: f64,
    top_n: usize,
) -> Vec<RecommendationResult> {
    shortlist(candidate_ids, composite, cutoff, top_n, |i| {
        member_names
            .iter()
            .map(|name| (name.clone(), composite[i]))
            .collect()
    })
}

/// Min-max normalization over the pool. Pools of one and zero-variance pools
/// pass through unchanged so a lone good score is not flattened to 0.
fn minmax(scores: &Array1<f64>) -> Array1<f64> {
    if scores.len() < 2 {
        return scores.clone();
    }
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max - min < f64::EPSILON {
        return scores.clone();
    }
    scores.mapv(|s| (s - min) / (max - min))
}

fn shortlist(
    candidate_ids: &[Uuid],
    scores: &Array1<f64>,
    cutoff: f64,
    top_n: usize,
    model_scores_for: impl Fn(usize) -> BTreeMap<String, f64>,
) -> Vec<RecommendationResult> {
    let mut kept: Vec<(usize, f64)> = scores
        .iter()
        .enumerate()
        .filter(|&(_, &s)| s > cutoff)
        .map(|(i, &s)| (i, s))
        .collect();
    // descending by score, ties by candidate order for determinism
    kept.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));

    let mut results = Vec::with_capacity(kept.len().min(top_n));
    let mut rank = 0usize;
    let mut previous = f64::INFINITY;
    for (i, score) in kept {
        if previous - score >= f64::EPSILON {
            rank += 1;
            previous = score;
        }
        results.push(RecommendationResult {
            candidate_id: candidate_ids[i],
            score,
            model_scores: model_scores_for(i),
            confidence: Confidence::for_score(score),
            rank,
        });
        if results.len() == top_n {
            break;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn make_ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn make_members(probs: Vec<(&str, f64, Vec<f64>)>) -> Vec<MemberScores> {
        probs
            .into_iter()
            .map(|(name, weight, p)| MemberScores {
                name: name.to_string(),
                weight,
                probs: Array1::from_vec(p),
            })
            .collect()
    }

    #[test]
    fn test_rank_combines_weighted_and_normalizes() {
        let ids = make_ids(3);
        let members = make_members(vec![
            ("a", 0.5, vec![0.9, 0.5, 0.1]),
            ("b", 0.5, vec![0.7, 0.5, 0.3]),
        ]);
        let results = rank(&ids, &members, SCORE_CUTOFF, 10);
        // combined: 0.8, 0.5, 0.2 → normalized: 1.0, 0.5, 0.0; the last is cut
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].candidate_id, ids[0]);
        assert!((results[0].score - 1.0).abs() < 1e-12);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].confidence, Confidence::High);
        assert_eq!(results[0].model_scores["a"], 0.9);
        assert_eq!(results[1].rank, 2);
        assert_eq!(results[1].confidence, Confidence::Low);
    }

    #[test]
    fn test_cutoff_drops_low_scores() {
        let ids = make_ids(4);
        let members = make_members(vec![("only", 1.0, vec![1.0, 0.8, 0.6, 0.0])]);
        let results = rank(&ids, &members, SCORE_CUTOFF, 10);
        // normalized: 1.0, 0.8, 0.6, 0.0 → the last is dropped
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.score > SCORE_CUTOFF));
    }

    #[test]
    fn test_dense_ranks_share_on_ties() {
        let ids = make_ids(4);
        let scores = array![0.9, 0.9, 0.6, 0.4];
        let results = rank_fallback(&ids, &scores, &[], SCORE_CUTOFF, 10);
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].rank, 1);
        assert_eq!(results[2].rank, 2);
        assert_eq!(results[3].rank, 3);
        // tie broken by candidate order
        assert_eq!(results[0].candidate_id, ids[0]);
        assert_eq!(results[1].candidate_id, ids[1]);
    }

    #[test]
    fn test_top_n_truncates_after_ordering() {
        let ids = make_ids(5);
        let scores = array![0.4, 0.5, 0.6, 0.7, 0.8];
        let results = rank_fallback(&ids, &scores, &[], SCORE_CUTOFF, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].candidate_id, ids[4]);
        assert_eq!(results[1].candidate_id, ids[3]);
    }

    #[test]
    fn test_single_candidate_score_passes_through() {
        let ids = make_ids(1);
        let scores = array![0.72];
        let results = rank_fallback(&ids, &scores, &[], SCORE_CUTOFF, 5);
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 0.72).abs() < 1e-12);
        assert_eq!(results[0].confidence, Confidence::High);
    }

    #[test]
    fn test_fallback_fills_a_sub_score_per_member() {
        let ids = make_ids(2);
        let scores = array![0.8, 0.4];
        let names = vec!["knn".to_string(), "neural_net".to_string(), "random_forest".to_string()];
        let results = rank_fallback(&ids, &scores, &names, SCORE_CUTOFF, 5);
        assert_eq!(results.len(), 2);
        for result in &results {
            assert_eq!(result.model_scores.len(), names.len());
            // the composite stands in for every member's probability
            for &sub in result.model_scores.values() {
                assert_eq!(sub, result.score);
            }
        }
    }

    #[test]
    fn test_zero_variance_pool_passes_through() {
        let ids = make_ids(3);
        let scores = array![0.6, 0.6, 0.6];
        let results = rank_fallback(&ids, &scores, &[], SCORE_CUTOFF, 5);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| (r.score - 0.6).abs() < 1e-12));
        assert!(results.iter().all(|r| r.rank == 1));
        assert!(results.iter().all(|r| r.confidence == Confidence::Medium));
    }

    #[test]
    fn test_confidence_tiers() {
        assert_eq!(Confidence::for_score(0.71), Confidence::High);
        assert_eq!(Confidence::for_score(0.7), Confidence::Medium);
        assert_eq!(Confidence::for_score(0.51), Confidence::Medium);
        assert_eq!(Confidence::for_score(0.5), Confidence::Low);
        assert_eq!(Confidence::for_score(0.31), Confidence::Low);
    }
}
