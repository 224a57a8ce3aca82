//! Feature extraction — turns (candidate, requirements) pairs into a fixed
//! 20-column numeric matrix.
//!
//! The column order is part of the engine's contract: the synthetic labeler
//! and the heuristic fallback address columns by the constants in [`col`],
//! so extraction must never reorder or drop columns. Match ratios and the
//! experience flag are already in [0, 1] and bypass the scaler; everything
//! else is standardized before model training.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::Array2;
use uuid::Uuid;

use crate::error::EngineError;
use crate::profile::CandidateProfile;
use crate::requirements::RoleRequirementSet;
use crate::stats;

/// Number of columns in the feature schema.
pub const NUM_FEATURES: usize = 20;

/// Named column indices for the feature schema.
pub mod col {
    pub const NUM_SKILLS: usize = 0;
    pub const NUM_KNOWLEDGE: usize = 1;
    pub const NUM_EXPERIENCE: usize = 2;
    pub const NUM_STUDIES: usize = 3;
    /// |candidate skills ∩ required skills| / |required skills|.
    pub const SKILL_MATCH: usize = 4;
    /// |candidate knowledge ∩ required knowledge| / |required knowledge|.
    pub const KNOWLEDGE_MATCH: usize = 5;
    /// Mean proficiency over knowledge items that hit a required term.
    pub const AVG_KNOWLEDGE_LEVEL: usize = 6;
    pub const MAX_KNOWLEDGE_LEVEL: usize = 7;
    pub const MAX_EXPERIENCE_YEARS: usize = 8;
    /// 1 when the longest experience meets the required minimum, else 0.
    pub const MEETS_EXPERIENCE: usize = 9;
    /// Highest education level across studies (1–6 scale).
    pub const EDUCATION_LEVEL: usize = 10;
    /// Summed years of experience whose activities mention a required term.
    pub const RELEVANT_EXPERIENCE: usize = 11;
    /// Count of distinct skill categories.
    pub const SKILL_DIVERSITY: usize = 12;
    /// Std deviation of experience durations.
    pub const EXPERIENCE_CONSISTENCY: usize = 13;
    pub const AVG_SKILL_LEVEL: usize = 14;
    pub const MAX_SKILL_LEVEL: usize = 15;
    /// Jaccard index between skill-name and knowledge-name sets.
    pub const COHERENCE: usize = 16;
    /// Pearson correlation of chronological index vs experience duration.
    pub const PROGRESSION: usize = 17;
    /// Share of the most common skill category.
    pub const SPECIALIZATION: usize = 18;
    /// Normalized count-based profile complexity.
    pub const PROFILE_COMPLEXITY: usize = 19;
}

/// Columns that are already in [0, 1] and must not be standardized.
pub const PRE_NORMALIZED: [usize; 3] = [col::SKILL_MATCH, col::KNOWLEDGE_MATCH, col::MEETS_EXPERIENCE];

/// Proficiency assumed for skills that carry no explicit level.
const DEFAULT_SKILL_LEVEL: f64 = 3.0;
/// Category bucket for skills that carry no explicit category.
const DEFAULT_CATEGORY: &str = "general";

/// Extraction output: one row per candidate, ids in row order.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub matrix: Array2<f64>,
    pub candidate_ids: Vec<Uuid>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.candidate_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidate_ids.is_empty()
    }
}

/// Builds the feature matrix for the candidate pool. An empty pool yields an
/// empty matrix; the only error is a candidate whose numeric fields make a
/// feature vector impossible (non-finite values).
pub fn extract(
    candidates: &[CandidateProfile],
    requirements: &RoleRequirementSet,
) -> Result<FeatureSet, EngineError> {
    let mut rows = Vec::with_capacity(candidates.len() * NUM_FEATURES);
    let mut ids = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let row = extract_one(candidate, requirements);
        if let Some(bad) = row.iter().position(|v| !v.is_finite()) {
            return Err(EngineError::FatalExtraction {
                candidate_id: candidate.id,
                reason: format!("feature column {bad} is not finite"),
            });
        }
        rows.extend_from_slice(&row);
        ids.push(candidate.id);
    }

    let matrix = Array2::from_shape_vec((ids.len(), NUM_FEATURES), rows)
        .expect("row count times schema width matches buffer length");
    Ok(FeatureSet { matrix, candidate_ids: ids })
}

fn extract_one(candidate: &CandidateProfile, req: &RoleRequirementSet) -> [f64; NUM_FEATURES] {
    let skill_names: BTreeSet<String> = candidate
        .skills
        .iter()
        .map(|s| s.name.to_lowercase())
        .collect();
    let knowledge_names: BTreeSet<String> = candidate
        .knowledge
        .iter()
        .map(|k| k.name.to_lowercase())
        .collect();

    let skill_match = match_ratio(&skill_names, &req.skills);
    let knowledge_match = match_ratio(&knowledge_names, &req.knowledge);

    // Proficiency over the knowledge items that hit a required term.
    let relevant_levels: Vec<f64> = candidate
        .knowledge
        .iter()
        .filter(|k| req.knowledge.contains(&k.name.to_lowercase()))
        .map(|k| f64::from(k.level))
        .collect();
    let avg_knowledge_level = stats::mean(&relevant_levels);
    let max_knowledge_level = relevant_levels.iter().copied().fold(0.0, f64::max);

    let durations: Vec<f64> = candidate.experience.iter().map(|e| e.years).collect();
    let max_experience_years = durations.iter().copied().fold(0.0, f64::max);
    let meets_experience = if max_experience_years >= req.min_experience_years {
        1.0
    } else {
        0.0
    };

    let education_level = candidate
        .studies
        .iter()
        .map(|s| f64::from(s.level))
        .fold(0.0, f64::max);

    // Relevance by plain case-insensitive containment of requirement terms in
    // the activity text. Deliberately not tokenized: changing the match rule
    // would change scores.
    let relevant_experience: f64 = candidate
        .experience
        .iter()
        .filter(|e| {
            let activities = e.activities.to_lowercase();
            req.skills.iter().chain(req.knowledge.iter()).any(|term| activities.contains(term))
        })
        .map(|e| e.years)
        .sum();

    let categories: Vec<&str> = candidate
        .skills
        .iter()
        .map(|s| s.category.as_deref().unwrap_or(DEFAULT_CATEGORY))
        .collect();
    let skill_diversity = categories.iter().collect::<BTreeSet<_>>().len() as f64;

    let experience_consistency = stats::pop_std(&durations);

    let skill_levels: Vec<f64> = candidate
        .skills
        .iter()
        .map(|s| s.level.map_or(DEFAULT_SKILL_LEVEL, f64::from))
        .collect();
    let avg_skill_level = stats::mean(&skill_levels);
    let max_skill_level = skill_levels.iter().copied().fold(0.0, f64::max);

    let coherence = jaccard(&skill_names, &knowledge_names);

    let indices: Vec<f64> = (0..durations.len()).map(|i| i as f64).collect();
    let progression = stats::pearson(&indices, &durations).unwrap_or(0.0);

    let specialization = if categories.is_empty() {
        0.0
    } else {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for c in &categories {
            *counts.entry(c).or_insert(0) += 1;
        }
        let modal = counts.values().copied().max().unwrap_or(0);
        modal as f64 / categories.len() as f64
    };

    let profile_complexity = (candidate.skills.len() as f64 * 0.3
        + candidate.knowledge.len() as f64 * 0.3
        + candidate.experience.len() as f64 * 0.2
        + candidate.studies.len() as f64 * 0.2)
        / 20.0;

    let mut row = [0.0; NUM_FEATURES];
    row[col::NUM_SKILLS] = candidate.skills.len() as f64;
    row[col::NUM_KNOWLEDGE] = candidate.knowledge.len() as f64;
    row[col::NUM_EXPERIENCE] = candidate.experience.len() as f64;
    row[col::NUM_STUDIES] = candidate.studies.len() as f64;
    row[col::SKILL_MATCH] = skill_match;
    row[col::KNOWLEDGE_MATCH] = knowledge_match;
    row[col::AVG_KNOWLEDGE_LEVEL] = avg_knowledge_level;
    row[col::MAX_KNOWLEDGE_LEVEL] = max_knowledge_level;
    row[col::MAX_EXPERIENCE_YEARS] = max_experience_years;
    row[col::MEETS_EXPERIENCE] = meets_experience;
    row[col::EDUCATION_LEVEL] = education_level;
    row[col::RELEVANT_EXPERIENCE] = relevant_experience;
    row[col::SKILL_DIVERSITY] = skill_diversity;
    row[col::EXPERIENCE_CONSISTENCY] = experience_consistency;
    row[col::AVG_SKILL_LEVEL] = avg_skill_level;
    row[col::MAX_SKILL_LEVEL] = max_skill_level;
    row[col::COHERENCE] = coherence;
    row[col::PROGRESSION] = progression;
    row[col::SPECIALIZATION] = specialization;
    row[col::PROFILE_COMPLEXITY] = profile_complexity;
    row
}

/// Fraction of required terms the candidate covers; 0 when nothing is
/// required.
fn match_ratio(candidate_terms: &BTreeSet<String>, required: &BTreeSet<String>) -> f64 {
    if required.is_empty() {
        return 0.0;
    }
    let hits = candidate_terms.intersection(required).count();
    hits as f64 / required.len() as f64
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    inter / union
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ExperienceRecord, KnowledgeItem, Skill, StudyRecord};
    use crate::requirements::RoleSpec;

    fn make_requirements(skills: &str, knowledge: &str, experience: &str) -> RoleRequirementSet {
        RoleRequirementSet::from_roles(&[RoleSpec {
            role: "dev".to_string(),
            skills_text: skills.to_string(),
            knowledge_text: knowledge.to_string(),
            experience_text: experience.to_string(),
        }])
    }

    fn make_candidate() -> CandidateProfile {
        CandidateProfile {
            id: Uuid::new_v4(),
            name: "Grace".to_string(),
            skills: vec![
                Skill {
                    name: "Python".to_string(),
                    experience_notes: String::new(),
                    level: Some(4),
                    category: Some("backend".to_string()),
                },
                Skill::named("SQL"),
            ],
            knowledge: vec![KnowledgeItem {
                name: "Machine Learning".to_string(),
                level: 5,
            }],
            studies: vec![StudyRecord {
                field: "CS".to_string(),
                level: 4,
                year: 2018,
            }],
            experience: vec![
                ExperienceRecord {
                    role: "analyst".to_string(),
                    years: 2.0,
                    activities: "built python dashboards".to_string(),
                },
                ExperienceRecord {
                    role: "engineer".to_string(),
                    years: 4.0,
                    activities: "ml pipelines".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_match_ratios() {
        let req = make_requirements("python, sql, go", "machine learning", "");
        let fs = extract(&[make_candidate()], &req).unwrap();
        let row = fs.matrix.row(0);
        assert!((row[col::SKILL_MATCH] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(row[col::KNOWLEDGE_MATCH], 1.0);
    }

    #[test]
    fn test_empty_requirements_give_zero_ratios() {
        let req = make_requirements("", "", "");
        let fs = extract(&[make_candidate()], &req).unwrap();
        let row = fs.matrix.row(0);
        assert_eq!(row[col::SKILL_MATCH], 0.0);
        assert_eq!(row[col::KNOWLEDGE_MATCH], 0.0);
    }

    #[test]
    fn test_knowledge_levels_only_count_required_terms() {
        let req = make_requirements("", "machine learning", "");
        let fs = extract(&[make_candidate()], &req).unwrap();
        let row = fs.matrix.row(0);
        assert_eq!(row[col::AVG_KNOWLEDGE_LEVEL], 5.0);
        assert_eq!(row[col::MAX_KNOWLEDGE_LEVEL], 5.0);

        let none = make_requirements("", "databases", "");
        let fs = extract(&[make_candidate()], &none).unwrap();
        assert_eq!(fs.matrix.row(0)[col::AVG_KNOWLEDGE_LEVEL], 0.0);
    }

    #[test]
    fn test_experience_flag_and_relevance() {
        let req = make_requirements("python", "", "3 años");
        let fs = extract(&[make_candidate()], &req).unwrap();
        let row = fs.matrix.row(0);
        assert_eq!(row[col::MAX_EXPERIENCE_YEARS], 4.0);
        assert_eq!(row[col::MEETS_EXPERIENCE], 1.0);
        // only the first record mentions "python"
        assert_eq!(row[col::RELEVANT_EXPERIENCE], 2.0);
    }

    #[test]
    fn test_empty_candidate_degrades_to_zeros() {
        let empty = CandidateProfile {
            id: Uuid::new_v4(),
            name: "Blank".to_string(),
            skills: vec![],
            knowledge: vec![],
            studies: vec![],
            experience: vec![],
        };
        let req = make_requirements("python", "sql", "2 years");
        let fs = extract(&[empty], &req).unwrap();
        let row = fs.matrix.row(0);
        assert_eq!(row[col::NUM_SKILLS], 0.0);
        assert_eq!(row[col::EDUCATION_LEVEL], 0.0);
        assert_eq!(row[col::SPECIALIZATION], 0.0);
        // min required is 2 and max experience is 0 → flag off
        assert_eq!(row[col::MEETS_EXPERIENCE], 0.0);
        // no required minimum would flip it on: 0 >= 0
        let no_min = make_requirements("python", "sql", "");
        let empty2 = CandidateProfile {
            id: Uuid::new_v4(),
            name: "Blank".to_string(),
            skills: vec![],
            knowledge: vec![],
            studies: vec![],
            experience: vec![],
        };
        let fs = extract(&[empty2], &no_min).unwrap();
        assert_eq!(fs.matrix.row(0)[col::MEETS_EXPERIENCE], 1.0);
    }

    #[test]
    fn test_skill_level_defaults_to_mid_scale() {
        let req = make_requirements("", "", "");
        let fs = extract(&[make_candidate()], &req).unwrap();
        let row = fs.matrix.row(0);
        // levels are 4 and the default 3
        assert!((row[col::AVG_SKILL_LEVEL] - 3.5).abs() < 1e-12);
        assert_eq!(row[col::MAX_SKILL_LEVEL], 4.0);
    }

    #[test]
    fn test_diversity_and_specialization() {
        let req = make_requirements("", "", "");
        let fs = extract(&[make_candidate()], &req).unwrap();
        let row = fs.matrix.row(0);
        // categories: backend + default general
        assert_eq!(row[col::SKILL_DIVERSITY], 2.0);
        assert_eq!(row[col::SPECIALIZATION], 0.5);
    }

    #[test]
    fn test_progression_uses_record_order() {
        let req = make_requirements("", "", "");
        let fs = extract(&[make_candidate()], &req).unwrap();
        // durations 2 then 4 → perfectly increasing
        assert!((fs.matrix.row(0)[col::PROGRESSION] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_duration_is_fatal() {
        let mut candidate = make_candidate();
        candidate.experience[0].years = f64::NAN;
        let req = make_requirements("python", "", "");
        let err = extract(&[candidate], &req).unwrap_err();
        assert!(matches!(err, EngineError::FatalExtraction { .. }));
    }

    #[test]
    fn test_empty_pool_yields_empty_matrix() {
        let req = make_requirements("python", "", "");
        let fs = extract(&[], &req).unwrap();
        assert!(fs.is_empty());
        assert_eq!(fs.matrix.nrows(), 0);
        assert_eq!(fs.matrix.ncols(), NUM_FEATURES);
    }
}
