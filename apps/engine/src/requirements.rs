//! Role requirement aggregation.
//!
//! Projects describe their roles with comma-separated free text. The engine
//! is responsible for turning that into a [`RoleRequirementSet`]: the union
//! of required skill and knowledge terms across all roles plus the highest
//! experience floor any role states. The set is rebuilt on every scoring run
//! and never persisted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One role of a project, as stored by the project-management layer.
/// `skills_text` and `knowledge_text` are comma-separated term lists;
/// `experience_text` is a free-text phrase such as "3 años" or "5 years".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub role: String,
    #[serde(default)]
    pub skills_text: String,
    #[serde(default)]
    pub knowledge_text: String,
    #[serde(default)]
    pub experience_text: String,
}

/// Aggregated requirements over all roles of one project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleRequirementSet {
    /// Required skill terms, lower-cased and trimmed.
    pub skills: BTreeSet<String>,
    /// Required knowledge terms, lower-cased and trimmed.
    pub knowledge: BTreeSet<String>,
    /// Highest "N years" floor stated by any role; 0 when none states one.
    pub min_experience_years: f64,
}

impl RoleRequirementSet {
    pub fn from_roles(roles: &[RoleSpec]) -> Self {
        let mut set = Self::default();
        for role in roles {
            set.skills.extend(split_terms(&role.skills_text));
            set.knowledge.extend(split_terms(&role.knowledge_text));
            if let Some(years) = parse_min_years(&role.experience_text) {
                set.min_experience_years = set.min_experience_years.max(years);
            }
        }
        set
    }
}

/// Splits a comma-separated term list, lower-casing and trimming each term
/// and dropping empties.
fn split_terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.to_lowercase()
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .into_iter()
}

/// Extracts the largest integer from a phrase that mentions years.
/// The source data is Spanish ("3 años de experiencia") but scraped profiles
/// also arrive in English, so both tokens are accepted.
fn parse_min_years(text: &str) -> Option<f64> {
    let lower = text.to_lowercase();
    let mentions_years = ["años", "año", "years", "year"]
        .iter()
        .any(|t| lower.contains(t));
    if !mentions_years {
        return None;
    }
    lower
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|tok| tok.parse::<u32>().ok())
        .max()
        .map(f64::from)
}
