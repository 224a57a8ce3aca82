//! Candidate data model.
//!
//! These rows are owned by the profile-management layer; the engine only
//! reads them. Every relation is an explicit (possibly empty) collection —
//! a candidate with no studies simply carries an empty `studies` vec.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A skill entry. The source system stores skills as free text with an
/// optional proficiency and category, so both are `Option` here; extraction
/// substitutes the documented defaults (level 3, category "general").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    /// Free-text description of how the skill was exercised.
    #[serde(default)]
    pub experience_notes: String,
    pub level: Option<u8>,
    pub category: Option<String>,
}

/// A knowledge area with a 1–5 proficiency level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub name: String,
    pub level: u8,
}

/// A completed study: field, education level on a 1–6 scale, graduation year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyRecord {
    pub field: String,
    pub level: u8,
    pub year: i32,
}

/// A past role with its duration in years and a free-text activity summary.
/// Records are supplied in chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceRecord {
    pub role: String,
    pub years: f64,
    pub activities: String,
}

/// A full candidate profile as handed over by the data layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub knowledge: Vec<KnowledgeItem>,
    #[serde(default)]
    pub studies: Vec<StudyRecord>,
    #[serde(default)]
    pub experience: Vec<ExperienceRecord>,
}

impl Skill {
    /// Convenience constructor for a bare named skill.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            experience_notes: String::new(),
            level: None,
            category: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_collections_deserialize_as_empty() {
        let json = r#"{
            "id": "7f0b6e68-6f2e-4d0c-9b56-0c7e6a3e2f11",
            "name": "Ada"
        }"#;
        let profile: CandidateProfile = serde_json::from_str(json).unwrap();
        assert!(profile.skills.is_empty());
        assert!(profile.knowledge.is_empty());
        assert!(profile.studies.is_empty());
        assert!(profile.experience.is_empty());
    }

    #[test]
    fn test_skill_optional_fields_deserialize() {
        let json = r#"{"name": "rust", "level": 4}"#;
        let skill: Skill = serde_json::from_str(json).unwrap();
        assert_eq!(skill.level, Some(4));
        assert_eq!(skill.category, None);
        assert!(skill.experience_notes.is_empty());
    }
}
