//! Matching engine — scores and ranks candidate profiles against the
//! aggregated role requirements of a project.
//!
//! One call to [`recommend`] runs the whole pipeline: feature extraction →
//! synthetic labeling → ensemble training → ranking. Every run constructs its
//! own fitted state (scaler, selector, reducer, committee), so concurrent
//! runs never share statistics. The web layer, persistence, and report
//! rendering live outside this crate; callers hand in candidate profiles and
//! raw role records and get back an ordered, confidence-tiered shortlist.

mod stats;

pub mod engine;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod profile;
pub mod ranker;
pub mod requirements;

pub use engine::{recommend, EngineConfig, Profile, Recommendations};
pub use error::EngineError;
pub use profile::{CandidateProfile, ExperienceRecord, KnowledgeItem, Skill, StudyRecord};
pub use ranker::{Confidence, RecommendationResult};
pub use requirements::{RoleRequirementSet, RoleSpec};
