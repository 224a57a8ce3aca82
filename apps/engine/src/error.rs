use thiserror::Error;

/// Top-level error returned to callers of the engine.
///
/// This is deliberately small: of the whole failure taxonomy, only an
/// unusable candidate record aborts a run. Missing collections degrade to
/// empty ones, an empty pool yields an empty result list, and model or
/// pipeline-stage failures are absorbed by the ensemble's fallback paths.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A candidate record contains values no feature vector can be built
    /// from (non-finite durations, levels, or years).
    #[error("cannot featurize candidate {candidate_id}: {reason}")]
    FatalExtraction {
        candidate_id: uuid::Uuid,
        reason: String,
    },
}
