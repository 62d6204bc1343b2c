//! Error taxonomy for the claim validation engine.
//!
//! Mirrors the teacher's per-stage `thiserror` enums (see
//! `ClaimExtractionError` in the original claim-extraction crate) but
//! collapses them into the single taxonomy spec.md §7 requires so every
//! stage speaks the same error vocabulary to the orchestrator.

use uuid::Uuid;

/// Engine-wide error taxonomy. Not tied to any particular stage — the
/// orchestrator aggregates these into `EngineResult.errors` rather than
/// propagating a stage failure as a hard `Err` except for `InvalidInput`
/// at the extractor, which aborts the request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("source missing: {0}")]
    SourceMissing(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("resolution unresolved for contradiction {0}")]
    ResolutionUnresolved(Uuid),

    #[error("quality gate blocked: {0:?}")]
    GateBlocked(Vec<String>),

    #[error("internal stage failure: {0}")]
    StageFatal(String),
}

impl EngineError {
    /// Whether this error should abort the whole request (only
    /// `InvalidInput` at the extractor does, per spec.md §7).
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::InvalidInput(_))
    }
}

pub type StageResult<T> = Result<T, EngineError>;
