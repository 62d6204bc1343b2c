//! Core data model: Source, Citation, Claim, Contradiction, TimelineTask,
//! quality-gate and repair records.
//!
//! Claims are modeled as a tagged record with a closed `ClaimType`
//! discriminant rather than the teacher's duck-typed `AtomicClaim` /
//! open-ended `ClaimType` enum (compare `claim-extraction/src/types.rs`),
//! per the Design Notes in spec.md §9: this removes the "unknown field
//! silently discarded" failure mode the original dictionary-based claims
//! were prone to.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Closed set of upstream reasoning providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    Internal,
    Gemini,
    Claude,
    Gpt,
    Grok,
    Unknown,
}

impl Provider {
    /// Providers treated as LLM output for the circular-reference audit check.
    pub fn is_llm(&self) -> bool {
        !matches!(self, Provider::Internal)
    }
}

/// A primary artifact, immutable after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub provider: Provider,
    pub content: String,
    pub size: usize,
    pub mime_type: String,
}

impl Source {
    pub fn len_chars(&self) -> usize {
        self.content.chars().count()
    }
}

/// Read-only collection of primary sources, keyed by document name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSet {
    sources: HashMap<String, Source>,
}

impl SourceSet {
    pub fn new(sources: Vec<Source>) -> Self {
        Self {
            sources: sources.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Source> {
        self.sources.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }
}

/// A primary-source reference. Absent for inferred claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub document_name: String,
    pub start_char: usize,
    pub end_char: usize,
    pub exact_quote: String,
    pub retrieved_at: DateTime<Utc>,
}

/// The special token that short-circuits citation verification for
/// inferred claims.
pub const INFERRED_DOCUMENT_TOKEN: &str = "inferred";

/// Closed set of claim types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Duration,
    StartDate,
    EndDate,
    Deadline,
    Dependency,
    Requirement,
    Resource,
    Financial,
    Generic,
}

/// Whether a claim was directly asserted by a source (requires a
/// citation) or derived by the upstream reasoner (requires a rationale).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Explicit,
    Inferred,
}

/// Provenance of one claim: which document, which provider, optional citation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimProvenance {
    pub document_name: String,
    pub provider: Provider,
    pub citation: Option<Citation>,
}

/// The prior confidence and the per-factor contribution trail left by the
/// calibrator (spec.md §4.5: "preserves the original confidence ... and
/// exposes per-factor contributions for explainability").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationMetadata {
    pub original_confidence: f64,
    pub factors: Vec<CalibrationFactor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationFactor {
    pub name: String,
    pub multiplier: f64,
}

/// A review flag attached by a repair strategy when a blocker cannot be
/// fully resolved without dropping data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewFlagType {
    LowConfidence,
    ManualReviewRequired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFlag {
    pub flag_type: ReviewFlagType,
    pub detail: String,
}

/// An atomic assertion with provenance, type, confidence, and optional
/// citation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    /// Deterministic hash id — see `extractor::claim_id`.
    pub id: String,
    pub task_id: Option<Uuid>,
    pub text: String,
    pub claim_type: ClaimType,
    pub origin: Origin,
    pub confidence: f64,
    pub source: ClaimProvenance,
    pub contradictions: Vec<Uuid>,
    pub validated_at: DateTime<Utc>,
    pub calibration_metadata: Option<CalibrationMetadata>,
    pub review_flags: Vec<ReviewFlag>,
    pub inference_rationale: Option<String>,
    pub supporting_facts: Vec<String>,
}

impl Claim {
    pub fn has_citation(&self) -> bool {
        self.source.citation.is_some()
    }
}

/// Closed set of contradiction categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionType {
    Numerical,
    Polarity,
    Temporal,
    Definitional,
    Logical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// The values the detector extracted to justify a contradiction; kept as
/// free-form strings because the extracted unit varies by type (days,
/// USD, percent, ISO date, bare keyword).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContradictionValues {
    pub left: String,
    pub right: String,
    pub metric: String,
}

/// Resolution Matrix verdict for one contradiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    AcceptExplicitReduceOtherConfidence,
    AcceptHigherFlagLower,
    AcceptRegulatoryRejectOther,
    FlagBothForManualReview,
    AverageOrFlag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub action: ResolutionAction,
    /// Id of the preferred claim, or `None` when no clear winner exists.
    pub preferred_claim: Option<String>,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contradiction {
    pub id: Uuid,
    pub contradiction_type: ContradictionType,
    pub severity: Severity,
    pub claim_pair: (String, String),
    pub values: ContradictionValues,
    pub resolution: Resolution,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_strategy: Option<String>,
}

/// One field of a timeline task, carrying its own confidence and citations
/// (spec.md §3: "Each field carrying a value carries its own confidence
/// and optional citation list").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldValue<T> {
    pub value: T,
    pub confidence: f64,
    pub origin: Origin,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulatoryRequirement {
    pub is_required: bool,
    pub confidence: f64,
    pub origin: Origin,
    pub regulation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRef {
    pub task_id: Uuid,
    pub confidence: f64,
    pub origin: Origin,
}

/// Structured task in the timeline pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineTask {
    pub id: Uuid,
    pub name: String,
    pub origin: Origin,
    pub confidence: f64,
    pub duration_days: Option<FieldValue<f64>>,
    pub start_date: Option<FieldValue<NaiveDate>>,
    pub end_date: Option<FieldValue<NaiveDate>>,
    pub dependencies: Vec<DependencyRef>,
    pub regulatory_requirement: Option<RegulatoryRequirement>,
    pub financial_impact: Vec<FieldValue<f64>>,
    pub source_citations: Vec<Citation>,
    pub review_flags: Vec<ReviewFlag>,
}

/// Per-gate outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityGateResult {
    pub name: String,
    pub passed: bool,
    pub score: f64,
    pub threshold: f64,
    pub blocker: bool,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateGateResult {
    pub passed: bool,
    pub failures: Vec<QualityGateResult>,
    pub warnings: Vec<QualityGateResult>,
    pub summary: String,
}

/// Closed set of repair actions, one per default gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairActionKind {
    AddedInferenceRationale,
    AcceptAndReduceConfidence,
    AcceptAndReject,
    FlagBothForManualReview,
    BoostToMinimum,
    FlagLowConfidence,
    RemovedLowConfidenceTask,
    RegeneratedId,
    DefaultedOrigin,
    ClampedField,
    DroppedUnknownEnum,
    SynthesizedRegulatoryRequirement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairAction {
    pub gate: String,
    pub action: RepairActionKind,
    pub targets: Vec<String>,
    pub changes: Vec<String>,
}

/// One applied penalty in a provenance audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPenalty {
    pub name: String,
    pub points: f64,
    pub reason: String,
}

/// Outcome of auditing one claim's provenance chain. Both a 0-100 and a
/// 0-1 representation are carried since different consumers (gates vs.
/// reporting) expect different scales.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceAuditResult {
    pub claim_id: String,
    pub score_100: f64,
    pub score_unit: f64,
    pub valid: bool,
    pub penalties: Vec<AuditPenalty>,
    /// Non-scoring structural anomalies worth surfacing to a reviewer.
    pub tampering_indicators: Vec<String>,
}
