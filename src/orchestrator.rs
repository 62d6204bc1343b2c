//! Orchestrator: wires every stage into the two
//! pipeline flows and assembles the user-visible result. Grounded
//! directly on `ClaimExtractionAndVerificationProcessor::process_sentence`
//! in `claim-extraction/src/lib.rs` — sequential stage calls, per-stage
//! timing and `tracing` instrumentation, non-fatal errors accumulated
//! into a list instead of aborting the request, except the one case
//! (invalid input at extraction) that does abort.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::auditor::ProvenanceAuditor;
use crate::calibrator::ConfidenceCalibrator;
use crate::config::EngineConfig;
use crate::detector::ContradictionDetector;
use crate::error::EngineError;
use crate::extractor::{ClaimExtractor, RawClaim};
use crate::gates::QualityGateManager;
use crate::ledger::ClaimLedger;
use crate::metrics::{MetricName, MetricsCollector, MetricsSnapshot};
use crate::repair::{RepairEngine, RepairOutcome};
use crate::types::{AggregateGateResult, Claim, Contradiction, Source, SourceSet, TimelineTask};
use crate::verifier::CitationVerifier;

const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);
const DETECT_TIMEOUT: Duration = Duration::from_secs(30);
const AUDIT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Cooperative cancellation signal shared across stages within one
/// request. Checked between stages rather than inside tight loops.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub enum ValidationInput {
    Timeline(TimelineTask),
    Documents(Vec<(Source, Vec<RawClaim>)>),
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub claims: Vec<Claim>,
    pub contradictions: Vec<Contradiction>,
    pub gate_result: AggregateGateResult,
    pub repair_outcomes: Vec<RepairOutcomeSummary>,
    /// Claim ids with no unresolved contradiction and a passing schema.
    pub verified_claim_ids: Vec<String>,
    /// Claim ids attached to an unresolved or flagged contradiction.
    pub disputed_claim_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RepairOutcomeSummary {
    pub gate: String,
    pub status: String,
}

impl From<&RepairOutcome> for RepairOutcomeSummary {
    fn from(outcome: &RepairOutcome) -> Self {
        Self {
            gate: outcome.gate.clone(),
            status: format!("{:?}", outcome.status),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineResult {
    pub success: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub artifact: Option<Artifact>,
    pub metrics: MetricsSnapshot,
}

pub struct Orchestrator {
    extractor: ClaimExtractor,
    detector: ContradictionDetector,
    auditor: ProvenanceAuditor,
    calibrator: ConfidenceCalibrator,
    gates: QualityGateManager,
    repair: RepairEngine,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self {
            extractor: ClaimExtractor::new(),
            detector: ContradictionDetector::new(),
            auditor: ProvenanceAuditor::new(),
            calibrator: ConfidenceCalibrator::new(),
            gates: QualityGateManager::new(),
            repair: RepairEngine::new(),
        }
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn validate(
        &self,
        input: ValidationInput,
        sources: SourceSet,
        config: EngineConfig,
        metrics: &MetricsCollector,
        cancellation: CancellationToken,
    ) -> EngineResult {
        let started = Instant::now();
        let result = tokio::time::timeout(
            REQUEST_TIMEOUT,
            self.run(input, sources, config, metrics, cancellation),
        )
        .await;

        let outcome = match result {
            Ok(engine_result) => engine_result,
            Err(_) => EngineResult {
                success: false,
                errors: vec!["request exceeded the overall timeout".to_string()],
                warnings: Vec::new(),
                artifact: None,
                metrics: metrics.snapshot(),
            },
        };

        metrics.record(MetricName::ValidationTimeMs, started.elapsed().as_millis() as f64);
        outcome
    }

    async fn run(
        &self,
        input: ValidationInput,
        sources: SourceSet,
        config: EngineConfig,
        metrics: &MetricsCollector,
        cancellation: CancellationToken,
    ) -> EngineResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // Stage 1: extraction. Only InvalidInput is fatal here.
        let claims = match self.extract(&input, &sources) {
            Ok(claims) => claims,
            Err(err) => {
                return EngineResult {
                    success: false,
                    errors: vec![err.to_string()],
                    warnings,
                    artifact: None,
                    metrics: metrics.snapshot(),
                };
            }
        };
        info!(claim_count = claims.len(), "extraction complete");

        let mut ledger = ClaimLedger::from_claims(claims);

        if cancellation.is_cancelled() {
            return cancelled_result(metrics);
        }

        // Stage 2: citation verification, batched with a per-batch timeout.
        self.verify_citations(&ledger, &sources, &config, &mut errors, &mut warnings)
            .await;

        if cancellation.is_cancelled() {
            return cancelled_result(metrics);
        }

        // Stage 3: contradiction detection over the shared ledger.
        let detector = &self.detector;
        let detect_config = config.clone();
        let pairs_before = ledger.len();
        let detect_result = tokio::time::timeout(DETECT_TIMEOUT, async {
            // Detection is CPU-bound and synchronous; the timeout here
            // bounds pathological pair counts rather than I/O.
            detector.detect_all(&mut ledger, &detect_config);
        })
        .await;
        if detect_result.is_err() {
            warn!(claims = pairs_before, "contradiction detection timed out");
            warnings.push("contradiction detection timed out; partial results used".to_string());
        }
        debug!(
            contradictions = ledger.contradictions().count(),
            "detection complete"
        );

        if cancellation.is_cancelled() {
            return cancelled_result(metrics);
        }

        // Stage 4: provenance audit.
        let audits = match tokio::time::timeout(AUDIT_TIMEOUT, async {
            self.auditor.audit_all(&ledger, &sources, &config)
        })
        .await
        {
            Ok(audits) => audits,
            Err(_) => {
                warnings.push("provenance audit timed out; scores unavailable this pass".to_string());
                Vec::new()
            }
        };

        // Stage 5: calibration.
        self.calibrator.calibrate_all(&mut ledger, &audits);

        // Stage 6: gate evaluation.
        let mut gate_result = self.gates.evaluate(&ledger, &audits, &config);
        let mut repair_outcomes = Vec::new();

        // Stage 7: repair + single re-evaluation, only if blockers failed
        // or warnings were raised.
        if !gate_result.passed || !gate_result.warnings.is_empty() {
            let (repaired_result, outcomes) = self.repair.repair_and_reevaluate(
                &mut ledger,
                &sources,
                &config,
                &self.gates,
                &self.auditor,
            );
            gate_result = repaired_result;
            repair_outcomes = outcomes.iter().map(RepairOutcomeSummary::from).collect();
        }

        for failure in &gate_result.failures {
            warnings.push(format!("blocker gate failed: {} ({})", failure.name, failure.details));
        }
        for warning in &gate_result.warnings {
            warnings.push(format!("gate warning: {} ({})", warning.name, warning.details));
        }

        self.record_metrics(&ledger, &gate_result, &audits, metrics);

        let (verified, disputed) = partition_verified_disputed(&ledger);
        let schema_failed = gate_result
            .failures
            .iter()
            .any(|f| f.name == "SCHEMA_COMPLIANCE");

        let claims: Vec<Claim> = ledger.iter().cloned().collect();
        let contradictions: Vec<Contradiction> = ledger.contradictions().cloned().collect();

        EngineResult {
            success: !schema_failed,
            errors,
            warnings,
            artifact: Some(Artifact {
                claims,
                contradictions,
                gate_result,
                repair_outcomes,
                verified_claim_ids: verified,
                disputed_claim_ids: disputed,
            }),
            metrics: metrics.snapshot(),
        }
    }

    fn extract(&self, input: &ValidationInput, sources: &SourceSet) -> Result<Vec<Claim>, EngineError> {
        match input {
            ValidationInput::Timeline(task) => self.extractor.extract_from_task(task),
            ValidationInput::Documents(documents) => {
                use rayon::prelude::*;
                let results: Vec<Result<Vec<Claim>, EngineError>> = documents
                    .par_iter()
                    .map(|(source, raw_claims)| {
                        if !sources.contains(&source.name) {
                            return Err(EngineError::SourceMissing(source.name.clone()));
                        }
                        self.extractor.extract_from_document(source, raw_claims)
                    })
                    .collect();

                let mut all_claims = Vec::new();
                for result in results {
                    all_claims.extend(result?);
                }
                Ok(all_claims)
            }
        }
    }

    async fn verify_citations(
        &self,
        ledger: &ClaimLedger,
        sources: &SourceSet,
        config: &EngineConfig,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        let citations: Vec<_> = ledger
            .iter()
            .filter_map(|c| c.source.citation.clone())
            .collect();
        if citations.is_empty() {
            return;
        }

        let verifier = CitationVerifier::new(config);
        let batch = tokio::time::timeout(VERIFY_TIMEOUT, async {
            verifier.batch_verify(&citations, sources)
        })
        .await;

        match batch {
            Ok((_, summary)) => {
                if summary.invalid > 0 {
                    warnings.push(format!(
                        "{} of {} citations failed verification",
                        summary.invalid, summary.total
                    ));
                }
            }
            Err(_) => {
                errors.push("citation verification timed out for this batch".to_string());
            }
        }
    }

    fn record_metrics(
        &self,
        ledger: &ClaimLedger,
        gate_result: &AggregateGateResult,
        audits: &[crate::types::ProvenanceAuditResult],
        metrics: &MetricsCollector,
    ) {
        let total = ledger.len().max(1) as f64;
        let cited = ledger.iter().filter(|c| c.has_citation()).count() as f64;
        metrics.record(MetricName::CitationCoverage, cited / total);

        let contradiction_rate = ledger.contradictions().count() as f64 / total;
        metrics.record(MetricName::ContradictionRate, contradiction_rate);

        let avg_confidence = ledger.iter().map(|c| c.confidence).sum::<f64>() / total;
        metrics.record(MetricName::AverageConfidence, avg_confidence);

        let variance = ledger
            .iter()
            .map(|c| (c.confidence - avg_confidence).powi(2))
            .sum::<f64>()
            / total;
        metrics.record(MetricName::ConfidenceVariance, variance);

        if !audits.is_empty() {
            let avg_provenance = audits.iter().map(|a| a.score_unit).sum::<f64>() / audits.len() as f64;
            metrics.record(MetricName::ProvenanceScore, avg_provenance);
            let pass_rate = audits.iter().filter(|a| a.valid).count() as f64 / audits.len() as f64;
            metrics.record(MetricName::AuditPassRate, pass_rate);
        }

        let gate_total = (gate_result.failures.len() + gate_result.warnings.len() + 1) as f64;
        metrics.record(
            MetricName::GateFailureRate,
            gate_result.failures.len() as f64 / gate_total,
        );

        let regulatory_claims = ledger
            .iter()
            .filter(|c| c.claim_type == crate::types::ClaimType::Requirement)
            .count();
        if regulatory_claims > 0 {
            let flagged = ledger
                .iter()
                .filter(|c| {
                    c.claim_type == crate::types::ClaimType::Requirement
                        && (c.has_citation() || !c.review_flags.is_empty())
                })
                .count();
            metrics.record(
                MetricName::RegulatoryAccuracy,
                flagged as f64 / regulatory_claims as f64,
            );
        }

        let explicit_with_rationale_or_citation = ledger
            .iter()
            .filter(|c| c.has_citation() || c.inference_rationale.is_some())
            .count() as f64;
        metrics.record(MetricName::FactRatio, explicit_with_rationale_or_citation / total);
    }
}

fn cancelled_result(metrics: &MetricsCollector) -> EngineResult {
    EngineResult {
        success: false,
        errors: vec!["request cancelled".to_string()],
        warnings: Vec::new(),
        artifact: None,
        metrics: metrics.snapshot(),
    }
}

/// Post-pipeline "verified vs disputed" partition (document-synthesis
/// flow). A claim is disputed if it is party to a contradiction with no
/// resolution strategy recorded yet.
fn partition_verified_disputed(ledger: &ClaimLedger) -> (Vec<String>, Vec<String>) {
    let mut verified = Vec::new();
    let mut disputed = Vec::new();
    for claim in ledger.iter() {
        let is_disputed = claim.contradictions.iter().any(|id| {
            ledger
                .contradiction(*id)
                .map(|c| c.resolution.preferred_claim.is_none() && c.resolution_strategy.is_none())
                .unwrap_or(false)
        });
        if is_disputed {
            disputed.push(claim.id.clone());
        } else {
            verified.push(claim.id.clone());
        }
    }
    (verified, disputed)
}
