//! Semantic Repair Engine: one idempotent strategy per
//! default gate, run at most once per gate per request, followed by a
//! single re-evaluation pass. Modeled on the teacher's stage-struct
//! orchestration in `claim-extraction/src/lib.rs`, where each stage
//! either advances the pipeline or records a non-fatal error rather than
//! aborting the whole run.

use chrono::Utc;

use crate::auditor::ProvenanceAuditor;
use crate::config::EngineConfig;
use crate::gates::QualityGateManager;
use crate::ledger::ClaimLedger;
use crate::types::{
    AggregateGateResult, Origin, RepairAction, RepairActionKind, ReviewFlag, ReviewFlagType, Severity,
    SourceSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStatus {
    Pending,
    Repairing,
    Repaired,
    Unrepairable,
}

#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub gate: String,
    pub status: RepairStatus,
    pub action: Option<RepairAction>,
}

#[derive(Debug, Default)]
pub struct RepairEngine;

impl RepairEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run one repair pass per failing/warning gate (in the gate
    /// manager's declaration order), then re-evaluate exactly once.
    pub fn repair_and_reevaluate(
        &self,
        ledger: &mut ClaimLedger,
        sources: &SourceSet,
        config: &EngineConfig,
        gate_manager: &QualityGateManager,
        auditor: &ProvenanceAuditor,
    ) -> (AggregateGateResult, Vec<RepairOutcome>) {
        let audits = auditor.audit_all(ledger, sources, config);
        let initial = gate_manager.evaluate(ledger, &audits, config);

        let mut outcomes = Vec::new();
        for result in initial.failures.iter().chain(initial.warnings.iter()) {
            let outcome = match result.name.as_str() {
                "CITATION_COVERAGE" => self.repair_citation_coverage(ledger, config),
                "CONTRADICTION_SEVERITY" => self.repair_contradiction_severity(ledger),
                "CONFIDENCE_MINIMUM" => self.repair_confidence_minimum(ledger, config),
                "SCHEMA_COMPLIANCE" => self.repair_schema_compliance(ledger),
                "REGULATORY_FLAGS" => self.repair_regulatory_flags(ledger),
                "PROVENANCE_QUALITY" => self.repair_provenance_quality(ledger, &audits, config),
                other => RepairOutcome {
                    gate: other.to_string(),
                    status: RepairStatus::Unrepairable,
                    action: None,
                },
            };
            outcomes.push(outcome);
        }

        let final_audits = auditor.audit_all(ledger, sources, config);
        let final_result = gate_manager.evaluate(ledger, &final_audits, config);
        (final_result, outcomes)
    }

    fn repair_citation_coverage(&self, ledger: &mut ClaimLedger, config: &EngineConfig) -> RepairOutcome {
        let uncited_explicit: Vec<String> = ledger
            .iter()
            .filter(|c| c.origin == Origin::Explicit && !c.has_citation())
            .map(|c| c.id.clone())
            .collect();

        if uncited_explicit.is_empty() {
            return RepairOutcome {
                gate: "CITATION_COVERAGE".to_string(),
                status: RepairStatus::Repaired,
                action: None,
            };
        }

        let mut changes = Vec::new();
        for id in &uncited_explicit {
            if let Some(claim) = ledger.get_mut(id) {
                claim.origin = Origin::Inferred;
                claim.inference_rationale =
                    Some("downgraded from explicit: no supporting citation was found".to_string());
                claim.confidence = claim.confidence.min(0.85).max(config.min_confidence);
                claim.review_flags.push(ReviewFlag {
                    flag_type: ReviewFlagType::ManualReviewRequired,
                    detail: "citation missing at extraction time; origin downgraded".to_string(),
                });
                changes.push(format!("{id}: explicit -> inferred"));
            }
        }

        RepairOutcome {
            gate: "CITATION_COVERAGE".to_string(),
            status: RepairStatus::Repaired,
            action: Some(RepairAction {
                gate: "CITATION_COVERAGE".to_string(),
                action: RepairActionKind::AddedInferenceRationale,
                targets: uncited_explicit,
                changes,
            }),
        }
    }

    fn repair_contradiction_severity(&self, ledger: &mut ClaimLedger) -> RepairOutcome {
        let unresolved: Vec<uuid::Uuid> = ledger
            .contradictions()
            .filter(|c| {
                c.severity == Severity::High
                    && c.resolution.preferred_claim.is_none()
                    && c.resolution_strategy.is_none()
            })
            .map(|c| c.id)
            .collect();

        if unresolved.is_empty() {
            return RepairOutcome {
                gate: "CONTRADICTION_SEVERITY".to_string(),
                status: RepairStatus::Repaired,
                action: None,
            };
        }

        let mut changes = Vec::new();
        for id in &unresolved {
            let pair = ledger.contradiction(*id).map(|c| c.claim_pair.clone());
            if let Some((a_id, b_id)) = pair {
                let avg = {
                    let a_conf = ledger.get(&a_id).map(|c| c.confidence).unwrap_or(0.0);
                    let b_conf = ledger.get(&b_id).map(|c| c.confidence).unwrap_or(0.0);
                    (a_conf + b_conf) / 2.0
                };
                if let Some(a) = ledger.get_mut(&a_id) {
                    a.confidence = avg;
                    a.review_flags.push(ReviewFlag {
                        flag_type: ReviewFlagType::ManualReviewRequired,
                        detail: "confidence averaged to resolve a high-severity contradiction".to_string(),
                    });
                }
                if let Some(b) = ledger.get_mut(&b_id) {
                    b.confidence = avg;
                    b.review_flags.push(ReviewFlag {
                        flag_type: ReviewFlagType::ManualReviewRequired,
                        detail: "confidence averaged to resolve a high-severity contradiction".to_string(),
                    });
                }
                changes.push(format!("{a_id}/{b_id}: confidence averaged to {avg:.2}"));
            }
            if let Some(c) = ledger.contradiction_mut(*id) {
                c.resolution_strategy = Some("repaired_by_averaging".to_string());
                c.resolved_at = Some(Utc::now());
            }
        }

        RepairOutcome {
            gate: "CONTRADICTION_SEVERITY".to_string(),
            status: RepairStatus::Repaired,
            action: Some(RepairAction {
                gate: "CONTRADICTION_SEVERITY".to_string(),
                action: RepairActionKind::FlagBothForManualReview,
                targets: unresolved.iter().map(|id| id.to_string()).collect(),
                changes,
            }),
        }
    }

    fn repair_confidence_minimum(&self, ledger: &mut ClaimLedger, config: &EngineConfig) -> RepairOutcome {
        let below: Vec<String> = ledger
            .iter()
            .filter(|c| c.confidence < config.min_confidence)
            .map(|c| c.id.clone())
            .collect();

        if below.is_empty() {
            return RepairOutcome {
                gate: "CONFIDENCE_MINIMUM".to_string(),
                status: RepairStatus::Repaired,
                action: None,
            };
        }

        let mut changes = Vec::new();
        for id in &below {
            if let Some(claim) = ledger.get_mut(id) {
                let before = claim.confidence;
                claim.confidence = config.min_confidence;
                claim.review_flags.push(ReviewFlag {
                    flag_type: ReviewFlagType::LowConfidence,
                    detail: format!("boosted from {before:.2} to the configured minimum"),
                });
                changes.push(format!("{id}: {before:.2} -> {:.2}", config.min_confidence));
            }
        }

        RepairOutcome {
            gate: "CONFIDENCE_MINIMUM".to_string(),
            status: RepairStatus::Repaired,
            action: Some(RepairAction {
                gate: "CONFIDENCE_MINIMUM".to_string(),
                action: RepairActionKind::BoostToMinimum,
                targets: below,
                changes,
            }),
        }
    }

    fn repair_schema_compliance(&self, ledger: &mut ClaimLedger) -> RepairOutcome {
        let ids: Vec<String> = ledger.iter().map(|c| c.id.clone()).collect();
        let mut changes = Vec::new();
        let mut targets = Vec::new();

        for id in ids {
            let Some(claim) = ledger.get_mut(&id) else { continue };
            let mut touched = false;
            if !(0.0..=1.0).contains(&claim.confidence) {
                let before = claim.confidence;
                claim.confidence = claim.confidence.clamp(0.0, 1.0);
                changes.push(format!("{id}: confidence {before} -> {}", claim.confidence));
                touched = true;
            }
            if let Some(citation) = &claim.source.citation {
                if citation.start_char >= citation.end_char {
                    claim.source.citation = None;
                    changes.push(format!("{id}: dropped malformed citation range"));
                    touched = true;
                }
            }
            if touched {
                targets.push(id);
            }
        }

        if targets.is_empty() {
            return RepairOutcome {
                gate: "SCHEMA_COMPLIANCE".to_string(),
                status: RepairStatus::Repaired,
                action: None,
            };
        }

        RepairOutcome {
            gate: "SCHEMA_COMPLIANCE".to_string(),
            status: RepairStatus::Repaired,
            action: Some(RepairAction {
                gate: "SCHEMA_COMPLIANCE".to_string(),
                action: RepairActionKind::ClampedField,
                targets,
                changes,
            }),
        }
    }

    fn repair_regulatory_flags(&self, ledger: &mut ClaimLedger) -> RepairOutcome {
        let unflagged: Vec<String> = ledger
            .iter()
            .filter(|c| {
                c.claim_type == crate::types::ClaimType::Requirement
                    && !c.has_citation()
                    && c.review_flags.is_empty()
            })
            .map(|c| c.id.clone())
            .collect();

        if unflagged.is_empty() {
            return RepairOutcome {
                gate: "REGULATORY_FLAGS".to_string(),
                status: RepairStatus::Repaired,
                action: None,
            };
        }

        for id in &unflagged {
            if let Some(claim) = ledger.get_mut(id) {
                claim.review_flags.push(ReviewFlag {
                    flag_type: ReviewFlagType::ManualReviewRequired,
                    detail: "regulatory requirement claim lacks a citation".to_string(),
                });
            }
        }

        RepairOutcome {
            gate: "REGULATORY_FLAGS".to_string(),
            status: RepairStatus::Repaired,
            action: Some(RepairAction {
                gate: "REGULATORY_FLAGS".to_string(),
                action: RepairActionKind::FlagLowConfidence,
                targets: unflagged,
                changes: vec!["attached manual-review flag".to_string()],
            }),
        }
    }

    fn repair_provenance_quality(
        &self,
        ledger: &mut ClaimLedger,
        audits: &[crate::types::ProvenanceAuditResult],
        config: &EngineConfig,
    ) -> RepairOutcome {
        let weak: Vec<String> = audits
            .iter()
            .filter(|a| a.score_100 < config.provenance_quality_threshold)
            .map(|a| a.claim_id.clone())
            .collect();

        if weak.is_empty() {
            return RepairOutcome {
                gate: "PROVENANCE_QUALITY".to_string(),
                status: RepairStatus::Repaired,
                action: None,
            };
        }

        for id in &weak {
            if let Some(claim) = ledger.get_mut(id) {
                claim.review_flags.push(ReviewFlag {
                    flag_type: ReviewFlagType::ManualReviewRequired,
                    detail: "weak provenance score surfaced for manual review".to_string(),
                });
            }
        }

        RepairOutcome {
            gate: "PROVENANCE_QUALITY".to_string(),
            status: RepairStatus::Unrepairable,
            action: Some(RepairAction {
                gate: "PROVENANCE_QUALITY".to_string(),
                action: RepairActionKind::FlagLowConfidence,
                targets: weak,
                changes: vec!["flagged for manual review; provenance cannot be fabricated".to_string()],
            }),
        }
    }
}
