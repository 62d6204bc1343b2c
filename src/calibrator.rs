//! Confidence Calibrator: a seven-step multiplicative
//! formula (spec.md §4.5) that replaces a claim's raw confidence with a
//! calibrated value in `[0.30, 0.99]`, while preserving the original and
//! the per-factor trail for explainability. Modeled on the habit of
//! recording an auditable trail alongside a computed number (compare
//! `ProcessingMetadata` in `claim-extraction/src/types.rs`), generalized
//! here into a closed list of named multipliers rather than free-form
//! metadata.

use once_cell::sync::Lazy;

use crate::ledger::ClaimLedger;
use crate::resolution::REGULATORY_KEYWORDS;
use crate::types::{
    CalibrationFactor, CalibrationMetadata, Claim, ClaimType, Origin, Provider,
    ProvenanceAuditResult, Severity,
};

const MIN_CONFIDENCE: f64 = 0.30;
const MAX_CONFIDENCE: f64 = 0.99;

/// Keywords that mark a citation as a peer-reviewed source.
static PEER_REVIEWED_KEYWORDS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["journal", "peer-reviewed", "peer review", "study"]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CitationCategory {
    RegulatoryDoc,
    PeerReviewed,
    InternalDoc,
    LlmOutput,
    Uncited,
}

fn classify_citation(claim: &Claim) -> CitationCategory {
    if !claim.has_citation() {
        return CitationCategory::Uncited;
    }
    let haystack = format!(
        "{} {}",
        claim.text.to_lowercase(),
        claim.source.document_name.to_lowercase()
    );
    if REGULATORY_KEYWORDS.iter().any(|kw| haystack.contains(kw)) {
        return CitationCategory::RegulatoryDoc;
    }
    if PEER_REVIEWED_KEYWORDS.iter().any(|kw| haystack.contains(kw)) {
        return CitationCategory::PeerReviewed;
    }
    if claim.source.provider == Provider::Internal {
        return CitationCategory::InternalDoc;
    }
    CitationCategory::LlmOutput
}

fn citation_multiplier(category: CitationCategory) -> f64 {
    match category {
        CitationCategory::RegulatoryDoc => 1.20,
        CitationCategory::PeerReviewed => 1.15,
        CitationCategory::InternalDoc => 1.00,
        CitationCategory::LlmOutput => 0.85,
        CitationCategory::Uncited => 0.60,
    }
}

#[derive(Debug, Default)]
pub struct ConfidenceCalibrator;

impl ConfidenceCalibrator {
    pub fn new() -> Self {
        Self
    }

    /// Compute the calibrated confidence for `claim`. `audit` is the
    /// Provenance Auditor's result for this claim, if one was produced
    /// (the orchestrator runs auditing before calibration).
    pub fn calibrate(
        &self,
        claim: &Claim,
        ledger: &ClaimLedger,
        audit: Option<&ProvenanceAuditResult>,
    ) -> (f64, CalibrationMetadata) {
        let mut factors = Vec::new();

        // 1. Origin baseline: the calibrated value starts from a fixed
        // baseline per origin, not from the reasoner-reported confidence —
        // spec.md §4.5 explicitly "replaces" it.
        let mut value = match claim.origin {
            Origin::Explicit => 0.85,
            Origin::Inferred => 0.60,
        };
        factors.push(factor("origin_baseline", value));

        // 2. Citation type multiplier.
        let citation_category = classify_citation(claim);
        let citation_multiplier = citation_multiplier(citation_category);
        value *= citation_multiplier;
        factors.push(factor("citation_type", citation_multiplier));

        // 3. Contradiction multiplier: the worst severity among this
        // claim's contradictions.
        let contradiction_multiplier = self.contradiction_multiplier(claim, ledger);
        value *= contradiction_multiplier;
        factors.push(factor("contradiction_severity", contradiction_multiplier));

        // 4. Consensus bonus, bucketed by the percentage of same-task
        // claims that do not conflict with this one.
        let consensus_multiplier = self.consensus_multiplier(claim, ledger);
        value *= consensus_multiplier;
        factors.push(factor("consensus_bonus", consensus_multiplier));

        // 5. Provenance term.
        let provenance_score = audit.map(|a| a.score_unit).unwrap_or(1.0);
        let provenance_multiplier = 0.80 + 0.20 * provenance_score;
        value *= provenance_multiplier;
        factors.push(factor("provenance_term", provenance_multiplier));

        // 6. Boosts: regulatory requirements and detailed financial
        // breakdowns carry more downstream weight than an average claim.
        let regulatory_boost = if claim.claim_type == ClaimType::Requirement
            && REGULATORY_KEYWORDS
                .iter()
                .any(|kw| claim.text.to_lowercase().contains(kw))
        {
            1.10
        } else {
            1.0
        };
        value *= regulatory_boost;
        factors.push(factor("regulatory_boost", regulatory_boost));

        let financial_boost = if claim.claim_type == ClaimType::Financial {
            1.05
        } else {
            1.0
        };
        value *= financial_boost;
        factors.push(factor("financial_boost", financial_boost));

        // 7. Clamp and round to two decimals.
        let clamped = value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);
        let rounded = (clamped * 100.0).round() / 100.0;

        (
            rounded,
            CalibrationMetadata {
                original_confidence: claim.confidence,
                factors,
            },
        )
    }

    pub fn calibrate_all(&self, ledger: &mut ClaimLedger, audits: &[ProvenanceAuditResult]) {
        let audit_by_id: std::collections::HashMap<&str, &ProvenanceAuditResult> =
            audits.iter().map(|a| (a.claim_id.as_str(), a)).collect();
        let ids: Vec<String> = ledger.iter().map(|c| c.id.clone()).collect();
        for id in ids {
            let claim = ledger.get(&id).cloned();
            let Some(claim) = claim else { continue };
            let audit = audit_by_id.get(id.as_str()).copied();
            let (calibrated, metadata) = self.calibrate(&claim, ledger, audit);
            if let Some(c) = ledger.get_mut(&id) {
                c.confidence = calibrated;
                c.calibration_metadata = Some(metadata);
            }
        }
    }

    fn contradiction_multiplier(&self, claim: &Claim, ledger: &ClaimLedger) -> f64 {
        let worst = claim
            .contradictions
            .iter()
            .filter_map(|id| ledger.contradiction(*id))
            .filter(|c| c.resolution.preferred_claim.as_deref() != Some(claim.id.as_str()))
            .map(|c| c.severity)
            .max();
        match worst {
            None => 1.00,
            Some(Severity::Low) => 0.95,
            Some(Severity::Medium) => 0.85,
            Some(Severity::High) => 0.70,
        }
    }

    /// Consensus level: the percentage of claims sharing this claim's task
    /// (or, absent a task, the same claim type and document) that do not
    /// carry an unresolved contradiction against it, bucketed per
    /// spec.md §4.5 step 4. A claim with no cohort to compare against is
    /// treated as fully corroborated (no contradicting evidence exists).
    fn consensus_multiplier(&self, claim: &Claim, ledger: &ClaimLedger) -> f64 {
        let cohort: Vec<&Claim> = match claim.task_id {
            Some(task_id) => ledger
                .by_task(task_id)
                .into_iter()
                .filter(|c| c.id != claim.id)
                .collect(),
            None => ledger
                .by_type_and_document(claim.claim_type, &claim.source.document_name)
                .into_iter()
                .filter(|c| c.id != claim.id)
                .collect(),
        };
        if cohort.is_empty() {
            return 1.10;
        }
        let contradicting = cohort
            .iter()
            .filter(|c| {
                c.contradictions.iter().any(|cid| {
                    ledger
                        .contradiction(*cid)
                        .map(|contradiction| {
                            contradiction.claim_pair.0 == claim.id
                                || contradiction.claim_pair.1 == claim.id
                        })
                        .unwrap_or(false)
                })
            })
            .count();
        let supporting_percent =
            100.0 * (cohort.len() - contradicting) as f64 / cohort.len() as f64;
        if supporting_percent > 90.0 {
            1.10
        } else if supporting_percent >= 70.0 {
            1.05
        } else if supporting_percent >= 50.0 {
            1.00
        } else {
            0.90
        }
    }
}

fn factor(name: &str, multiplier: f64) -> CalibrationFactor {
    CalibrationFactor {
        name: name.to_string(),
        multiplier,
    }
}
