//! Provenance Auditor: scores a claim's provenance chain
//! out of 100 by applying weighted penalties, then scales by the citing
//! provider's trust weight. Structural tampering indicators are reported
//! but never affect the score. Grounded on the
//! `QualityGateValidator` scoring shape (`runtime-optimization/src/
//! quality_gate_validator.rs`), adapted from a pass/fail validator into a
//! continuous scorer so partial provenance failures degrade gracefully
//! instead of collapsing to a single boolean.

use crate::config::EngineConfig;
use crate::ledger::ClaimLedger;
use crate::types::{AuditPenalty, Claim, Origin, ProvenanceAuditResult, SourceSet};
use crate::verifier::{normalize, CitationVerifier};

const PENALTY_HALLUCINATION: f64 = 50.0;
const PENALTY_INCORRECT_ATTRIBUTION: f64 = 20.0;
const PENALTY_MISSING_CITATION: f64 = 30.0;
const PENALTY_CIRCULAR_REFERENCE: f64 = 25.0;
const PENALTY_WEAK_INFERENCE: f64 = 10.0;

const BASE_SCORE: f64 = 100.0;
const VALID_THRESHOLD: f64 = 50.0;

/// Tokens that mark a document name as another reasoner's output, for the
/// circular-reference check (spec.md §4.4).
const CIRCULAR_DOCUMENT_TOKENS: [&str; 3] = ["output", "generated", "response"];

#[derive(Debug, Default)]
pub struct ProvenanceAuditor;

impl ProvenanceAuditor {
    pub fn new() -> Self {
        Self
    }

    pub fn audit_claim(
        &self,
        claim: &Claim,
        _ledger: &ClaimLedger,
        sources: &SourceSet,
        config: &EngineConfig,
    ) -> ProvenanceAuditResult {
        let mut penalties = Vec::new();

        if self.is_hallucinated(claim, sources, config) {
            penalties.push(AuditPenalty {
                name: "hallucination".to_string(),
                points: PENALTY_HALLUCINATION,
                reason: "explicit claim's cited document is missing or the exact quote cannot be found"
                    .to_string(),
            });
        }

        if self.is_incorrectly_attributed(claim, sources) {
            penalties.push(AuditPenalty {
                name: "incorrect_attribution".to_string(),
                points: PENALTY_INCORRECT_ATTRIBUTION,
                reason: "quote found, but in a different source than the one named".to_string(),
            });
        }

        if self.is_missing_citation(claim) {
            penalties.push(AuditPenalty {
                name: "missing_citation".to_string(),
                points: PENALTY_MISSING_CITATION,
                reason: "explicit claim carries no citation, or a high-confidence inferred claim \
                          carries no rationale"
                    .to_string(),
            });
        }

        if self.is_circular(claim) {
            penalties.push(AuditPenalty {
                name: "circular_reference".to_string(),
                points: PENALTY_CIRCULAR_REFERENCE,
                reason: "an LLM-provider claim cites another reasoner's output document".to_string(),
            });
        }

        if self.is_weak_inference(claim) {
            penalties.push(AuditPenalty {
                name: "weak_inference".to_string(),
                points: PENALTY_WEAK_INFERENCE,
                reason: "inferred claim with no supporting facts or rationale".to_string(),
            });
        }

        let total_penalty: f64 = penalties.iter().map(|p| p.points).sum();
        let raw_score = (BASE_SCORE - total_penalty).clamp(0.0, 100.0);
        let provider_weight = config.provider_weight(&claim.source.provider);
        let multiplier = 0.75 + 0.25 * provider_weight;
        let score_100 = raw_score * multiplier;

        ProvenanceAuditResult {
            claim_id: claim.id.clone(),
            score_100,
            score_unit: score_100 / 100.0,
            valid: score_100 >= VALID_THRESHOLD,
            penalties,
            tampering_indicators: self.tampering_indicators(claim),
        }
    }

    pub fn audit_all(
        &self,
        ledger: &ClaimLedger,
        sources: &SourceSet,
        config: &EngineConfig,
    ) -> Vec<ProvenanceAuditResult> {
        ledger
            .iter()
            .map(|claim| self.audit_claim(claim, ledger, sources, config))
            .collect()
    }

    /// Hallucination: explicit, citation present, but the cited document is
    /// missing OR the exact quote cannot be found (even via fuzzy/context
    /// search) — i.e. the verifier's verdict for this citation is invalid.
    fn is_hallucinated(&self, claim: &Claim, sources: &SourceSet, config: &EngineConfig) -> bool {
        if claim.origin != Origin::Explicit {
            return false;
        }
        let Some(citation) = &claim.source.citation else {
            return false;
        };
        let verifier = CitationVerifier::new(config);
        !verifier.verify(citation, sources).valid
    }

    /// Incorrect attribution: the cited quote genuinely exists verbatim
    /// somewhere, but in a *different* source than the one the claim names.
    fn is_incorrectly_attributed(&self, claim: &Claim, sources: &SourceSet) -> bool {
        let Some(citation) = &claim.source.citation else {
            return false;
        };
        if citation.document_name == crate::types::INFERRED_DOCUMENT_TOKEN {
            return false;
        }
        let Some(named) = sources.get(&citation.document_name) else {
            return false;
        };
        let normalized_quote = normalize(&citation.exact_quote);
        if normalized_quote.is_empty() {
            return false;
        }
        if normalize(&named.content).contains(&normalized_quote) {
            return false;
        }
        sources
            .iter()
            .filter(|s| s.name != citation.document_name)
            .any(|s| normalize(&s.content).contains(&normalized_quote))
    }

    /// Missing citation: explicit with no citation, OR inferred with
    /// confidence >= 0.9 and no rationale.
    fn is_missing_citation(&self, claim: &Claim) -> bool {
        if claim.origin == Origin::Explicit && !claim.has_citation() {
            return true;
        }
        claim.origin == Origin::Inferred
            && claim.confidence >= 0.9
            && claim.inference_rationale.is_none()
    }

    /// Circular reference: an LLM-provider claim citing another reasoner's
    /// output document (by name).
    fn is_circular(&self, claim: &Claim) -> bool {
        if !claim.source.provider.is_llm() {
            return false;
        }
        let name = claim.source.document_name.to_lowercase();
        CIRCULAR_DOCUMENT_TOKENS.iter().any(|t| name.contains(t))
    }

    /// Weak inference: inferred claim with no supporting facts and no
    /// rationale (a strictly weaker condition than hallucination, which
    /// only applies to explicit claims).
    fn is_weak_inference(&self, claim: &Claim) -> bool {
        claim.origin == Origin::Inferred
            && claim.supporting_facts.is_empty()
            && claim.inference_rationale.as_deref().unwrap_or("").trim().is_empty()
    }

    /// Non-scoring structural anomalies: malformed ranges, out-of-bounds
    /// confidence, and quote/length mismatches indicative of tampering.
    fn tampering_indicators(&self, claim: &Claim) -> Vec<String> {
        let mut indicators = Vec::new();
        if !(0.0..=1.0).contains(&claim.confidence) {
            indicators.push(format!("confidence {} out of [0,1]", claim.confidence));
        }
        if let Some(citation) = &claim.source.citation {
            if citation.start_char >= citation.end_char {
                indicators.push("citation range is empty or inverted".to_string());
            }
            let declared_len = citation.end_char.saturating_sub(citation.start_char);
            let quote_len = citation.exact_quote.chars().count();
            if declared_len != 0 && quote_len != 0 && declared_len != quote_len {
                indicators.push(format!(
                    "quote length {quote_len} does not match declared range length {declared_len}"
                ));
            }
        }
        indicators
    }
}
