//! Quality Gate Manager: a fixed sequence of pure
//! evaluation functions over the ledger, each producing a
//! `QualityGateResult` without mutating its input. Grounded on the
//! teacher's `QualityGateValidator` (`runtime-optimization/src/
//! quality_gate_validator.rs`), but reshaped from an async
//! `ComplianceValidator` trait with mock network calls into a synchronous
//! trait over in-memory data, since every input a gate needs here is
//! already resident in the ledger.

use crate::config::EngineConfig;
use crate::ledger::ClaimLedger;
use crate::types::{
    AggregateGateResult, ClaimType, Origin, ProvenanceAuditResult, QualityGateResult, Severity,
};

pub trait Gate: Send + Sync {
    fn name(&self) -> &str;
    fn is_blocker(&self) -> bool;
    fn evaluate(
        &self,
        ledger: &ClaimLedger,
        audits: &[ProvenanceAuditResult],
        config: &EngineConfig,
    ) -> QualityGateResult;
}

pub struct CitationCoverageGate;
impl Gate for CitationCoverageGate {
    fn name(&self) -> &str {
        "CITATION_COVERAGE"
    }
    fn is_blocker(&self) -> bool {
        true
    }
    fn evaluate(
        &self,
        ledger: &ClaimLedger,
        _audits: &[ProvenanceAuditResult],
        config: &EngineConfig,
    ) -> QualityGateResult {
        // Per spec.md §4.6/§8 scenario 3: measures the fraction of EXPLICIT
        // items that carry a non-empty citation, independent of whether that
        // citation actually verifies. Citation validity is the auditor's
        // concern, not this gate's — counterintuitive but intentional.
        let explicit_count = ledger.iter().filter(|c| c.origin == Origin::Explicit).count();
        let explicit_cited = ledger
            .iter()
            .filter(|c| c.origin == Origin::Explicit && c.has_citation())
            .count();
        let score = if explicit_count == 0 {
            1.0
        } else {
            explicit_cited as f64 / explicit_count as f64
        };
        QualityGateResult {
            name: self.name().to_string(),
            passed: score >= config.citation_coverage_threshold,
            score,
            threshold: config.citation_coverage_threshold,
            blocker: self.is_blocker(),
            details: format!("{explicit_cited}/{explicit_count} explicit claims carry a citation"),
        }
    }
}

pub struct ContradictionSeverityGate;
impl Gate for ContradictionSeverityGate {
    fn name(&self) -> &str {
        "CONTRADICTION_SEVERITY"
    }
    fn is_blocker(&self) -> bool {
        true
    }
    fn evaluate(
        &self,
        ledger: &ClaimLedger,
        _audits: &[ProvenanceAuditResult],
        _config: &EngineConfig,
    ) -> QualityGateResult {
        let unresolved_high = ledger
            .contradictions()
            .filter(|c| {
                c.severity == Severity::High
                    && c.resolution.preferred_claim.is_none()
                    && c.resolution_strategy.is_none()
            })
            .count();
        QualityGateResult {
            name: self.name().to_string(),
            passed: unresolved_high == 0,
            score: unresolved_high as f64,
            threshold: 0.0,
            blocker: self.is_blocker(),
            details: format!("{unresolved_high} unresolved high-severity contradictions"),
        }
    }
}

pub struct ConfidenceMinimumGate;
impl Gate for ConfidenceMinimumGate {
    fn name(&self) -> &str {
        "CONFIDENCE_MINIMUM"
    }
    fn is_blocker(&self) -> bool {
        true
    }
    fn evaluate(
        &self,
        ledger: &ClaimLedger,
        _audits: &[ProvenanceAuditResult],
        config: &EngineConfig,
    ) -> QualityGateResult {
        let below: Vec<&str> = ledger
            .iter()
            .filter(|c| c.confidence < config.min_confidence)
            .map(|c| c.id.as_str())
            .collect();
        let min_seen = ledger
            .iter()
            .map(|c| c.confidence)
            .fold(f64::INFINITY, f64::min);
        let score = if ledger.is_empty() { 1.0 } else { min_seen };
        QualityGateResult {
            name: self.name().to_string(),
            passed: below.is_empty(),
            score,
            threshold: config.min_confidence,
            blocker: self.is_blocker(),
            details: if below.is_empty() {
                "all claims meet the minimum confidence".to_string()
            } else {
                format!("{} claims below minimum confidence: {}", below.len(), below.join(", "))
            },
        }
    }
}

pub struct SchemaComplianceGate;
impl Gate for SchemaComplianceGate {
    fn name(&self) -> &str {
        "SCHEMA_COMPLIANCE"
    }
    fn is_blocker(&self) -> bool {
        true
    }
    fn evaluate(
        &self,
        ledger: &ClaimLedger,
        _audits: &[ProvenanceAuditResult],
        _config: &EngineConfig,
    ) -> QualityGateResult {
        let mut violations = Vec::new();
        for claim in ledger.iter() {
            if claim.id.trim().is_empty() {
                violations.push(format!("{}: empty id", claim.id));
            }
            if claim.text.trim().is_empty() {
                violations.push(format!("{}: empty text", claim.id));
            }
            if !(0.0..=1.0).contains(&claim.confidence) {
                violations.push(format!("{}: confidence out of range", claim.id));
            }
            if let Some(citation) = &claim.source.citation {
                if citation.start_char >= citation.end_char {
                    violations.push(format!("{}: inverted citation range", claim.id));
                }
                if citation.exact_quote.trim().is_empty() {
                    violations.push(format!("{}: empty citation quote", claim.id));
                }
            }
        }
        let total = ledger.len().max(1) as f64;
        let score = 1.0 - (violations.len() as f64 / total);
        QualityGateResult {
            name: self.name().to_string(),
            passed: violations.is_empty(),
            score,
            threshold: 1.0,
            blocker: self.is_blocker(),
            details: if violations.is_empty() {
                "all claims are well-formed".to_string()
            } else {
                violations.join("; ")
            },
        }
    }
}

pub struct RegulatoryFlagsGate;
impl Gate for RegulatoryFlagsGate {
    fn name(&self) -> &str {
        "REGULATORY_FLAGS"
    }
    fn is_blocker(&self) -> bool {
        false
    }
    fn evaluate(
        &self,
        ledger: &ClaimLedger,
        _audits: &[ProvenanceAuditResult],
        _config: &EngineConfig,
    ) -> QualityGateResult {
        let requirement_claims: Vec<_> = ledger
            .iter()
            .filter(|c| c.claim_type == ClaimType::Requirement)
            .collect();
        let unflagged: Vec<&str> = requirement_claims
            .iter()
            .filter(|c| !c.has_citation() && c.review_flags.is_empty())
            .map(|c| c.id.as_str())
            .collect();
        let total = requirement_claims.len().max(1) as f64;
        let score = 1.0 - (unflagged.len() as f64 / total);
        QualityGateResult {
            name: self.name().to_string(),
            passed: unflagged.is_empty(),
            score,
            threshold: 1.0,
            blocker: self.is_blocker(),
            details: if requirement_claims.is_empty() {
                "no regulatory requirement claims present".to_string()
            } else if unflagged.is_empty() {
                "all regulatory requirement claims are cited or flagged".to_string()
            } else {
                format!("unflagged regulatory claims: {}", unflagged.join(", "))
            },
        }
    }
}

pub struct ProvenanceQualityGate;
impl Gate for ProvenanceQualityGate {
    fn name(&self) -> &str {
        "PROVENANCE_QUALITY"
    }
    fn is_blocker(&self) -> bool {
        false
    }
    fn evaluate(
        &self,
        _ledger: &ClaimLedger,
        audits: &[ProvenanceAuditResult],
        config: &EngineConfig,
    ) -> QualityGateResult {
        let average = if audits.is_empty() {
            100.0
        } else {
            audits.iter().map(|a| a.score_100).sum::<f64>() / audits.len() as f64
        };
        QualityGateResult {
            name: self.name().to_string(),
            passed: average >= config.provenance_quality_threshold,
            score: average,
            threshold: config.provenance_quality_threshold,
            blocker: self.is_blocker(),
            details: format!("average provenance score {average:.1}/100"),
        }
    }
}

/// Evaluates a fixed, deterministic sequence of gates and assembles the
/// aggregate verdict. Gates never mutate the ledger; custom gates can be
/// registered alongside the six defaults.
pub struct QualityGateManager {
    gates: Vec<Box<dyn Gate>>,
}

impl Default for QualityGateManager {
    fn default() -> Self {
        Self {
            gates: vec![
                Box::new(CitationCoverageGate),
                Box::new(ContradictionSeverityGate),
                Box::new(ConfidenceMinimumGate),
                Box::new(SchemaComplianceGate),
                Box::new(RegulatoryFlagsGate),
                Box::new(ProvenanceQualityGate),
            ],
        }
    }
}

impl QualityGateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, gate: Box<dyn Gate>) {
        self.gates.push(gate);
    }

    pub fn evaluate(
        &self,
        ledger: &ClaimLedger,
        audits: &[ProvenanceAuditResult],
        config: &EngineConfig,
    ) -> AggregateGateResult {
        let mut failures = Vec::new();
        let mut warnings = Vec::new();

        for gate in &self.gates {
            let result = gate.evaluate(ledger, audits, config);
            if !result.passed {
                if result.blocker {
                    failures.push(result);
                } else {
                    warnings.push(result);
                }
            }
        }

        let passed = failures.is_empty();
        let summary = if passed {
            format!("all blocker gates passed ({} warnings)", warnings.len())
        } else {
            format!("{} blocker gates failed", failures.len())
        };

        AggregateGateResult {
            passed,
            failures,
            warnings,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Citation, ClaimProvenance, Origin, Provider};
    use chrono::Utc;
    use uuid::Uuid;

    fn claim(id: &str, confidence: f64, cited: bool) -> crate::types::Claim {
        crate::types::Claim {
            id: id.to_string(),
            task_id: None,
            text: "claim text".to_string(),
            claim_type: ClaimType::Generic,
            origin: Origin::Explicit,
            confidence,
            source: ClaimProvenance {
                document_name: "doc.pdf".into(),
                provider: Provider::Internal,
                citation: if cited {
                    Some(Citation {
                        document_name: "doc.pdf".into(),
                        start_char: 0,
                        end_char: 5,
                        exact_quote: "claim".into(),
                        retrieved_at: Utc::now(),
                    })
                } else {
                    None
                },
            },
            contradictions: Vec::new(),
            validated_at: Utc::now(),
            calibration_metadata: None,
            review_flags: Vec::new(),
            inference_rationale: None,
            supporting_facts: Vec::new(),
        }
    }

    #[test]
    fn all_cited_high_confidence_passes_blockers() {
        let config = EngineConfig::default();
        let ledger = ClaimLedger::from_claims(vec![claim("a", 0.9, true), claim("b", 0.8, true)]);
        let manager = QualityGateManager::new();
        let result = manager.evaluate(&ledger, &[], &config);
        assert!(result.passed);
    }

    #[test]
    fn low_citation_coverage_blocks() {
        let config = EngineConfig::default();
        let ledger = ClaimLedger::from_claims(vec![
            claim("a", 0.9, true),
            claim("b", 0.9, false),
            claim("c", 0.9, false),
            claim("d", 0.9, false),
        ]);
        let manager = QualityGateManager::new();
        let result = manager.evaluate(&ledger, &[], &config);
        assert!(!result.passed);
        assert!(result.failures.iter().any(|f| f.name == "CITATION_COVERAGE"));
    }

    #[test]
    fn low_confidence_blocks() {
        let config = EngineConfig::default();
        let ledger = ClaimLedger::from_claims(vec![claim("a", 0.2, true)]);
        let manager = QualityGateManager::new();
        let result = manager.evaluate(&ledger, &[], &config);
        assert!(!result.passed);
        assert!(result.failures.iter().any(|f| f.name == "CONFIDENCE_MINIMUM"));
    }

    #[test]
    fn unresolved_high_severity_contradiction_blocks() {
        let config = EngineConfig::default();
        let mut ledger = ClaimLedger::from_claims(vec![claim("a", 0.9, true), claim("b", 0.9, true)]);
        ledger.add_contradiction(crate::types::Contradiction {
            id: Uuid::new_v4(),
            contradiction_type: crate::types::ContradictionType::Numerical,
            severity: Severity::High,
            claim_pair: ("a".to_string(), "b".to_string()),
            values: crate::types::ContradictionValues {
                left: "1".into(),
                right: "2".into(),
                metric: "numeric_value".into(),
            },
            resolution: crate::types::Resolution {
                action: crate::types::ResolutionAction::FlagBothForManualReview,
                preferred_claim: None,
                rationale: "no winner".into(),
            },
            resolved_at: None,
            resolution_strategy: None,
        });
        let manager = QualityGateManager::new();
        let result = manager.evaluate(&ledger, &[], &config);
        assert!(!result.passed);
        assert!(result
            .failures
            .iter()
            .any(|f| f.name == "CONTRADICTION_SEVERITY"));
    }
}
