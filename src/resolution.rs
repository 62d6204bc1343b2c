//! Resolution Matrix: five first-match-wins rules that turn a detected
//! contradiction into a verdict. Modeled as a pure function
//! over two claims plus the detector's findings, in the same spirit as the
//! teacher's `QualityGateValidator::validate` (`runtime-optimization/src/
//! quality_gate_validator.rs`) returning a closed outcome enum rather than
//! mutating its inputs.

use once_cell::sync::Lazy;

use crate::types::{Claim, Origin, ResolutionAction, Resolution, Severity};

/// Regulatory keywords, per spec.md §4.3's authority rule. Checked
/// case-insensitively against `documentName` only — not claim text.
pub(crate) static REGULATORY_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "regulation",
        "compliance",
        "occ",
        "fdic",
        "federal reserve",
        "fda",
        "hipaa",
        "sox",
        "gdpr",
        "pci",
    ]
});

fn mentions_regulatory_authority(claim: &Claim) -> bool {
    let document_name = claim.source.document_name.to_lowercase();
    REGULATORY_KEYWORDS.iter().any(|kw| document_name.contains(kw))
}

/// Confidence gap above which one claim is considered clearly dominant.
const CONFIDENCE_DOMINANCE_GAP: f64 = 0.2;

/// Apply the five resolution rules in order; the first that matches wins.
pub fn resolve(a: &Claim, b: &Claim, severity: Severity) -> Resolution {
    // Rule 1: explicit beats inferred.
    if a.origin == Origin::Explicit && b.origin == Origin::Inferred {
        return Resolution {
            action: ResolutionAction::AcceptExplicitReduceOtherConfidence,
            preferred_claim: Some(a.id.clone()),
            rationale: format!("{} is explicit, {} is inferred", a.id, b.id),
        };
    }
    if b.origin == Origin::Explicit && a.origin == Origin::Inferred {
        return Resolution {
            action: ResolutionAction::AcceptExplicitReduceOtherConfidence,
            preferred_claim: Some(b.id.clone()),
            rationale: format!("{} is explicit, {} is inferred", b.id, a.id),
        };
    }

    // Rule 2: confidence dominance.
    let gap = (a.confidence - b.confidence).abs();
    if gap > CONFIDENCE_DOMINANCE_GAP {
        let (winner, loser) = if a.confidence > b.confidence { (a, b) } else { (b, a) };
        return Resolution {
            action: ResolutionAction::AcceptHigherFlagLower,
            preferred_claim: Some(winner.id.clone()),
            rationale: format!(
                "{} confidence {:.2} exceeds {} confidence {:.2} by more than {:.2}",
                winner.id, winner.confidence, loser.id, loser.confidence, CONFIDENCE_DOMINANCE_GAP
            ),
        };
    }

    // Rule 3: regulatory authority.
    let a_reg = mentions_regulatory_authority(a);
    let b_reg = mentions_regulatory_authority(b);
    if a_reg && !b_reg {
        return Resolution {
            action: ResolutionAction::AcceptRegulatoryRejectOther,
            preferred_claim: Some(a.id.clone()),
            rationale: format!("{} carries a regulatory-authority citation", a.id),
        };
    }
    if b_reg && !a_reg {
        return Resolution {
            action: ResolutionAction::AcceptRegulatoryRejectOther,
            preferred_claim: Some(b.id.clone()),
            rationale: format!("{} carries a regulatory-authority citation", b.id),
        };
    }

    // Rule 4: high severity with no winner so far.
    if severity == Severity::High {
        return Resolution {
            action: ResolutionAction::FlagBothForManualReview,
            preferred_claim: None,
            rationale: format!(
                "high-severity contradiction between {} and {} with no dominant claim",
                a.id, b.id
            ),
        };
    }

    // Rule 5: default.
    Resolution {
        action: ResolutionAction::AverageOrFlag,
        preferred_claim: None,
        rationale: format!("no dominance found between {} and {}; averaging or flagging", a.id, b.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClaimProvenance, ClaimType, Provider};
    use chrono::Utc;

    fn claim(id: &str, origin: Origin, confidence: f64, text: &str, document: &str) -> Claim {
        Claim {
            id: id.to_string(),
            task_id: None,
            text: text.to_string(),
            claim_type: ClaimType::Duration,
            origin,
            confidence,
            source: ClaimProvenance {
                document_name: document.to_string(),
                provider: Provider::Internal,
                citation: None,
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
    fn explicit_beats_inferred() {
        let a = claim("a", Origin::Explicit, 0.6, "90 days", "doc.pdf");
        let b = claim("b", Origin::Inferred, 0.6, "120 days", "doc2.pdf");
        let res = resolve(&a, &b, Severity::Medium);
        assert_eq!(res.action, ResolutionAction::AcceptExplicitReduceOtherConfidence);
        assert_eq!(res.preferred_claim.as_deref(), Some("a"));
    }

    #[test]
    fn confidence_dominance_wins_when_both_explicit() {
        let a = claim("a", Origin::Explicit, 0.9, "90 days", "doc.pdf");
        let b = claim("b", Origin::Explicit, 0.5, "120 days", "doc2.pdf");
        let res = resolve(&a, &b, Severity::Medium);
        assert_eq!(res.action, ResolutionAction::AcceptHigherFlagLower);
        assert_eq!(res.preferred_claim.as_deref(), Some("a"));
    }

    #[test]
    fn regulatory_authority_wins_on_near_tie() {
        let a = claim("a", Origin::Explicit, 0.8, "90 days", "sox-compliance-filing.pdf");
        let b = claim("b", Origin::Explicit, 0.85, "120 days", "internal-memo.pdf");
        let res = resolve(&a, &b, Severity::Medium);
        assert_eq!(res.action, ResolutionAction::AcceptRegulatoryRejectOther);
        assert_eq!(res.preferred_claim.as_deref(), Some("a"));
    }

    #[test]
    fn high_severity_no_winner_flags_both() {
        let a = claim("a", Origin::Explicit, 0.8, "90 days", "doc.pdf");
        let b = claim("b", Origin::Explicit, 0.82, "120 days", "doc2.pdf");
        let res = resolve(&a, &b, Severity::High);
        assert_eq!(res.action, ResolutionAction::FlagBothForManualReview);
        assert!(res.preferred_claim.is_none());
    }

    #[test]
    fn default_averages_or_flags() {
        let a = claim("a", Origin::Explicit, 0.8, "90 days", "doc.pdf");
        let b = claim("b", Origin::Explicit, 0.81, "120 days", "doc2.pdf");
        let res = resolve(&a, &b, Severity::Low);
        assert_eq!(res.action, ResolutionAction::AverageOrFlag);
        assert!(res.preferred_claim.is_none());
    }
}
