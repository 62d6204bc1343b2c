//! Claim Extractor: a pure projection from untrusted
//! upstream-reasoner output (or a structured timeline task) into a flat
//! list of `Claim`s. No I/O, no calls to reasoners — mirrors the
//! "pure projection" framing of the teacher's `DecompositionStage`
//! (`claim-extraction/src/decomposition.rs`), minus its NLU machinery,
//! since this extractor never re-derives claims from free text itself.

use chrono::Utc;
use uuid::Uuid;

use crate::error::EngineError;
use crate::types::{Claim, ClaimProvenance, ClaimType, Citation, Origin, Source};

/// A hint the upstream reasoner returned alongside a claim's text, to be
/// turned into a `Citation` if present.
#[derive(Debug, Clone)]
pub struct RawCitationHint {
    pub start_char: usize,
    pub end_char: usize,
    pub exact_quote: String,
}

/// One untrusted item as returned by an upstream reasoning provider.
/// The extractor does not call reasoners itself — this is the contract
/// boundary spec.md §1 draws around them.
#[derive(Debug, Clone)]
pub struct RawClaim {
    pub text: String,
    pub claim_type: ClaimType,
    pub origin: Origin,
    pub confidence: f64,
    pub citation: Option<RawCitationHint>,
    pub task_id: Option<Uuid>,
    pub supporting_facts: Vec<String>,
    pub inference_rationale: Option<String>,
}

/// Deterministic claim id: `H(documentName || ":" || index || ":" ||
/// text[0..100])` truncated to `len_hex` hex characters (default 16).
/// Two extractions of the same input produce byte-identical ids.
pub fn claim_id(document_name: &str, index: usize, text: &str) -> String {
    claim_id_with_len(document_name, index, text, 16)
}

pub fn claim_id_with_len(document_name: &str, index: usize, text: &str, len_hex: usize) -> String {
    let truncated: String = text.chars().take(100).collect();
    let input = format!("{document_name}:{index}:{truncated}");
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..len_hex.min(hex.len())].to_string()
}

#[derive(Debug, Default)]
pub struct ClaimExtractor;

impl ClaimExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Project a document's raw claim list into `Claim`s.
    pub fn extract_from_document(
        &self,
        source: &Source,
        raw_claims: &[RawClaim],
    ) -> Result<Vec<Claim>, EngineError> {
        let mut claims = Vec::with_capacity(raw_claims.len());
        for (index, raw) in raw_claims.iter().enumerate() {
            if raw.text.trim().is_empty() {
                return Err(EngineError::InvalidInput(format!(
                    "claim text at index {index} of document '{}' is empty",
                    source.name
                )));
            }

            let citation = raw.citation.as_ref().map(|hint| Citation {
                document_name: source.name.clone(),
                start_char: hint.start_char,
                end_char: hint.end_char,
                exact_quote: hint.exact_quote.clone(),
                retrieved_at: Utc::now(),
            });

            claims.push(Claim {
                id: claim_id(&source.name, index, &raw.text),
                task_id: raw.task_id,
                text: raw.text.clone(),
                claim_type: raw.claim_type,
                origin: raw.origin,
                confidence: raw.confidence,
                source: ClaimProvenance {
                    document_name: source.name.clone(),
                    provider: source.provider,
                    citation,
                },
                contradictions: Vec::new(),
                validated_at: Utc::now(),
                calibration_metadata: None,
                review_flags: Vec::new(),
                inference_rationale: raw.inference_rationale.clone(),
                supporting_facts: raw.supporting_facts.clone(),
            });
        }
        Ok(claims)
    }

    /// Emit one `Claim` per populated field of a structured timeline task:
    /// duration, startDate, endDate, each dependency, regulatoryRequirement
    /// (only if required), and each financial metric present.
    pub fn extract_from_task(
        &self,
        task: &crate::types::TimelineTask,
    ) -> Result<Vec<Claim>, EngineError> {
        let doc = format!("task:{}", task.id);
        let mut raws = Vec::new();

        if let Some(duration) = &task.duration_days {
            raws.push(field_raw(
                format!("Duration is {} days", duration.value),
                ClaimType::Duration,
                duration.origin,
                duration.confidence,
                &duration.citations,
                task.id,
            ));
        }
        if let Some(start) = &task.start_date {
            raws.push(field_raw(
                format!("Start date is {}", start.value),
                ClaimType::StartDate,
                start.origin,
                start.confidence,
                &start.citations,
                task.id,
            ));
        }
        if let Some(end) = &task.end_date {
            raws.push(field_raw(
                format!("End date is {}", end.value),
                ClaimType::EndDate,
                end.origin,
                end.confidence,
                &end.citations,
                task.id,
            ));
        }
        for dep in &task.dependencies {
            raws.push(field_raw(
                format!("Depends on task {}", dep.task_id),
                ClaimType::Dependency,
                dep.origin,
                dep.confidence,
                &[],
                task.id,
            ));
        }
        if let Some(reg) = &task.regulatory_requirement {
            if reg.is_required {
                raws.push(field_raw(
                    format!(
                        "Regulatory requirement: {}",
                        reg.regulation.clone().unwrap_or_else(|| "unspecified".into())
                    ),
                    ClaimType::Requirement,
                    reg.origin,
                    reg.confidence,
                    &[],
                    task.id,
                ));
            }
        }
        for metric in &task.financial_impact {
            raws.push(field_raw(
                format!("Financial impact: ${}", metric.value),
                ClaimType::Financial,
                metric.origin,
                metric.confidence,
                &metric.citations,
                task.id,
            ));
        }

        let mut claims = Vec::with_capacity(raws.len());
        for (index, raw) in raws.into_iter().enumerate() {
            let citation = raw.citation.as_ref().map(|hint| Citation {
                document_name: doc.clone(),
                start_char: hint.start_char,
                end_char: hint.end_char,
                exact_quote: hint.exact_quote.clone(),
                retrieved_at: Utc::now(),
            });
            claims.push(Claim {
                id: claim_id(&doc, index, &raw.text),
                task_id: raw.task_id,
                text: raw.text.clone(),
                claim_type: raw.claim_type,
                origin: raw.origin,
                confidence: raw.confidence,
                source: ClaimProvenance {
                    document_name: doc.clone(),
                    provider: crate::types::Provider::Internal,
                    citation,
                },
                contradictions: Vec::new(),
                validated_at: Utc::now(),
                calibration_metadata: None,
                review_flags: Vec::new(),
                inference_rationale: raw.inference_rationale.clone(),
                supporting_facts: raw.supporting_facts.clone(),
            });
        }
        Ok(claims)
    }
}

fn field_raw(
    text: String,
    claim_type: ClaimType,
    origin: Origin,
    confidence: f64,
    citations: &[Citation],
    task_id: Uuid,
) -> RawClaim {
    RawClaim {
        text,
        claim_type,
        origin,
        confidence,
        citation: citations.first().map(|c| RawCitationHint {
            start_char: c.start_char,
            end_char: c.end_char,
            exact_quote: c.exact_quote.clone(),
        }),
        task_id: Some(task_id),
        supporting_facts: Vec::new(),
        inference_rationale: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provider;

    fn doc() -> Source {
        Source {
            name: "doc.pdf".into(),
            provider: Provider::Internal,
            content: "Standard review time is 90 days".into(),
            size: 32,
            mime_type: "application/pdf".into(),
        }
    }

    #[test]
    fn ids_are_deterministic() {
        let a = claim_id("doc.pdf", 0, "Duration is 90 days");
        let b = claim_id("doc.pdf", 0, "Duration is 90 days");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn ids_differ_by_index() {
        let a = claim_id("doc.pdf", 0, "same text");
        let b = claim_id("doc.pdf", 1, "same text");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_text_is_invalid_input() {
        let extractor = ClaimExtractor::new();
        let raws = vec![RawClaim {
            text: "   ".into(),
            claim_type: ClaimType::Duration,
            origin: Origin::Explicit,
            confidence: 0.9,
            citation: None,
            task_id: None,
            supporting_facts: vec![],
            inference_rationale: None,
        }];
        let err = extractor.extract_from_document(&doc(), &raws).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn extracts_claim_with_citation() {
        let extractor = ClaimExtractor::new();
        let raws = vec![RawClaim {
            text: "Duration is 90 days".into(),
            claim_type: ClaimType::Duration,
            origin: Origin::Explicit,
            confidence: 0.9,
            citation: Some(RawCitationHint {
                start_char: 0,
                end_char: 32,
                exact_quote: "Standard review time is 90 days".into(),
            }),
            task_id: None,
            supporting_facts: vec![],
            inference_rationale: None,
        }];
        let claims = extractor.extract_from_document(&doc(), &raws).unwrap();
        assert_eq!(claims.len(), 1);
        assert!(claims[0].has_citation());
        assert_eq!(claims[0].claim_type, ClaimType::Duration);
    }

    #[test]
    fn extract_from_task_emits_one_claim_per_field() {
        use crate::types::*;
        use chrono::NaiveDate;

        let task = TimelineTask {
            id: Uuid::new_v4(),
            name: "Submit filing".into(),
            origin: Origin::Explicit,
            confidence: 0.9,
            duration_days: Some(FieldValue {
                value: 90.0,
                confidence: 0.9,
                origin: Origin::Explicit,
                citations: vec![],
            }),
            start_date: Some(FieldValue {
                value: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                confidence: 0.8,
                origin: Origin::Inferred,
                citations: vec![],
            }),
            end_date: None,
            dependencies: vec![DependencyRef {
                task_id: Uuid::new_v4(),
                confidence: 0.7,
                origin: Origin::Inferred,
            }],
            regulatory_requirement: Some(RegulatoryRequirement {
                is_required: true,
                confidence: 0.9,
                origin: Origin::Explicit,
                regulation: Some("SOX".into()),
            }),
            financial_impact: vec![FieldValue {
                value: 10000.0,
                confidence: 0.85,
                origin: Origin::Explicit,
                citations: vec![],
            }],
            source_citations: vec![],
            review_flags: vec![],
        };

        let extractor = ClaimExtractor::new();
        let claims = extractor.extract_from_task(&task).unwrap();
        // duration + start_date + 1 dependency + regulatory + 1 financial = 5
        assert_eq!(claims.len(), 5);
        assert!(claims.iter().all(|c| c.task_id == Some(task.id)));
    }
}
