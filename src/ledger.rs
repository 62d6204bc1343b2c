//! Claim Ledger: the request-scoped indexed collection of claims
//!. Backed by `BTreeMap`s rather than `HashMap`s so iteration
//! order — and therefore any derived JSON key order — is deterministic
//! across runs, per spec.md §6's persisted-state requirement.

use std::collections::BTreeMap;
use uuid::Uuid;

use crate::types::{Claim, ClaimType, Contradiction};

/// The set of claims for one request, plus the contradictions found
/// across them. Owned exclusively by the orchestrator for the request's
/// lifetime; all other stages receive `&ClaimLedger` read-only views
/// except the documented mutators (Detector appends contradiction ids,
/// Calibrator replaces `confidence`).
#[derive(Debug, Clone, Default)]
pub struct ClaimLedger {
    claims: BTreeMap<String, Claim>,
    contradictions: BTreeMap<Uuid, Contradiction>,
    /// Insertion order, preserved for deterministic pairwise iteration in
    /// the Contradiction Detector.
    order: Vec<String>,
}

impl ClaimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_claims(claims: Vec<Claim>) -> Self {
        let mut ledger = Self::new();
        for claim in claims {
            ledger.insert(claim);
        }
        ledger
    }

    pub fn insert(&mut self, claim: Claim) {
        if !self.claims.contains_key(&claim.id) {
            self.order.push(claim.id.clone());
        }
        self.claims.insert(claim.id.clone(), claim);
    }

    pub fn get(&self, id: &str) -> Option<&Claim> {
        self.claims.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Claim> {
        self.claims.get_mut(id)
    }

    /// Claims in stable insertion order (the order the extractor
    /// produced them in, after the merge-phase sort of spec.md §5).
    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.order.iter().filter_map(move |id| self.claims.get(id))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Claim> {
        self.claims.values_mut()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn by_task(&self, task_id: uuid::Uuid) -> Vec<&Claim> {
        self.iter()
            .filter(|c| c.task_id == Some(task_id))
            .collect()
    }

    pub fn by_type_and_document<'a>(
        &'a self,
        claim_type: ClaimType,
        document_name: &'a str,
    ) -> Vec<&'a Claim> {
        self.iter()
            .filter(|c| c.claim_type == claim_type && c.source.document_name == document_name)
            .collect()
    }

    pub fn add_contradiction(&mut self, contradiction: Contradiction) {
        let (a, b) = contradiction.claim_pair.clone();
        if let Some(claim) = self.claims.get_mut(&a) {
            if !claim.contradictions.contains(&contradiction.id) {
                claim.contradictions.push(contradiction.id);
            }
        }
        if let Some(claim) = self.claims.get_mut(&b) {
            if !claim.contradictions.contains(&contradiction.id) {
                claim.contradictions.push(contradiction.id);
            }
        }
        self.contradictions.insert(contradiction.id, contradiction);
    }

    pub fn contradictions(&self) -> impl Iterator<Item = &Contradiction> {
        self.contradictions.values()
    }

    pub fn contradiction_mut(&mut self, id: Uuid) -> Option<&mut Contradiction> {
        self.contradictions.get_mut(&id)
    }

    pub fn contradiction(&self, id: Uuid) -> Option<&Contradiction> {
        self.contradictions.get(&id)
    }

    /// Pairwise iteration respecting §4.3's invariant: "skip same task,
    /// skip different type, skip same id". Returns id pairs so callers
    /// can borrow mutably afterward without fighting the borrow checker.
    pub fn candidate_pairs(&self) -> Vec<(String, String)> {
        let ids: Vec<&String> = self.order.iter().collect();
        let mut pairs = Vec::new();
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let a = self.claims.get(ids[i]).unwrap();
                let b = self.claims.get(ids[j]).unwrap();
                if a.id == b.id {
                    continue;
                }
                if a.claim_type != b.claim_type {
                    continue;
                }
                if a.task_id.is_some() && a.task_id == b.task_id {
                    continue;
                }
                pairs.push((a.id.clone(), b.id.clone()));
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;
    use chrono::Utc;

    fn claim(id: &str, claim_type: ClaimType, task: Option<Uuid>) -> Claim {
        Claim {
            id: id.to_string(),
            task_id: task,
            text: format!("claim {id}"),
            claim_type,
            origin: Origin::Explicit,
            confidence: 0.8,
            source: ClaimProvenance {
                document_name: "doc.pdf".into(),
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
    fn candidate_pairs_skip_same_task_and_type() {
        let task = Uuid::new_v4();
        let mut ledger = ClaimLedger::new();
        ledger.insert(claim("a", ClaimType::Duration, Some(task)));
        ledger.insert(claim("b", ClaimType::Duration, Some(task)));
        ledger.insert(claim("c", ClaimType::Duration, None));
        ledger.insert(claim("d", ClaimType::Financial, None));

        let pairs = ledger.candidate_pairs();
        // a/b share a task -> skipped. a/d and b/d differ in type -> skipped.
        // only a/c, b/c, remain (c has no task so it's never skipped by task).
        assert!(pairs.contains(&("a".to_string(), "c".to_string())));
        assert!(pairs.contains(&("b".to_string(), "c".to_string())));
        assert!(!pairs.contains(&("a".to_string(), "b".to_string())));
        assert!(!pairs.iter().any(|(x, y)| x == "d" || y == "d"));
    }

    #[test]
    fn lookup_by_task_and_type_document() {
        let task = Uuid::new_v4();
        let mut ledger = ClaimLedger::new();
        ledger.insert(claim("a", ClaimType::Duration, Some(task)));
        ledger.insert(claim("b", ClaimType::Financial, None));

        assert_eq!(ledger.by_task(task).len(), 1);
        assert_eq!(
            ledger
                .by_type_and_document(ClaimType::Duration, "doc.pdf")
                .len(),
            1
        );
    }
}
