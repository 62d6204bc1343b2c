//! Contradiction Detector: pairwise scan over candidate
//! claim pairs, checking five contradiction categories in fixed priority
//! order (first match wins per pair). The numeric/date/polarity pattern
//! libraries are grounded directly on the teacher's extraction regexes in
//! `claim-extraction/src/decomposition.rs` and `disambiguation.rs`.

use std::collections::HashSet;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::ledger::ClaimLedger;
use crate::resolution::resolve;
use crate::types::{Claim, Contradiction, ContradictionType, ContradictionValues, Severity};

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap());

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*(day|days|week|weeks|month|months|quarter|quarters|year|years)\b")
        .unwrap()
});
static MONEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\$\s*(-?\d+(?:\.\d+)?)\s*(million|billion|thousand|k|m|b)?\b").unwrap()
});
static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*%").unwrap());

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());
static SLASH_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b").unwrap());
static ENGLISH_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:tember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+(\d{1,2}),?\s+(\d{4})\b",
    )
    .unwrap()
});
static QUARTER_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bQ([1-4])\s+(\d{4})\b").unwrap());

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "are", "was", "were", "has", "have", "had", "not", "will", "shall",
        "must", "with", "from", "this", "that", "into", "per",
    ]
    .into_iter()
    .collect()
});

/// Positive-assertion keyword opposed by its negated form.
static POLARITY_PAIRS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("required", "not required"),
        ("must", "must not"),
        ("will", "will not"),
        ("is", "is not"),
        ("has", "has no"),
        ("includes", "excludes"),
    ]
});

/// Fixed logical-opposite word pairs, distinct from polarity's
/// positive/negated forms above.
static LOGICAL_PAIRS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("required", "optional"),
        ("mandatory", "voluntary"),
        ("must", "may"),
        ("will", "might"),
        ("always", "never"),
        ("true", "false"),
        ("yes", "no"),
    ]
});

/// A quantity extracted from claim text, tagged by the unit category it was
/// found in. Two quantities are only comparable when their categories match.
#[derive(Debug, Clone, Copy, PartialEq)]
enum NumericQuantity {
    Days(f64),
    Usd(f64),
    Ratio(f64),
    Bare(f64),
}

fn duration_days(value: f64, unit: &str) -> f64 {
    let per_unit = match unit.to_lowercase().as_str() {
        "day" | "days" => 1.0,
        "week" | "weeks" => 7.0,
        "month" | "months" => 30.0,
        "quarter" | "quarters" => 90.0,
        "year" | "years" => 365.0,
        _ => 1.0,
    };
    value * per_unit
}

fn money_usd(value: f64, suffix: Option<&str>) -> f64 {
    let multiplier = match suffix.map(|s| s.to_lowercase()) {
        Some(ref s) if s == "thousand" || s == "k" => 1_000.0,
        Some(ref s) if s == "million" || s == "m" => 1_000_000.0,
        Some(ref s) if s == "billion" || s == "b" => 1_000_000_000.0,
        _ => 1.0,
    };
    value * multiplier
}

/// Extracts the first typed quantity from `text`, trying duration, then
/// money, then percent, then a bare number, in that order.
fn extract_quantity(text: &str) -> Option<NumericQuantity> {
    if let Some(caps) = DURATION_RE.captures(text) {
        let value: f64 = caps[1].parse().ok()?;
        return Some(NumericQuantity::Days(duration_days(value, &caps[2])));
    }
    if let Some(caps) = MONEY_RE.captures(text) {
        let value: f64 = caps[1].parse().ok()?;
        return Some(NumericQuantity::Usd(money_usd(value, caps.get(2).map(|m| m.as_str()))));
    }
    if let Some(caps) = PERCENT_RE.captures(text) {
        let value: f64 = caps[1].parse().ok()?;
        return Some(NumericQuantity::Ratio(value / 100.0));
    }
    let value: f64 = NUMBER_RE.find(text)?.as_str().parse().ok()?;
    Some(NumericQuantity::Bare(value))
}

fn month_from_name(name: &str) -> Option<u32> {
    Some(match name.to_lowercase().as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    })
}

/// Extracts the first date from `text`, trying ISO, slash form
/// (MM/DD/YYYY), English month-day-year, then `Q{1-4} YYYY` (mapped to the
/// first day of that quarter), in that order.
fn extract_date(text: &str) -> Option<NaiveDate> {
    if let Some(m) = ISO_DATE_RE.find(text) {
        if let Ok(d) = NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d") {
            return Some(d);
        }
    }
    if let Some(m) = SLASH_DATE_RE.find(text) {
        if let Ok(d) = NaiveDate::parse_from_str(m.as_str(), "%m/%d/%Y") {
            return Some(d);
        }
    }
    if let Some(caps) = ENGLISH_DATE_RE.captures(text) {
        let month = month_from_name(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(d);
        }
    }
    if let Some(caps) = QUARTER_DATE_RE.captures(text) {
        let quarter: u32 = caps[1].parse().ok()?;
        let year: i32 = caps[2].parse().ok()?;
        let month = (quarter - 1) * 3 + 1;
        return NaiveDate::from_ymd_opt(year, month, 1);
    }
    None
}

/// Lowercased, stop-word- and short-token-filtered keyword set for the
/// definitional-contradiction Jaccard comparison.
fn keyword_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

#[derive(Debug, Default)]
pub struct ContradictionDetector;

impl ContradictionDetector {
    pub fn new() -> Self {
        Self
    }

    /// Scan every candidate pair in the ledger, appending any detected
    /// contradictions directly to it (spec.md §3: the detector is one of
    /// the two stages permitted to mutate the ledger in place).
    pub fn detect_all(&self, ledger: &mut ClaimLedger, config: &EngineConfig) {
        let pairs = ledger.candidate_pairs();
        let mut found = Vec::new();
        for (a_id, b_id) in pairs {
            let a = ledger.get(&a_id).cloned();
            let b = ledger.get(&b_id).cloned();
            let (Some(a), Some(b)) = (a, b) else { continue };
            if let Some(contradiction) = self.check_pair(&a, &b, config) {
                found.push(contradiction);
            }
        }
        for c in found {
            ledger.add_contradiction(c);
        }
    }

    /// Check one pair against the five categories in priority order,
    /// returning the first that fires.
    fn check_pair(&self, a: &Claim, b: &Claim, config: &EngineConfig) -> Option<Contradiction> {
        if let Some((sev, values)) = self.numerical(a, b, config) {
            return Some(self.build(a, b, ContradictionType::Numerical, sev, values));
        }
        if let Some((sev, values)) = self.temporal(a, b, config) {
            return Some(self.build(a, b, ContradictionType::Temporal, sev, values));
        }
        if let Some(values) = self.polarity(a, b) {
            return Some(self.build(a, b, ContradictionType::Polarity, Severity::High, values));
        }
        if let Some(values) = self.logical(a, b) {
            return Some(self.build(a, b, ContradictionType::Logical, Severity::High, values));
        }
        if let Some(values) = self.definitional(a, b) {
            return Some(self.build(a, b, ContradictionType::Definitional, Severity::Medium, values));
        }
        None
    }

    /// Extracts a typed quantity from each claim and compares them only
    /// when both resolve to the same unit category; a duration can never
    /// contradict a dollar amount. Claims that both parse as dates are left
    /// entirely to `temporal`, so a bare-number fallback never mistakes a
    /// date fragment (a quarter marker's digit, a month/day pair) for an
    /// unrelated numeric quantity.
    fn numerical(
        &self,
        a: &Claim,
        b: &Claim,
        config: &EngineConfig,
    ) -> Option<(Severity, ContradictionValues)> {
        if extract_date(&a.text).is_some() && extract_date(&b.text).is_some() {
            return None;
        }
        let left = extract_quantity(&a.text)?;
        let right = extract_quantity(&b.text)?;
        let (left_val, right_val, metric) = match (left, right) {
            (NumericQuantity::Days(l), NumericQuantity::Days(r)) => (l, r, "duration_days"),
            (NumericQuantity::Usd(l), NumericQuantity::Usd(r)) => (l, r, "amount_usd"),
            (NumericQuantity::Ratio(l), NumericQuantity::Ratio(r)) => (l, r, "ratio"),
            (NumericQuantity::Bare(l), NumericQuantity::Bare(r)) => (l, r, "numeric_value"),
            _ => return None,
        };
        let max = left_val.abs().max(right_val.abs());
        if max == 0.0 {
            return None;
        }
        let relative_diff = (left_val - right_val).abs() / max;
        if relative_diff <= config.numerical_tolerance_percent {
            return None;
        }
        // Thresholds are fixed per spec.md §4.3, independent of the
        // configurable contradiction-trigger tolerance above.
        let severity = if relative_diff > 0.50 {
            Severity::High
        } else if relative_diff > 0.30 {
            Severity::Medium
        } else {
            Severity::Low
        };
        Some((
            severity,
            ContradictionValues {
                left: left_val.to_string(),
                right: right_val.to_string(),
                metric: metric.to_string(),
            },
        ))
    }

    fn temporal(
        &self,
        a: &Claim,
        b: &Claim,
        config: &EngineConfig,
    ) -> Option<(Severity, ContradictionValues)> {
        let left = extract_date(&a.text)?;
        let right = extract_date(&b.text)?;
        let diff_days = (left - right).num_days().abs();
        if diff_days <= config.temporal_tolerance_days {
            return None;
        }
        // Fixed absolute thresholds per spec.md §4.3, independent of the
        // configurable contradiction-trigger tolerance above.
        let severity = if diff_days > 90 {
            Severity::High
        } else if diff_days > 30 {
            Severity::Medium
        } else {
            Severity::Low
        };
        Some((
            severity,
            ContradictionValues {
                left: left.to_string(),
                right: right.to_string(),
                metric: "date".to_string(),
            },
        ))
    }

    fn polarity(&self, a: &Claim, b: &Claim) -> Option<ContradictionValues> {
        let a_text = a.text.to_lowercase();
        let b_text = b.text.to_lowercase();
        for (positive, negated) in POLARITY_PAIRS.iter() {
            let a_pos = a_text.contains(positive) && !a_text.contains(negated);
            let b_neg = b_text.contains(negated);
            let a_neg = a_text.contains(negated);
            let b_pos = b_text.contains(positive) && !b_text.contains(negated);
            if (a_pos && b_neg) || (a_neg && b_pos) {
                return Some(ContradictionValues {
                    left: positive.to_string(),
                    right: negated.to_string(),
                    metric: "polarity".to_string(),
                });
            }
        }
        None
    }

    fn logical(&self, a: &Claim, b: &Claim) -> Option<ContradictionValues> {
        let a_text = a.text.to_lowercase();
        let b_text = b.text.to_lowercase();
        for (left, right) in LOGICAL_PAIRS.iter() {
            let a_left = a_text.contains(left) && !a_text.contains(right);
            let b_right = b_text.contains(right);
            let a_right = a_text.contains(right);
            let b_left = b_text.contains(left) && !b_text.contains(right);
            if (a_left && b_right) || (a_right && b_left) {
                return Some(ContradictionValues {
                    left: left.to_string(),
                    right: right.to_string(),
                    metric: "modal".to_string(),
                });
            }
        }
        None
    }

    /// Stop-word-filtered keyword Jaccard similarity; fires for any
    /// same-type pair (candidate_pairs upstream already guarantees same
    /// claim type) whose keyword sets overlap by less than 30%.
    fn definitional(&self, a: &Claim, b: &Claim) -> Option<ContradictionValues> {
        let left = keyword_set(&a.text);
        let right = keyword_set(&b.text);
        if left.is_empty() || right.is_empty() {
            return None;
        }
        let intersection = left.intersection(&right).count();
        let union = left.union(&right).count();
        if union == 0 {
            return None;
        }
        let jaccard = intersection as f64 / union as f64;
        if jaccard < 0.3 {
            Some(ContradictionValues {
                left: a.text.clone(),
                right: b.text.clone(),
                metric: "definition".to_string(),
            })
        } else {
            None
        }
    }

    fn build(
        &self,
        a: &Claim,
        b: &Claim,
        contradiction_type: ContradictionType,
        severity: Severity,
        values: ContradictionValues,
    ) -> Contradiction {
        let resolution = resolve(a, b, severity);
        Contradiction {
            id: Uuid::new_v4(),
            contradiction_type,
            severity,
            claim_pair: (a.id.clone(), b.id.clone()),
            values,
            resolution,
            resolved_at: None,
            resolution_strategy: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClaimProvenance, ClaimType, Origin, Provider};
    use chrono::Utc;
    use uuid::Uuid as UuidT;

    fn claim(id: &str, text: &str, origin: Origin, claim_type: ClaimType, task: Option<UuidT>) -> Claim {
        claim_in_doc(id, text, origin, claim_type, task, "doc.pdf")
    }

    fn claim_in_doc(
        id: &str,
        text: &str,
        origin: Origin,
        claim_type: ClaimType,
        task: Option<UuidT>,
        document_name: &str,
    ) -> Claim {
        Claim {
            id: id.to_string(),
            task_id: task,
            text: text.to_string(),
            claim_type,
            origin,
            confidence: 0.8,
            source: ClaimProvenance {
                document_name: document_name.to_string(),
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
    fn numerical_contradiction_explicit_beats_inferred() {
        let config = EngineConfig::default();
        let detector = ContradictionDetector::new();
        let mut ledger = ClaimLedger::new();
        ledger.insert(claim("a", "Duration is 90 days", Origin::Explicit, ClaimType::Duration, None));
        ledger.insert(claim("b", "Duration is 150 days", Origin::Inferred, ClaimType::Duration, None));

        detector.detect_all(&mut ledger, &config);
        let contradictions: Vec<_> = ledger.contradictions().collect();
        assert_eq!(contradictions.len(), 1);
        assert_eq!(contradictions[0].contradiction_type, ContradictionType::Numerical);
        assert_eq!(contradictions[0].resolution.preferred_claim.as_deref(), Some("a"));
        assert!(contradictions[0].resolved_at.is_none());
    }

    #[test]
    fn within_tolerance_is_not_a_contradiction() {
        let config = EngineConfig::default();
        let detector = ContradictionDetector::new();
        let mut ledger = ClaimLedger::new();
        ledger.insert(claim("a", "Duration is 90 days", Origin::Explicit, ClaimType::Duration, None));
        ledger.insert(claim("b", "Duration is 95 days", Origin::Explicit, ClaimType::Duration, None));

        detector.detect_all(&mut ledger, &config);
        assert_eq!(ledger.contradictions().count(), 0);
    }

    #[test]
    fn equivalent_durations_in_different_units_are_not_a_contradiction() {
        let config = EngineConfig::default();
        let detector = ContradictionDetector::new();
        let mut ledger = ClaimLedger::new();
        ledger.insert(claim("a", "Duration is 1 month", Origin::Explicit, ClaimType::Duration, None));
        ledger.insert(claim("b", "Duration is 30 days", Origin::Explicit, ClaimType::Duration, None));

        detector.detect_all(&mut ledger, &config);
        assert_eq!(ledger.contradictions().count(), 0);
    }

    #[test]
    fn incompatible_unit_categories_are_never_compared() {
        let config = EngineConfig::default();
        let detector = ContradictionDetector::new();
        let mut ledger = ClaimLedger::new();
        ledger.insert(claim(
            "a",
            "Filing process duration is 90 days",
            Origin::Explicit,
            ClaimType::Duration,
            None,
        ));
        ledger.insert(claim(
            "b",
            "Filing process duration is $900",
            Origin::Explicit,
            ClaimType::Duration,
            None,
        ));

        detector.detect_all(&mut ledger, &config);
        assert_eq!(ledger.contradictions().count(), 0);
    }

    #[test]
    fn temporal_contradiction_resolved_by_authority() {
        let config = EngineConfig::default();
        let detector = ContradictionDetector::new();
        let mut ledger = ClaimLedger::new();
        ledger.insert(claim_in_doc(
            "a",
            "Filing deadline is 2025-01-01",
            Origin::Explicit,
            ClaimType::EndDate,
            None,
            "FDA_Guidelines.pdf",
        ));
        ledger.insert(claim_in_doc(
            "b",
            "Filing deadline is 2025-03-01",
            Origin::Explicit,
            ClaimType::EndDate,
            None,
            "internal_memo.md",
        ));

        detector.detect_all(&mut ledger, &config);
        let contradictions: Vec<_> = ledger.contradictions().collect();
        assert_eq!(contradictions.len(), 1);
        assert_eq!(contradictions[0].contradiction_type, ContradictionType::Temporal);
        assert_eq!(contradictions[0].resolution.preferred_claim.as_deref(), Some("a"));
    }

    #[test]
    fn temporal_contradiction_matches_english_month_and_slash_dates() {
        let config = EngineConfig::default();
        let detector = ContradictionDetector::new();
        let mut ledger = ClaimLedger::new();
        ledger.insert(claim("a", "Filing deadline is January 1, 2025", Origin::Explicit, ClaimType::EndDate, None));
        ledger.insert(claim("b", "Filing deadline is 03/01/2025", Origin::Explicit, ClaimType::EndDate, None));

        detector.detect_all(&mut ledger, &config);
        assert_eq!(ledger.contradictions().count(), 1);
    }

    #[test]
    fn temporal_contradiction_matches_quarter_dates() {
        let config = EngineConfig::default();
        let detector = ContradictionDetector::new();
        let mut ledger = ClaimLedger::new();
        ledger.insert(claim("a", "Filing deadline is Q1 2025", Origin::Explicit, ClaimType::EndDate, None));
        ledger.insert(claim("b", "Filing deadline is Q4 2025", Origin::Explicit, ClaimType::EndDate, None));

        detector.detect_all(&mut ledger, &config);
        let contradictions: Vec<_> = ledger.contradictions().collect();
        assert_eq!(contradictions.len(), 1);
        assert_eq!(contradictions[0].contradiction_type, ContradictionType::Temporal);
    }

    #[test]
    fn polarity_contradiction_on_positive_vs_negated() {
        let config = EngineConfig::default();
        let detector = ContradictionDetector::new();
        let mut ledger = ClaimLedger::new();
        ledger.insert(claim("a", "Approval is required", Origin::Explicit, ClaimType::Requirement, None));
        ledger.insert(claim("b", "Approval is not required", Origin::Explicit, ClaimType::Requirement, None));

        detector.detect_all(&mut ledger, &config);
        let contradictions: Vec<_> = ledger.contradictions().collect();
        assert_eq!(contradictions.len(), 1);
        assert_eq!(contradictions[0].contradiction_type, ContradictionType::Polarity);
    }

    #[test]
    fn logical_contradiction_on_fixed_opposite_pair() {
        let config = EngineConfig::default();
        let detector = ContradictionDetector::new();
        let mut ledger = ClaimLedger::new();
        ledger.insert(claim(
            "a",
            "Review is mandatory for this filing",
            Origin::Explicit,
            ClaimType::Requirement,
            None,
        ));
        ledger.insert(claim(
            "b",
            "Review is voluntary for this filing",
            Origin::Explicit,
            ClaimType::Requirement,
            None,
        ));

        detector.detect_all(&mut ledger, &config);
        let contradictions: Vec<_> = ledger.contradictions().collect();
        assert_eq!(contradictions.len(), 1);
        assert_eq!(contradictions[0].contradiction_type, ContradictionType::Logical);
    }

    #[test]
    fn definitional_contradiction_on_low_keyword_overlap() {
        let config = EngineConfig::default();
        let detector = ContradictionDetector::new();
        let mut ledger = ClaimLedger::new();
        ledger.insert(claim(
            "a",
            "Escrow means funds held by a neutral third party pending closing",
            Origin::Explicit,
            ClaimType::Generic,
            None,
        ));
        ledger.insert(claim(
            "b",
            "Escrow refers to a penalty assessed against late filers",
            Origin::Explicit,
            ClaimType::Generic,
            None,
        ));

        detector.detect_all(&mut ledger, &config);
        let contradictions: Vec<_> = ledger.contradictions().collect();
        assert_eq!(contradictions.len(), 1);
        assert_eq!(contradictions[0].contradiction_type, ContradictionType::Definitional);
    }

    #[test]
    fn same_task_pairs_are_skipped() {
        let config = EngineConfig::default();
        let detector = ContradictionDetector::new();
        let mut ledger = ClaimLedger::new();
        let task = UuidT::new_v4();
        ledger.insert(claim("a", "Duration is 90 days", Origin::Explicit, ClaimType::Duration, Some(task)));
        ledger.insert(claim("b", "Duration is 400 days", Origin::Explicit, ClaimType::Duration, Some(task)));

        detector.detect_all(&mut ledger, &config);
        assert_eq!(ledger.contradictions().count(), 0);
    }
}
