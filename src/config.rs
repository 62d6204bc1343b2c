//! Engine configuration surface.
//!
//! One struct collecting every recognized option, with a
//! `Default` matching the documented defaults. Modeled on
//! `ProvenanceConfig` (see `provenance/src/lib.rs`): a flat, serializable
//! config object with sub-sections passed by reference into every stage,
//! never a module-level singleton.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::Provider;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// CITATION_COVERAGE gate threshold.
    pub citation_coverage_threshold: f64,
    /// CONFIDENCE_MINIMUM gate threshold.
    pub min_confidence: f64,
    /// Numerical contradiction relative-difference tolerance.
    pub numerical_tolerance_percent: f64,
    /// Temporal contradiction day tolerance.
    pub temporal_tolerance_days: i64,
    /// Fuzzy citation match acceptance threshold.
    pub similarity_threshold: f64,
    /// Context-search window (characters) around a citation's declared range.
    pub context_window_size: usize,
    /// Per-provider trust weights used by the Provenance Auditor.
    pub provider_weights: HashMap<Provider, f64>,
    /// Providers considered trusted for provider-weight extensions.
    pub trusted_providers: Vec<Provider>,
    /// Repair passes allowed per gate per request.
    pub max_repair_attempts: u32,
    /// Threshold for the optional post-hoc hallucination check.
    pub hallucination_threshold: f64,
    /// PROVENANCE_QUALITY gate warning threshold (0-100 scale).
    pub provenance_quality_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut provider_weights = HashMap::new();
        provider_weights.insert(Provider::Internal, 1.0);
        provider_weights.insert(Provider::Claude, 0.95);
        provider_weights.insert(Provider::Gemini, 0.9);
        provider_weights.insert(Provider::Gpt, 0.9);
        provider_weights.insert(Provider::Grok, 0.9);
        provider_weights.insert(Provider::Unknown, 0.5);

        Self {
            citation_coverage_threshold: 0.75,
            min_confidence: 0.50,
            numerical_tolerance_percent: 0.20,
            temporal_tolerance_days: 7,
            similarity_threshold: 0.85,
            context_window_size: 200,
            provider_weights,
            trusted_providers: vec![Provider::Internal, Provider::Claude],
            max_repair_attempts: 1,
            hallucination_threshold: 0.5,
            provenance_quality_threshold: 70.0,
        }
    }
}

impl EngineConfig {
    pub fn provider_weight(&self, provider: &Provider) -> f64 {
        self.provider_weights
            .get(provider)
            .copied()
            .unwrap_or(0.5)
    }
}
