//! Metrics surface: ring-buffered moving averages (window
//! 100) over thirteen named series, plus a derived health score. This is
//! the one process-wide singleton the Design Notes permit — constructed
//! once by the embedding application and passed by reference into
//! `Orchestrator::validate` — modeled on the teacher's
//! `Arc<RwLock<HashMap<..>>>` baseline store in
//! `runtime-optimization/src/quality_gate_validator.rs`, generalized from
//! a single baseline map into one ring buffer per named series.

use std::sync::RwLock;

const WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricName {
    FactRatio,
    CitationCoverage,
    ContradictionRate,
    ProvenanceScore,
    RepairRate,
    ValidationTimeMs,
    GateFailureRate,
    RegulatoryAccuracy,
    BufferAdherence,
    AuditPassRate,
    CalibrationAccuracy,
    AverageConfidence,
    ConfidenceVariance,
}

impl MetricName {
    const ALL: [MetricName; 13] = [
        MetricName::FactRatio,
        MetricName::CitationCoverage,
        MetricName::ContradictionRate,
        MetricName::ProvenanceScore,
        MetricName::RepairRate,
        MetricName::ValidationTimeMs,
        MetricName::GateFailureRate,
        MetricName::RegulatoryAccuracy,
        MetricName::BufferAdherence,
        MetricName::AuditPassRate,
        MetricName::CalibrationAccuracy,
        MetricName::AverageConfidence,
        MetricName::ConfidenceVariance,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|m| *m == self).unwrap()
    }
}

/// Append-only fixed-capacity buffer: once full, the oldest sample is
/// overwritten. Readers only ever see fully-written samples.
#[derive(Debug, Default)]
struct RingBuffer {
    samples: Vec<f64>,
    next: usize,
}

impl RingBuffer {
    fn push(&mut self, value: f64) {
        if self.samples.len() < WINDOW {
            self.samples.push(value);
        } else {
            self.samples[self.next] = value;
            self.next = (self.next + 1) % WINDOW;
        }
    }

    fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.samples.iter().sum::<f64>() / self.samples.len() as f64
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub fact_ratio: f64,
    pub citation_coverage: f64,
    pub contradiction_rate: f64,
    pub provenance_score: f64,
    pub repair_rate: f64,
    pub validation_time_ms: f64,
    pub gate_failure_rate: f64,
    pub regulatory_accuracy: f64,
    pub buffer_adherence: f64,
    pub audit_pass_rate: f64,
    pub calibration_accuracy: f64,
    pub average_confidence: f64,
    pub confidence_variance: f64,
    pub health_score: f64,
}

/// Six-input weighted health score, per spec.md §6.
fn health_score(s: &MetricsSnapshot) -> f64 {
    let score = s.fact_ratio * 0.15
        + s.citation_coverage * 0.20
        + (1.0 - s.contradiction_rate) * 0.15
        + s.provenance_score * 0.15
        + s.regulatory_accuracy * 0.15
        + s.audit_pass_rate * 0.20;
    (score * 100.0).clamp(0.0, 100.0)
}

/// Process-wide moving-average collector. Writes are serialized by an
/// `RwLock` per series; readers never block each other or a writer
/// recording a different series.
#[derive(Debug)]
pub struct MetricsCollector {
    buffers: [RwLock<RingBuffer>; 13],
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            buffers: std::array::from_fn(|_| RwLock::new(RingBuffer::default())),
        }
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: MetricName, value: f64) {
        let mut buffer = self.buffers[name.index()].write().unwrap();
        buffer.push(value);
    }

    fn mean(&self, name: MetricName) -> f64 {
        self.buffers[name.index()].read().unwrap().mean()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot {
            fact_ratio: self.mean(MetricName::FactRatio),
            citation_coverage: self.mean(MetricName::CitationCoverage),
            contradiction_rate: self.mean(MetricName::ContradictionRate),
            provenance_score: self.mean(MetricName::ProvenanceScore),
            repair_rate: self.mean(MetricName::RepairRate),
            validation_time_ms: self.mean(MetricName::ValidationTimeMs),
            gate_failure_rate: self.mean(MetricName::GateFailureRate),
            regulatory_accuracy: self.mean(MetricName::RegulatoryAccuracy),
            buffer_adherence: self.mean(MetricName::BufferAdherence),
            audit_pass_rate: self.mean(MetricName::AuditPassRate),
            calibration_accuracy: self.mean(MetricName::CalibrationAccuracy),
            average_confidence: self.mean(MetricName::AverageConfidence),
            confidence_variance: self.mean(MetricName::ConfidenceVariance),
            health_score: 0.0,
        };
        snapshot.health_score = health_score(&snapshot);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_series_is_zero() {
        let collector = MetricsCollector::new();
        assert_eq!(collector.mean(MetricName::FactRatio), 0.0);
    }

    #[test]
    fn ring_buffer_overwrites_oldest_beyond_window() {
        let collector = MetricsCollector::new();
        for i in 0..150 {
            collector.record(MetricName::ValidationTimeMs, i as f64);
        }
        // Only the last 100 samples (50..=149) should remain.
        let mean = collector.mean(MetricName::ValidationTimeMs);
        let expected: f64 = (50..150).sum::<i32>() as f64 / 100.0;
        assert!((mean - expected).abs() < 1e-9);
    }

    #[test]
    fn health_score_is_bounded() {
        let collector = MetricsCollector::new();
        collector.record(MetricName::FactRatio, 1.0);
        collector.record(MetricName::CitationCoverage, 1.0);
        collector.record(MetricName::ContradictionRate, 0.0);
        collector.record(MetricName::ProvenanceScore, 1.0);
        collector.record(MetricName::RegulatoryAccuracy, 1.0);
        collector.record(MetricName::AuditPassRate, 1.0);
        let snapshot = collector.snapshot();
        assert!((snapshot.health_score - 100.0).abs() < 1e-9);
    }
}
