//! Gradient analysis: classifies how average latency grows between levels

use std::fmt;

use crate::aggregator::ProbeResult;

/// Classification of a latency ratio against the accepted gradient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Critical,
    Severe,
    Moderate,
    Normal,
    Improving,
}

impl Severity {
    /// Band lookup, first match wins
    pub fn classify(ratio: f64, threshold: f64) -> Self {
        if ratio > 2.0 * threshold {
            Self::Critical
        } else if ratio > 1.6 * threshold {
            Self::Severe
        } else if ratio > 1.2 * threshold {
            Self::Moderate
        } else if ratio < 0.8 * threshold {
            Self::Improving
        } else {
            Self::Normal
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Critical => "critical",
            Self::Severe => "severe",
            Self::Moderate => "moderate",
            Self::Normal => "normal",
            Self::Improving => "improving",
        };
        f.write_str(label)
    }
}

/// Latency ratio between two levels and its classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gradient {
    /// `current.avg_time_total / previous.avg_time_total`
    pub ratio: f64,
    /// `current.client_count - previous.client_count`
    pub distance: usize,
    pub severity: Severity,
}

/// Compares a level against an earlier one
#[derive(Debug, Clone, Copy)]
pub struct GradientAnalyzer {
    accepted_gradient: f64,
}

impl GradientAnalyzer {
    pub fn new(accepted_gradient: f64) -> Self {
        Self { accepted_gradient }
    }

    /// Classify `current` against `previous`, with the accepted gradient scaled by `scale`.
    ///
    /// Returns `None` when there is nothing to compare with: no previous level,
    /// or a previous average that is zero or undefined. An undefined current
    /// average yields `None` as well.
    pub fn analyze(
        &self,
        current: &ProbeResult,
        previous: Option<&ProbeResult>,
        scale: f64,
    ) -> Option<Gradient> {
        let previous = previous?;
        let base = previous.avg_time_total_ms;
        if !base.is_finite() || base == 0.0 || !current.avg_time_total_ms.is_finite() {
            return None;
        }

        let ratio = current.avg_time_total_ms / base;
        let threshold = self.accepted_gradient * scale;
        Some(Gradient {
            ratio,
            distance: current.client_count.saturating_sub(previous.client_count),
            severity: Severity::classify(ratio, threshold),
        })
    }
}
