//! Telemetry sample and policy limits shared between the monitor loop and the
//! policy engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One monitor sample of the supervised process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Rolling CPU percentage of the child process.
    pub cpu_percent: f64,
    /// How long CPU has been continuously above the policy ceiling.
    pub cpu_over_for: Duration,
    /// Max n-gram repetition ratio over the recent output window (0..1).
    pub log_repetition: f64,
    /// Shannon entropy over the recent output window's byte distribution.
    pub log_entropy: f64,
    /// Unique-line / total-line ratio over the sliding window (0..1).
    pub raw_diversity: f64,
    /// Whether the output matches a progressing-work pattern.
    pub progress_like: bool,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            cpu_percent: 0.0,
            cpu_over_for: Duration::ZERO,
            log_repetition: 0.0,
            log_entropy: 0.0,
            raw_diversity: 1.0,
            progress_like: false,
        }
    }
}

/// Threshold configuration for the decider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyLimits {
    pub max_cpu_percent: f64,
    pub cpu_window: Duration,
    pub min_log_entropy: f64,
    pub max_log_repetition: f64,
}

impl Default for PolicyLimits {
    fn default() -> Self {
        Self {
            max_cpu_percent: 90.0,
            cpu_window: Duration::from_secs(10),
            min_log_entropy: 2.5,
            max_log_repetition: 0.8,
        }
    }
}

impl PolicyLimits {
    pub fn max_cpu_percent(mut self, v: f64) -> Self {
        self.max_cpu_percent = v;
        self
    }

    pub fn cpu_window(mut self, v: Duration) -> Self {
        self.cpu_window = v;
        self
    }

    pub fn min_log_entropy(mut self, v: f64) -> Self {
        self.min_log_entropy = v;
        self
    }

    pub fn max_log_repetition(mut self, v: f64) -> Self {
        self.max_log_repetition = v;
        self
    }
}
