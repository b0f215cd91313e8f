//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::time::Duration;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Lifecycle of a single proxy inside the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStage {
    /// Queued, waiting for a concurrency permit
    Pending,
    /// Latency probe running
    Probing,
    /// Throughput measurement running
    Measuring,
    /// Throughput skipped (fast mode or unreachable)
    SkippedThroughput,
    /// Result delivered
    Completed,
}

impl ProbeStage {
    /// Whether `next` is a legal successor of this stage
    pub fn can_advance_to(self, next: ProbeStage) -> bool {
        matches!(
            (self, next),
            (ProbeStage::Pending, ProbeStage::Probing)
                | (ProbeStage::Probing, ProbeStage::Measuring)
                | (ProbeStage::Probing, ProbeStage::SkippedThroughput)
                | (ProbeStage::Measuring, ProbeStage::Completed)
                | (ProbeStage::SkippedThroughput, ProbeStage::Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStage::Pending => "pending",
            ProbeStage::Probing => "probing",
            ProbeStage::Measuring => "measuring",
            ProbeStage::SkippedThroughput => "skipped-throughput",
            ProbeStage::Completed => "completed",
        }
    }
}

/// Overall outcome of one proxy test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    /// All probe samples succeeded
    Success,
    /// Some probe samples failed
    Degraded,
    /// No probe sample succeeded
    Unreachable,
}

/// Color band used when rendering a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceLevel {
    Good,
    Moderate,
    Poor,
}

impl PerformanceLevel {
    /// Latency and jitter bands: < 800ms good, < 1500ms moderate
    pub fn from_latency(duration: Option<Duration>) -> Self {
        match duration {
            Some(d) if !d.is_zero() && d < Duration::from_millis(800) => Self::Good,
            Some(d) if !d.is_zero() && d < Duration::from_millis(1500) => Self::Moderate,
            _ => Self::Poor,
        }
    }

    /// Same bands as latency, but zero jitter is good
    pub fn from_jitter(jitter: Option<Duration>) -> Self {
        match jitter {
            Some(d) if d.is_zero() => Self::Good,
            other => Self::from_latency(other),
        }
    }

    /// Packet loss bands on a [0, 1] fraction: < 10% good, < 20% moderate
    pub fn from_packet_loss(loss: f64) -> Self {
        if loss < 0.10 {
            Self::Good
        } else if loss < 0.20 {
            Self::Moderate
        } else {
            Self::Poor
        }
    }

    /// Speed bands in MB/s
    pub fn from_speed(mb_per_sec: Option<f64>, good: f64, moderate: f64) -> Self {
        match mb_per_sec {
            Some(speed) if speed >= good => Self::Good,
            Some(speed) if speed >= moderate => Self::Moderate,
            _ => Self::Poor,
        }
    }
}
