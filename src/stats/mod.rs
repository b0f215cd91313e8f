//! Latency statistics calculations
//!
//! Turns a run of probe samples into mean latency, jitter and packet loss.
//! Sums are accumulated in a single pass over the successful round trips and
//! variance is the population variance (divide by the sample count).

use crate::models::{LatencyStats, ProbeSample};
use std::time::Duration;

/// Mean and population standard deviation of a set of values.
///
/// Returns `None` for an empty slice; standard deviation is zero for a
/// single value.
pub fn mean_and_std_dev(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }

    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;

    let variance = if values.len() > 1 {
        let sum_squared_diff: f64 = values
            .iter()
            .map(|&x| {
                let diff = x - mean;
                diff * diff
            })
            .sum();
        sum_squared_diff / count
    } else {
        0.0
    };

    Some((mean, variance.max(0.0).sqrt()))
}

/// Calculator that reuses its buffer across proxies
#[derive(Debug, Default)]
pub struct LatencyCalculator {
    rtt_buffer: Vec<f64>,
}

impl LatencyCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive latency stats from probe samples.
    ///
    /// Failed and timed out samples count toward packet loss only; they are
    /// excluded from the latency mean and from jitter.
    pub fn calculate(&mut self, samples: &[ProbeSample]) -> LatencyStats {
        let total = samples.len();
        if total == 0 {
            return LatencyStats::unreachable(0);
        }

        self.rtt_buffer.clear();
        self.rtt_buffer.extend(
            samples
                .iter()
                .filter_map(ProbeSample::rtt)
                .map(|rtt| rtt.as_secs_f64()),
        );

        let successes = self.rtt_buffer.len();
        let packet_loss = (total - successes) as f64 / total as f64;

        // Mean in integer nanoseconds so whole-millisecond inputs stay exact
        let rtt_nanos: u128 = samples
            .iter()
            .filter_map(ProbeSample::rtt)
            .map(|rtt| rtt.as_nanos())
            .sum();

        match mean_and_std_dev(&self.rtt_buffer) {
            Some((_, std_dev)) => LatencyStats {
                latency: Some(Duration::from_nanos(
                    (rtt_nanos / successes as u128).min(u64::MAX as u128) as u64,
                )),
                jitter: if successes < 2 {
                    Duration::ZERO
                } else {
                    Duration::from_secs_f64(std_dev)
                },
                packet_loss,
                total_samples: total as u32,
                successful_samples: successes as u32,
            },
            None => LatencyStats::unreachable(total as u32),
        }
    }
}

impl LatencyStats {
    /// Convenience wrapper around [`LatencyCalculator::calculate`]
    pub fn from_samples(samples: &[ProbeSample]) -> Self {
        LatencyCalculator::new().calculate(samples)
    }
}
