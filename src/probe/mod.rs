//! Latency probing through a proxy transport
//!
//! A probe is a fixed number of independent lightweight GETs against the
//! test endpoint. Each attempt is bounded by the probe timeout, and the whole
//! probe, pauses between attempts included, by `sample_count * timeout`. The
//! samples are folded into latency, jitter and packet loss by [`crate::stats`].

use crate::{
    client::ProxyTransport,
    models::{LatencyStats, ProbeSample, TestConfig},
    stats::LatencyCalculator,
};
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};

/// Repeated round trips against one endpoint
#[derive(Debug, Clone)]
pub struct LatencyProbe {
    sample_count: u32,
    timeout: Duration,
    interval: Duration,
}

impl LatencyProbe {
    pub fn new(sample_count: u32, timeout: Duration, interval: Duration) -> Self {
        Self {
            sample_count,
            timeout,
            interval,
        }
    }

    pub fn from_config(config: &TestConfig) -> Self {
        Self::new(config.probe_count, config.timeout, config.probe_interval)
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Probe `endpoint` through `transport` and derive latency stats.
    ///
    /// Never fails: errors and timeouts become failed samples.
    pub async fn probe(&self, transport: &dyn ProxyTransport, endpoint: &str) -> LatencyStats {
        let samples = self.collect_samples(transport, endpoint).await;
        LatencyCalculator::new().calculate(&samples)
    }

    /// Longest a single [`probe`](Self::probe) call can take
    pub fn budget(&self) -> Duration {
        self.timeout * self.sample_count
    }

    /// Run every attempt and return the raw samples in order.
    ///
    /// Attempts that the budget leaves no room for count as timed out.
    pub async fn collect_samples(&self, transport: &dyn ProxyTransport, endpoint: &str) -> Vec<ProbeSample> {
        let deadline = Instant::now() + self.budget();
        let mut samples = Vec::with_capacity(self.sample_count as usize);

        for attempt in 0..self.sample_count {
            if attempt > 0 && !self.interval.is_zero() {
                sleep_until((Instant::now() + self.interval).min(deadline)).await;
            }

            let now = Instant::now();
            if now >= deadline {
                samples.push(ProbeSample::TimedOut);
                continue;
            }
            let attempt_deadline = (now + self.timeout).min(deadline);
            samples.push(self.sample_before(transport, endpoint, attempt_deadline).await);
        }

        samples
    }

    /// One round trip bounded by the probe timeout
    pub async fn sample_once(&self, transport: &dyn ProxyTransport, endpoint: &str) -> ProbeSample {
        self.sample_before(transport, endpoint, Instant::now() + self.timeout).await
    }

    /// RTT is measured up to the response head
    async fn sample_before(&self, transport: &dyn ProxyTransport, endpoint: &str, deadline: Instant) -> ProbeSample {
        let start = Instant::now();

        match timeout_at(deadline, transport.get(endpoint)).await {
            Ok(Ok(response)) if response.is_success() => ProbeSample::Success(start.elapsed()),
            Ok(Ok(_)) | Ok(Err(_)) => ProbeSample::Failed,
            Err(_) => ProbeSample::TimedOut,
        }
    }
}

impl Default for LatencyProbe {
    fn default() -> Self {
        Self::from_config(&TestConfig::default())
    }
}
