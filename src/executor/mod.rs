//! Bounded-concurrency test orchestration
//!
//! Every proxy gets its own tokio task. A semaphore caps how many run at
//! once, and finished results flow through a single-consumer channel drained
//! by [`TestOrchestrator::run`], so the caller's callback is never invoked
//! concurrently. Exactly one result is delivered per submitted proxy, even
//! when a worker task panics.

use crate::{
    client::ProxyAdapter,
    error::AppError,
    logging::Logger,
    models::{LatencyStats, ProxyDescriptor, TestConfig, TestResult},
    probe::LatencyProbe,
    throughput::ThroughputMeter,
    types::{ProbeStage, TestStatus},
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, Semaphore},
    time::Instant,
};

/// Counts and wall-clock duration of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_proxies: usize,
    /// Every probe sample succeeded
    pub successful: usize,
    /// Reachable with some packet loss
    pub degraded: usize,
    pub unreachable: usize,
    /// Workers that panicked and were replaced by a degraded result
    pub panicked: usize,
    pub total_duration: Duration,
}

impl ExecutionSummary {
    fn record(&mut self, result: &TestResult) {
        match result.status() {
            TestStatus::Success => self.successful += 1,
            TestStatus::Degraded => self.degraded += 1,
            TestStatus::Unreachable => self.unreachable += 1,
        }
    }

    /// Reachable proxies as a percentage of all proxies
    pub fn success_rate(&self) -> f64 {
        if self.total_proxies == 0 {
            0.0
        } else {
            (self.successful + self.degraded) as f64 / self.total_proxies as f64 * 100.0
        }
    }
}

/// Runs probe then throughput for every proxy under a concurrency bound
pub struct TestOrchestrator {
    adapter: Arc<dyn ProxyAdapter>,
    config: Arc<TestConfig>,
    logger: Arc<Logger>,
}

impl TestOrchestrator {
    pub fn new(adapter: Arc<dyn ProxyAdapter>, config: TestConfig) -> Self {
        Self {
            adapter,
            config: Arc::new(config),
            logger: Arc::new(Logger::quiet("EXEC".to_string())),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Test every proxy, calling `on_result` once per proxy as results
    /// complete. Returns after the last call.
    pub async fn run<F>(&self, proxies: Vec<ProxyDescriptor>, mut on_result: F) -> ExecutionSummary
    where
        F: FnMut(TestResult),
    {
        let start = Instant::now();
        let mut summary = ExecutionSummary {
            total_proxies: proxies.len(),
            ..Default::default()
        };

        if proxies.is_empty() {
            return summary;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let (result_sender, mut result_receiver) = mpsc::channel::<(usize, TestResult)>(proxies.len());

        crate::log_info!(
            self.logger,
            "Testing {} proxies with {} workers",
            proxies.len(),
            self.config.concurrency
        );

        let mut tasks = Vec::with_capacity(proxies.len());
        for (index, descriptor) in proxies.iter().cloned().enumerate() {
            let adapter = self.adapter.clone();
            let config = self.config.clone();
            let logger = self.logger.clone();
            let semaphore = semaphore.clone();
            let sender = result_sender.clone();

            tasks.push(tokio::spawn(async move {
                // Only fails on a closed semaphore
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };

                let result = test_proxy(adapter.as_ref(), &config, &logger, &descriptor).await;
                let _ = sender.send((index, result)).await;
            }));
        }

        // Drop the sender to signal completion
        drop(result_sender);

        let mut delivered = vec![false; proxies.len()];
        while let Some((index, result)) = result_receiver.recv().await {
            delivered[index] = true;
            summary.record(&result);
            on_result(result);
        }

        // A worker that died before sending still owes its proxy a result
        for (index, task) in tasks.into_iter().enumerate() {
            if let Err(join_error) = task.await {
                if !delivered[index] {
                    let descriptor = &proxies[index];
                    let error = AppError::test_execution(format!(
                        "worker for proxy '{}' failed: {}",
                        descriptor.name, join_error
                    ));
                    self.logger.error(&error.to_string()).error_info(&error).log();
                    let result = TestResult::unreachable(descriptor);
                    delivered[index] = true;
                    summary.panicked += 1;
                    summary.record(&result);
                    on_result(result);
                }
            }
        }

        summary.total_duration = start.elapsed();

        self.logger
            .info("Run complete")
            .field("total", summary.total_proxies)
            .field("successful", summary.successful)
            .field("degraded", summary.degraded)
            .field("unreachable", summary.unreachable)
            .field("duration_ms", summary.total_duration.as_millis() as u64)
            .log();

        summary
    }
}

/// Stage bookkeeping for one proxy
struct StageTracker<'a> {
    stage: ProbeStage,
    proxy: &'a str,
    logger: &'a Logger,
}

impl<'a> StageTracker<'a> {
    fn new(proxy: &'a str, logger: &'a Logger) -> Self {
        Self {
            stage: ProbeStage::Pending,
            proxy,
            logger,
        }
    }

    fn advance(&mut self, next: ProbeStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal stage transition {:?} -> {:?}",
            self.stage,
            next
        );
        self.stage = next;
        self.logger
            .debug("stage")
            .field("proxy", self.proxy)
            .field("stage", next.as_str())
            .log();
    }
}

/// Full pipeline for one proxy: dial, probe, then throughput unless skipped
pub async fn test_proxy(
    adapter: &dyn ProxyAdapter,
    config: &TestConfig,
    logger: &Logger,
    descriptor: &ProxyDescriptor,
) -> TestResult {
    let mut tracker = StageTracker::new(&descriptor.name, logger);
    tracker.advance(ProbeStage::Probing);

    let transport = match adapter.dial(descriptor) {
        Ok(transport) => transport,
        Err(e) => {
            logger
                .warn(&format!("Cannot dial proxy '{}': {}", descriptor.name, e))
                .error_info(&e)
                .log();
            tracker.advance(ProbeStage::SkippedThroughput);
            tracker.advance(ProbeStage::Completed);
            return TestResult::new(descriptor, LatencyStats::unreachable(config.probe_count), None, None);
        }
    };

    let stats = LatencyProbe::from_config(config)
        .probe(transport.as_ref(), &config.probe_url())
        .await;

    let result = if config.fast_mode || !stats.is_reachable() {
        tracker.advance(ProbeStage::SkippedThroughput);
        TestResult::new(descriptor, stats, None, None)
    } else {
        tracker.advance(ProbeStage::Measuring);
        let (download, upload) = ThroughputMeter::from_config(config)
            .measure(
                transport.as_ref(),
                &config.server_url,
                config.download_size,
                config.upload_size,
            )
            .await;
        TestResult::new(descriptor, stats, download, upload)
    };

    tracker.advance(ProbeStage::Completed);
    logger.debug("Proxy tested").result(&result).log();

    result
}
