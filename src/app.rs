//! Main application orchestration and execution

use crate::{
    cli::Cli,
    client::{ProxyAdapter, ReqwestAdapter},
    config::{display_config_summary, load_config},
    error::Result,
    executor::TestOrchestrator,
    logging::{Logger, LoggerFactory},
    models::{AppConfig, TestResult},
    output::{ClashConfigWriter, GeoLocator, NodeRenamer, QualityThresholds, ResultTable},
    registry::{CompatibilityMode, ConfigSource, ProxyFilter, ProxyRegistry},
    storage::{merge_results, select_untested, sort_results, ResultStore},
};
use colored::Colorize;
use std::{path::Path, sync::Arc};

/// Report panics on stderr and let them unwind.
///
/// A panicking proxy task is caught by the runtime and folded into an
/// unreachable result; only a panic on the main task ends the process.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
    }));
}

/// Main application struct that coordinates all components
pub struct App {
    config: AppConfig,
    adapter: Arc<dyn ProxyAdapter>,
    loggers: LoggerFactory,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Result<Self> {
        Ok(Self::from_config(load_config(cli)?))
    }

    /// Use an already-built configuration and the built-in adapter
    pub fn from_config(config: AppConfig) -> Self {
        let adapter = Arc::new(ReqwestAdapter::new(config.test.timeout));
        Self {
            loggers: LoggerFactory::new(config.clone()),
            config,
            adapter,
        }
    }

    /// Dial proxies through `adapter` instead of the built-in one
    pub fn with_adapter(mut self, adapter: Arc<dyn ProxyAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Load, test, merge, display and persist. Returns the ranked results.
    pub async fn run(&self) -> Result<Vec<TestResult>> {
        let config = &self.config;
        let logger = self.loggers.create_logger("APP");

        if config.debug {
            eprintln!("{} {}", crate::PKG_NAME, crate::LONG_VERSION);
            eprintln!("{}", display_config_summary(config));
        }

        let sources: Vec<ConfigSource> = config.config_sources.iter().map(|s| ConfigSource::parse(s)).collect();
        let filter = ProxyFilter::new(&config.filter, &config.block_keywords)?;
        let registry = ProxyRegistry::new(filter)?.with_logger(self.loggers.create_logger("REGISTRY"));
        let proxies = registry
            .load(&sources, CompatibilityMode::from_stash_flag(config.stash_compatible))
            .await?;

        let store = ResultStore::new(&config.results_file);
        let previous = store.load()?;
        let untested = select_untested(proxies, &previous);

        if untested.is_empty() {
            eprintln!(
                "No new proxies to test; showing {} previous results from {}",
                previous.len(),
                store.path().display()
            );
            let mut results = previous;
            sort_results(&mut results);
            self.present(&results)?;
            self.write_output(&results, &logger).await?;
            return Ok(results);
        }

        eprintln!(
            "Testing {} proxies ({} already in {})",
            untested.len(),
            previous.len(),
            store.path().display()
        );

        let orchestrator = TestOrchestrator::new(self.adapter.clone(), config.test.clone())
            .with_logger(self.loggers.create_logger("EXEC"));

        let total = untested.len();
        let mut fresh = Vec::with_capacity(total);
        let summary = orchestrator
            .run(untested, |result| {
                self.report_progress(fresh.len() + 1, total, &result);
                fresh.push(result);
            })
            .await;

        eprintln!(
            "Tested {} proxies in {:.1}s: {} ok, {} degraded, {} unreachable",
            summary.total_proxies,
            summary.total_duration.as_secs_f64(),
            summary.successful,
            summary.degraded,
            summary.unreachable
        );

        let mut results = merge_results(previous, fresh);
        sort_results(&mut results);

        self.present(&results)?;
        store.save(&results)?;
        crate::log_info!(logger, "Saved {} results to {}", results.len(), store.path().display());

        self.write_output(&results, &logger).await?;

        Ok(results)
    }

    fn report_progress(&self, done: usize, total: usize, result: &TestResult) {
        let status = if result.is_reachable() {
            format!(
                "{} jitter {} loss {}",
                result.format_latency(),
                result.format_jitter(),
                result.format_packet_loss()
            )
        } else {
            "unreachable".to_string()
        };
        let speeds = if self.config.test.fast_mode || !result.is_reachable() {
            String::new()
        } else {
            format!(
                " ⬇️ {} ⬆️ {}",
                result.format_download_speed(),
                result.format_upload_speed()
            )
        };

        let line = format!("[{}/{}] {}: {}{}", done, total, result.proxy_name, status, speeds);
        if self.config.enable_color && !result.is_reachable() {
            eprintln!("{}", line.red());
        } else {
            eprintln!("{}", line);
        }
    }

    fn present(&self, results: &[TestResult]) -> Result<()> {
        let table = ResultTable::new(self.config.enable_color, self.config.test.fast_mode);
        println!("{}", table.render(results)?);
        Ok(())
    }

    async fn write_output(&self, results: &[TestResult], logger: &Logger) -> Result<()> {
        let Some(ref output_path) = self.config.output_path else {
            return Ok(());
        };

        let thresholds = QualityThresholds::from_config(&self.config);
        let mut qualified: Vec<TestResult> = thresholds.select(results).into_iter().cloned().collect();

        if qualified.is_empty() {
            eprintln!("No proxy met the output thresholds; {} not written", output_path);
            return Ok(());
        }

        if self.config.rename {
            let renamer = NodeRenamer::new(GeoLocator::new()?)
                .with_logger(self.loggers.create_logger("RENAME"));
            let renamed = renamer.rename(&mut qualified).await;
            crate::log_info!(logger, "Renamed {} of {} proxies", renamed, qualified.len());
        }

        ClashConfigWriter::new().write(Path::new(output_path), &qualified)?;
        eprintln!("Wrote {} proxies to {}", qualified.len(), output_path);

        Ok(())
    }
}
