//! Configuration data model and validation

use crate::{defaults, throughput};
use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable run parameters shared read-only by every worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    /// Base URL of the speed test endpoint
    pub server_url: String,
    /// Bytes per download measurement; zero disables it
    pub download_size: u64,
    /// Bytes per upload measurement; zero disables it
    pub upload_size: u64,
    /// Bound on each probe round trip
    pub timeout: Duration,
    /// Bound on each throughput measurement
    pub transfer_timeout: Duration,
    /// Proxies under test at once
    pub concurrency: usize,
    /// Parallel streams inside one throughput measurement
    pub transfer_streams: usize,
    pub probe_count: u32,
    pub probe_interval: Duration,
    /// Latency only
    pub fast_mode: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            server_url: defaults::DEFAULT_SERVER_URL.to_string(),
            download_size: defaults::DEFAULT_DOWNLOAD_SIZE,
            upload_size: defaults::DEFAULT_UPLOAD_SIZE,
            timeout: defaults::DEFAULT_TIMEOUT,
            transfer_timeout: defaults::DEFAULT_TIMEOUT,
            concurrency: defaults::default_workers(),
            transfer_streams: defaults::DEFAULT_TRANSFER_STREAMS,
            probe_count: defaults::DEFAULT_PROBE_COUNT,
            probe_interval: defaults::DEFAULT_PROBE_INTERVAL,
            fast_mode: false,
        }
    }
}

impl TestConfig {
    /// Endpoint used for latency probes
    pub fn probe_url(&self) -> String {
        throughput::download_url(&self.server_url, 0)
    }

    /// Upper bound on the time one proxy can take end to end:
    /// `probe_count * timeout`, plus `transfer_timeout` unless in fast mode
    pub fn worst_case_duration(&self) -> Duration {
        let probe = self.timeout * self.probe_count;
        if self.fast_mode {
            probe
        } else {
            probe + self.transfer_timeout
        }
    }

    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.server_url)
            .map_err(|e| AppError::config(format!("Invalid server URL '{}': {}", self.server_url, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(AppError::config(format!(
                "Server URL must use http or https: {}",
                self.server_url
            )));
        }

        if self.timeout.is_zero() {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        if self.transfer_timeout.is_zero() {
            return Err(AppError::config("Transfer timeout must be greater than 0"));
        }

        if self.concurrency == 0 {
            return Err(AppError::config("Worker count must be greater than 0"));
        }

        if self.transfer_streams == 0 {
            return Err(AppError::config("Concurrent stream count must be greater than 0"));
        }

        if self.probe_count == 0 {
            return Err(AppError::config("Probe count must be greater than 0"));
        }

        if self.probe_count > 100 {
            return Err(AppError::config("Probe count cannot exceed 100"));
        }

        Ok(())
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration sources: file paths or http(s) URLs
    #[serde(default)]
    pub config_sources: Vec<String>,

    /// Include proxies whose name matches this regex
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Exclude proxies whose name contains any of these keywords
    #[serde(default)]
    pub block_keywords: Vec<String>,

    #[serde(default)]
    pub test: TestConfig,

    /// Write a pruned Clash configuration here
    #[serde(default)]
    pub output_path: Option<String>,

    #[serde(default)]
    pub stash_compatible: bool,

    /// Output filter; zero disables it
    #[serde(default = "default_max_latency")]
    pub max_latency: Duration,

    /// Output filter in MB/s; zero disables it
    #[serde(default = "default_min_download_speed")]
    pub min_download_speed: f64,

    /// Output filter in MB/s; zero disables it
    #[serde(default = "default_min_upload_speed")]
    pub min_upload_speed: f64,

    #[serde(default)]
    pub rename: bool,

    #[serde(default = "default_results_file")]
    pub results_file: String,

    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_sources: Vec::new(),
            filter: default_filter(),
            block_keywords: Vec::new(),
            test: TestConfig::default(),
            output_path: None,
            stash_compatible: false,
            max_latency: default_max_latency(),
            min_download_speed: default_min_download_speed(),
            min_upload_speed: default_min_upload_speed(),
            rename: false,
            results_file: default_results_file(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl AppConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.config_sources.is_empty() {
            return Err(AppError::config(
                "No configuration source given; pass --config <PATH|URL> or set PST_CONFIG",
            ));
        }

        for source in &self.config_sources {
            if source.trim().is_empty() {
                return Err(AppError::config("Configuration source cannot be empty"));
            }
        }

        regex::Regex::new(&self.filter)?;

        self.test.validate()?;

        if !self.min_download_speed.is_finite() || self.min_download_speed < 0.0 {
            return Err(AppError::config("Minimum download speed must be a non-negative number"));
        }

        if !self.min_upload_speed.is_finite() || self.min_upload_speed < 0.0 {
            return Err(AppError::config("Minimum upload speed must be a non-negative number"));
        }

        if self.results_file.trim().is_empty() {
            return Err(AppError::config("Results file path cannot be empty"));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(sources) = std::env::var("PST_CONFIG") {
            self.config_sources = split_list(&sources, ',');
        }

        if let Ok(server_url) = std::env::var("PST_SERVER_URL") {
            self.test.server_url = server_url.trim().to_string();
        }

        if let Ok(timeout) = std::env::var("PST_TIMEOUT") {
            let timeout = crate::cli::parse_duration(&timeout)
                .map_err(|e| AppError::config(format!("Invalid PST_TIMEOUT value: {}", e)))?;
            self.test.timeout = timeout;
            self.test.transfer_timeout = timeout;
        }

        if let Ok(workers) = std::env::var("PST_WORKERS") {
            self.test.concurrency = workers.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PST_WORKERS value '{}': {}", workers, e)))?;
        }

        if let Ok(streams) = std::env::var("PST_CONCURRENT") {
            self.test.transfer_streams = streams.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PST_CONCURRENT value '{}': {}", streams, e)))?;
        }

        if let Ok(results_file) = std::env::var("PST_RESULTS_FILE") {
            self.results_file = results_file.trim().to_string();
        }

        if let Ok(enable_color) = std::env::var("PST_ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid PST_ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

/// Split a separated list, trimming entries and dropping empty ones
pub fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Default value functions for serde
fn default_filter() -> String {
    defaults::DEFAULT_FILTER.to_string()
}

fn default_max_latency() -> Duration {
    defaults::DEFAULT_MAX_LATENCY
}

fn default_min_download_speed() -> f64 {
    defaults::DEFAULT_MIN_DOWNLOAD_SPEED
}

fn default_min_upload_speed() -> f64 {
    defaults::DEFAULT_MIN_UPLOAD_SPEED
}

fn default_results_file() -> String {
    defaults::DEFAULT_RESULTS_FILE.to_string()
}

fn default_enable_color() -> bool {
    defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            config_sources: vec!["config.yaml".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_default_test_config_is_valid() {
        let config = TestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.probe_count, 6);
        assert_eq!(config.transfer_streams, 20);
        assert_eq!(config.download_size, 50 * 1024 * 1024);
        assert!(config.concurrency >= 4);
    }

    #[test]
    fn test_probe_url() {
        let config = TestConfig {
            server_url: "https://speed.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.probe_url(), "https://speed.example.com/__down?bytes=0");
    }

    #[test]
    fn test_worst_case_duration() {
        let config = TestConfig {
            timeout: Duration::from_secs(1),
            transfer_timeout: Duration::from_secs(5),
            probe_count: 3,
            probe_interval: Duration::from_millis(100),
            fast_mode: false,
            ..Default::default()
        };
        // Probe pauses fit inside the probe budget
        assert_eq!(config.worst_case_duration(), Duration::from_secs(3 + 5));

        let fast = TestConfig { fast_mode: true, ..config };
        assert_eq!(fast.worst_case_duration(), Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_test_config() {
        let mut config = TestConfig::default();
        config.server_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.transfer_streams = 0;
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.probe_count = 0;
        assert!(config.validate().is_err());

        let mut config = TestConfig::default();
        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_app_config_requires_source() {
        assert!(AppConfig::default().validate().is_err());
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_filter_regex() {
        let mut config = valid_config();
        config.filter = "(unclosed".to_string();
        let err = config.validate().unwrap_err();
        assert_eq!(err.category(), "CONFIG");
    }

    #[test]
    fn test_negative_speed_threshold() {
        let mut config = valid_config();
        config.min_download_speed = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, b ,,c ", ','), vec!["a", "b", "c"]);
        assert_eq!(split_list("rate|x1| 1x", '|'), vec!["rate", "x1", "1x"]);
        assert!(split_list("", '|').is_empty());
    }
}
